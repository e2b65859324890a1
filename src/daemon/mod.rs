//! Temperature-driven fan control loop
//!
//! The loop owns its chip session and output line for the whole run. It reads
//! the sensor, maps the reading through the duty-cycle curve, writes the PWM
//! duty and sleeps, until cancelled or until a sensor or actuator fault. On
//! cancellation the fan is parked at 0% before the line is freed.

use crate::cancel::CancelSignal;
use crate::cpu_temp::TemperatureSource;
use crate::errors::{settle, Error, Result};
use crate::fan::DutyCycleCurve;
use crate::fan_control::{PwmActuator, DEFAULT_FREQUENCY_HZ};
use crate::gpio::driver::{Bias, GpioDriver};
use crate::gpio::ChipHandle;
use chrono::{DateTime, Local};
use log::{debug, warn};
use std::convert::Infallible;
use std::time::Duration;
use tokio::time::sleep;

/// Line the Geekwork X715 fan is wired to
pub const DEFAULT_FAN_GPIO: u32 = 13;

/// Time between samples
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3);

/// Hardware and timing for one control loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSettings {
    pub chip: u32,
    pub line: u32,
    pub frequency_hz: u32,
    pub interval: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            chip: 0,
            line: DEFAULT_FAN_GPIO,
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            interval: DEFAULT_INTERVAL,
        }
    }
}

/// One temperature reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub temperature: f64,
    pub taken_at: DateTime<Local>,
}

impl Sample {
    fn now(temperature: f64) -> Self {
        Self {
            temperature,
            taken_at: Local::now(),
        }
    }
}

/// Lifecycle of a control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Cancelling,
    Stopped,
}

impl LoopState {
    fn advance(&mut self, next: LoopState) {
        debug!("Fan control: {:?} -> {:?}", self, next);
        *self = next;
    }
}

/// Closed-loop fan controller
pub struct FanControlLoop<D, S> {
    driver: D,
    source: S,
    curve: DutyCycleCurve,
    settings: LoopSettings,
}

impl<D: GpioDriver, S: TemperatureSource> FanControlLoop<D, S> {
    pub fn new(driver: D, source: S, curve: DutyCycleCurve, settings: LoopSettings) -> Self {
        Self {
            driver,
            source,
            curve,
            settings,
        }
    }

    /// Run until cancelled or until a fault.
    ///
    /// Never returns `Ok`. Each iteration's sample and duty are passed to
    /// `status`. Cancellation comes back as [`Error::Cancelled`], possibly
    /// wrapped in [`Error::Release`] if cleanup also failed; every other
    /// error is a fault.
    ///
    /// Dropping the future instead of cancelling through `cancel` skips the
    /// park: the line is freed without the final 0% write.
    pub async fn run<F>(self, mut cancel: CancelSignal, mut status: F) -> Result<Infallible>
    where
        F: FnMut(&Sample, u8),
    {
        let FanControlLoop {
            driver,
            mut source,
            curve,
            settings,
        } = self;
        let mut state = LoopState::Idle;

        state.advance(LoopState::Running);
        let chip = match ChipHandle::open(driver, settings.chip) {
            Ok(chip) => chip,
            Err(e) => {
                state.advance(LoopState::Stopped);
                return Err(e.into());
            }
        };

        let outcome = Self::drive(
            &chip,
            &mut source,
            &curve,
            &settings,
            &mut cancel,
            &mut status,
            &mut state,
        )
        .await;
        let outcome = settle(outcome, chip.close());

        state.advance(LoopState::Stopped);
        outcome
    }

    async fn drive<F>(
        chip: &ChipHandle<D>,
        source: &mut S,
        curve: &DutyCycleCurve,
        settings: &LoopSettings,
        cancel: &mut CancelSignal,
        status: &mut F,
        state: &mut LoopState,
    ) -> Result<Infallible>
    where
        F: FnMut(&Sample, u8),
    {
        let line = chip.claim_output(settings.line, Bias::AsIs)?;
        let actuator = PwmActuator::new(&line, settings.frequency_hz);

        let outcome = match Self::cycle(&actuator, source, curve, settings.interval, cancel, status).await {
            Err(e) if e.is_cancelled() => {
                state.advance(LoopState::Cancelling);
                warn!("Cancelling...");
                Err(Error::Cancelled {
                    park: actuator.park().err(),
                })
            }
            outcome => outcome,
        };

        settle(outcome, line.release())
    }

    async fn cycle<F>(
        actuator: &PwmActuator<'_, D>,
        source: &mut S,
        curve: &DutyCycleCurve,
        interval: Duration,
        cancel: &mut CancelSignal,
        status: &mut F,
    ) -> Result<Infallible>
    where
        F: FnMut(&Sample, u8),
    {
        loop {
            if cancel.is_cancelled() {
                return Err(Error::cancelled());
            }

            let temperature = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::cancelled()),
                reading = source.read() => reading?,
            };
            let sample = Sample::now(temperature);

            let duty = curve.duty_cycle_for(temperature);
            actuator.set(duty)?;

            debug!("{:.2},{}", sample.temperature, duty);
            status(&sample, duty);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::cancelled()),
                _ = sleep(interval) => {}
            }
        }
    }
}
