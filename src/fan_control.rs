use crate::errors::{ActuatorError, PwmRejection};
use crate::gpio::driver::GpioDriver;
use crate::gpio::ClaimedLine;
use log::debug;

/// Default PWM frequency for the fan header
pub const DEFAULT_FREQUENCY_HZ: u32 = 20;

/// One PWM write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuationCommand {
    pub line: u32,
    pub frequency_hz: u32,
    pub duty_percent: u8,
}

/// Drives a PWM waveform on a claimed output line
pub struct PwmActuator<'l, D: GpioDriver> {
    line: &'l ClaimedLine<'l, D>,
    frequency_hz: u32,
}

impl<'l, D: GpioDriver> PwmActuator<'l, D> {
    pub fn new(line: &'l ClaimedLine<'l, D>, frequency_hz: u32) -> Self {
        Self { line, frequency_hz }
    }

    /// The command `set(duty_percent)` would send.
    pub fn command(&self, duty_percent: u8) -> ActuationCommand {
        ActuationCommand {
            line: self.line.line(),
            frequency_hz: self.frequency_hz,
            duty_percent,
        }
    }

    /// Set the duty cycle (0-100). Returns the driver's queue depth, which is
    /// informational only.
    pub fn set(&self, duty_percent: u8) -> Result<u32, ActuatorError> {
        let command = self.command(duty_percent);
        let rejected = |cause| ActuatorError {
            line: command.line,
            frequency_hz: command.frequency_hz,
            duty_percent: command.duty_percent,
            cause,
        };

        if duty_percent > 100 {
            return Err(rejected(PwmRejection::DutyOutOfRange));
        }

        let queue_depth = self
            .line
            .tx_pwm(command.frequency_hz, command.duty_percent)
            .map_err(|status| rejected(PwmRejection::Driver(status)))?;
        debug!(
            "Set PWM on line {} to {}% at {} Hz",
            command.line, command.duty_percent, command.frequency_hz
        );
        Ok(queue_depth)
    }

    /// Drive the fan fully off.
    pub fn park(&self) -> Result<u32, ActuatorError> {
        self.set(0)
    }
}
