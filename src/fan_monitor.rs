//! Fan speed measurement from tachometer pulses

use crate::cancel::CancelSignal;
use crate::errors::{settle, Error, Result};
use crate::gpio::driver::{Bias, Edge, EdgeCallback, GpioDriver};
use crate::gpio::{ChipHandle, ClaimedLine};
use log::{debug, info, trace};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Tachometer pulses per fan revolution
pub const PULSES_PER_REVOLUTION: f64 = 2.0;

/// Edges closer together than this are noise
pub const DEBOUNCE: Duration = Duration::from_millis(5);

/// Line the X715 tachometer output is wired to
pub const DEFAULT_TACH_GPIO: u32 = 16;

/// RPM estimate from the spacing of consecutive falling edges
#[derive(Debug, Clone)]
pub struct Tachometer {
    last_edge: Instant,
    rpm: f64,
}

impl Tachometer {
    pub fn new(now: Instant) -> Self {
        Self {
            last_edge: now,
            rpm: 0.0,
        }
    }

    /// Account for a falling edge at `at`. Returns false if it was debounced.
    pub fn on_falling_edge(&mut self, at: Instant) -> bool {
        let dt = at.saturating_duration_since(self.last_edge);
        if dt < DEBOUNCE {
            trace!("Ignoring edge {:?} after the last one", dt);
            return false;
        }

        self.rpm = (1.0 / dt.as_secs_f64() / PULSES_PER_REVOLUTION) * 60.0;
        self.last_edge = at;
        true
    }

    pub fn rpm(&self) -> f64 {
        self.rpm
    }

    /// Current estimate, resetting it to zero.
    pub fn take_rpm(&mut self) -> f64 {
        std::mem::take(&mut self.rpm)
    }
}

/// Feeds edges delivered by a driver callback into a [`Tachometer`].
///
/// The callback may run on a driver thread; it only forwards the timestamp.
/// The tachometer itself is updated by whichever task calls [`EdgeCounter::run`].
pub struct EdgeCounter {
    tachometer: Tachometer,
    edges: mpsc::UnboundedReceiver<Instant>,
}

impl EdgeCounter {
    pub fn new(now: Instant) -> (Self, EdgeCallback) {
        let (tx, edges) = mpsc::unbounded_channel();
        let callback: EdgeCallback = Box::new(move |at| {
            // Receiver gone means measurement is over.
            let _ = tx.send(at);
        });

        let counter = Self {
            tachometer: Tachometer::new(now),
            edges,
        };
        (counter, callback)
    }

    pub fn tachometer(&self) -> &Tachometer {
        &self.tachometer
    }

    /// Report `samples` estimates to `sink`, one per `period`, resetting the
    /// estimate after each.
    pub async fn run<F>(
        &mut self,
        samples: usize,
        period: Duration,
        cancel: &mut CancelSignal,
        mut sink: F,
    ) -> Result<()>
    where
        F: FnMut(f64),
    {
        for _ in 0..samples {
            sink(self.tachometer.take_rpm());

            let deadline = tokio::time::Instant::now() + period;
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::cancelled()),
                    Some(at) = self.edges.recv() => {
                        self.tachometer.on_falling_edge(at);
                    }
                    _ = tokio::time::sleep_until(deadline) => break,
                }
            }
        }
        Ok(())
    }
}

/// Tachometer wiring and sampling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TachSettings {
    pub chip: u32,
    pub line: u32,
    pub samples: usize,
    pub period: Duration,
}

impl Default for TachSettings {
    fn default() -> Self {
        Self {
            chip: 0,
            line: DEFAULT_TACH_GPIO,
            samples: 30,
            period: Duration::from_secs(1),
        }
    }
}

/// Measure fan speed on the tachometer line, passing each estimate to `sink`.
///
/// The callback is cancelled, the line freed and the chip closed on every
/// exit path, in that order.
pub async fn measure<D, F>(
    driver: D,
    settings: &TachSettings,
    mut cancel: CancelSignal,
    sink: F,
) -> Result<()>
where
    D: GpioDriver,
    F: FnMut(f64),
{
    let chip = ChipHandle::open(driver, settings.chip)?;
    let outcome = watch_line(&chip, settings, &mut cancel, sink).await;
    settle(outcome, chip.close())
}

async fn watch_line<D, F>(
    chip: &ChipHandle<D>,
    settings: &TachSettings,
    cancel: &mut CancelSignal,
    sink: F,
) -> Result<()>
where
    D: GpioDriver,
    F: FnMut(f64),
{
    let line = chip.claim_alert(settings.line, Edge::Falling, Bias::PullUp)?;
    let outcome = count_edges(&line, settings, cancel, sink).await;
    settle(outcome, line.release())
}

async fn count_edges<D, F>(
    line: &ClaimedLine<'_, D>,
    settings: &TachSettings,
    cancel: &mut CancelSignal,
    sink: F,
) -> Result<()>
where
    D: GpioDriver,
    F: FnMut(f64),
{
    let (mut counter, callback) = EdgeCounter::new(Instant::now());
    let watch = line.watch(callback)?;
    info!(
        "Measuring fan speed on GPIO line {} ({} samples every {:?})",
        settings.line, settings.samples, settings.period
    );

    let outcome = counter.run(settings.samples, settings.period, cancel, sink).await;
    debug!("Last estimate {:.0} RPM", counter.tachometer().rpm());
    settle(outcome, watch.cancel())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancellation;
    use crate::errors::ResourceError;
    use crate::gpio::driver::Status;
    use crate::gpio::mock::{Call, MockDriver, Op};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn assert_rpm(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-6, "{} != {}", actual, expected);
    }

    #[test]
    fn test_edges_30ms_apart_are_1000_rpm() {
        let t0 = Instant::now();
        let mut tach = Tachometer::new(t0);

        assert!(tach.on_falling_edge(t0 + ms(30)));
        assert_rpm(tach.rpm(), 1000.0);
    }

    #[test]
    fn test_bounce_is_ignored_and_keeps_timestamp() {
        let t0 = Instant::now();
        let mut tach = Tachometer::new(t0);
        tach.on_falling_edge(t0 + ms(30));

        assert!(!tach.on_falling_edge(t0 + ms(32)));
        assert_rpm(tach.rpm(), 1000.0);

        // Measured from the edge at 30ms, not the bounce at 32ms.
        assert!(tach.on_falling_edge(t0 + ms(60)));
        assert_rpm(tach.rpm(), 1000.0);
    }

    #[test]
    fn test_debounce_threshold_is_inclusive() {
        let t0 = Instant::now();
        let mut tach = Tachometer::new(t0);

        assert!(!tach.on_falling_edge(t0 + Duration::from_micros(4_999)));
        assert!(tach.on_falling_edge(t0 + ms(5)));
        assert_rpm(tach.rpm(), 6000.0);
    }

    #[test]
    fn test_take_rpm_resets_estimate() {
        let t0 = Instant::now();
        let mut tach = Tachometer::new(t0);
        tach.on_falling_edge(t0 + ms(20));

        assert_rpm(tach.take_rpm(), 1500.0);
        assert_eq!(tach.rpm(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_samples_each_period() {
        let t0 = Instant::now();
        let (mut counter, mut callback) = EdgeCounter::new(t0);
        let (_handle, mut signal) = cancellation();

        let mut seen = Vec::new();
        counter
            .run(3, ms(1000), &mut signal, |rpm| {
                // Edges for the coming period, after this sample is taken.
                if seen.is_empty() {
                    callback(t0 + ms(30));
                    callback(t0 + ms(31));
                }
                seen.push(rpm);
            })
            .await
            .unwrap();

        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], 0.0);
        assert_rpm(seen[1], 1000.0);
        assert_eq!(seen[2], 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_stops_on_cancel() {
        let (mut counter, _callback) = EdgeCounter::new(Instant::now());
        let (handle, mut signal) = cancellation();

        let mut samples = 0;
        let err = counter
            .run(30, ms(1000), &mut signal, |_| {
                samples += 1;
                if samples == 2 {
                    handle.cancel();
                }
            })
            .await
            .unwrap_err();

        assert!(err.is_clean_cancellation());
        assert_eq!(samples, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_measure_releases_in_reverse_order() {
        let driver = MockDriver::new();
        let (_handle, signal) = cancellation();
        let settings = TachSettings {
            samples: 2,
            ..Default::default()
        };

        let probe = driver.clone();
        let mut seen = Vec::new();
        measure(driver.clone(), &settings, signal, |rpm| {
            if seen.is_empty() {
                let t0 = Instant::now() + ms(100);
                probe.fire(0, t0);
                probe.fire(0, t0 + ms(30));
            }
            seen.push(rpm);
        })
        .await
        .unwrap();

        assert_eq!(seen.len(), 2);
        assert_rpm(seen[1], 1000.0);
        assert_eq!(
            driver.calls(),
            vec![
                Call::ChipOpen(0),
                Call::ClaimAlert(DEFAULT_TACH_GPIO),
                Call::Callback(DEFAULT_TACH_GPIO),
                Call::CallbackCancel(0),
                Call::Free(DEFAULT_TACH_GPIO),
                Call::ChipClose,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_measure_callback_failure_still_frees() {
        let driver = MockDriver::new();
        driver.fail(Op::Callback, 0, Status::BAD_CALLBACK);
        let (_handle, signal) = cancellation();

        let err = measure(driver.clone(), &TachSettings::default(), signal, |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Resource(ResourceError::Callback { .. })));
        assert_eq!(driver.outstanding_claims(), 0);
        assert_eq!(driver.calls().last(), Some(&Call::ChipClose));
    }
}
