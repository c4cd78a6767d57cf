//! Runs the keypad's scan cycles at a fixed period.
use std::num::NonZeroU32;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use log::{debug, warn};
use thiserror::Error;
use keymatrix_gpio::GpioError;
use keymatrix_gpio::keypad::{KeySink, Keypad};

#[derive(Debug, Error)]
pub enum PollError {
    #[error("giving up after {failures} failed scans in a row, last: {last}")]
    TooManyFailures {
        failures: u32,
        #[source]
        last: GpioError,
    },
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PollStats {
    /// Completed scan cycles.
    pub cycles: u64,
    /// Failed scan cycles.
    pub failures: u64,
    /// Key presses handed to the sink.
    pub presses: u64,
}

#[derive(Debug, Default)]
struct PollFlags {
    stop_requested: bool,
    in_cycle: bool,
}

#[derive(Debug, Default)]
struct PollControl {
    flags: Mutex<PollFlags>,
    changed: Condvar,
}

impl PollControl {
    fn lock(&self) -> MutexGuard<'_, PollFlags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks a cycle as in flight for as long as it lives.
struct CycleGuard<'a>(&'a PollControl);

impl<'a> CycleGuard<'a> {
    /// Starts a cycle, unless a stop was requested.
    fn begin(control: &'a PollControl) -> Option<Self> {
        let mut flags = control.lock();
        if flags.stop_requested {
            return None;
        }
        flags.in_cycle = true;
        Some(CycleGuard(control))
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().in_cycle = false;
        self.0.changed.notify_all();
    }
}

/// Stops a [Poller] from another thread.
#[derive(Clone, Debug)]
pub struct StopHandle(Arc<PollControl>);

impl StopHandle {
    /// Asks the poller to stop at the next cycle boundary, without waiting.
    pub fn request_stop(&self) {
        self.0.lock().stop_requested = true;
        self.0.changed.notify_all();
    }

    /// Stops the poller. Once this returns, no cycle is running and none will start.
    ///
    /// Must not be called from inside a cycle, it would wait for itself.
    pub fn stop(&self) {
        self.request_stop();
        let _flags = self
            .0
            .changed
            .wait_while(self.0.lock(), |flags| flags.in_cycle)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Calls [Keypad::tick_into] once per period on the current thread, until stopped.
///
/// Periods are measured from the start of each cycle. A cycle that takes longer than the period
/// is followed by the next one straight away.
#[derive(Debug)]
pub struct Poller {
    period: Duration,
    max_failures: Option<NonZeroU32>,
    control: Arc<PollControl>,
}

impl Poller {
    pub fn new(period: Duration) -> Self {
        Poller {
            period,
            max_failures: None,
            control: Arc::default(),
        }
    }

    /// Gives up once this many cycles fail in a row. Failed cycles are otherwise retried on the
    /// next period.
    pub fn with_max_failures(mut self, max_failures: Option<NonZeroU32>) -> Self {
        self.max_failures = max_failures;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle(Arc::clone(&self.control))
    }

    pub fn run<P>(&self, keypad: &mut P, sink: &mut dyn KeySink<P::Key>) -> Result<PollStats, PollError>
    where
        P: Keypad + ?Sized,
    {
        let mut stats = PollStats::default();
        let mut failures = 0u32;

        loop {
            let started = Instant::now();
            let Some(cycle) = CycleGuard::begin(&self.control) else {
                break;
            };
            let result = keypad.tick_into(sink);
            drop(cycle);

            match result {
                Ok(presses) => {
                    failures = 0;
                    stats.cycles += 1;
                    stats.presses += presses as u64;
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    stats.failures += 1;
                    warn!("Scan cycle failed ({} in a row): {}", failures, e);
                    if let Some(max) = self.max_failures {
                        if failures >= max.get() {
                            return Err(PollError::TooManyFailures { failures, last: e });
                        }
                    }
                }
            }

            let deadline = started + self.period;
            let now = Instant::now();
            if now > deadline {
                warn!("Scan cycle overran its period by {:?}", now - deadline);
                continue;
            }
            if !self.wait_until(deadline) {
                break;
            }
        }

        debug!("Poller stopped: {:?}", stats);
        Ok(stats)
    }

    /// Sleeps until the deadline or a stop request. Returns `false` if stopped.
    fn wait_until(&self, deadline: Instant) -> bool {
        let flags = self.control.lock();
        let timeout = deadline.saturating_duration_since(Instant::now());
        let (flags, _) = self
            .control
            .changed
            .wait_timeout_while(flags, timeout, |flags| !flags.stop_requested)
            .unwrap_or_else(PoisonError::into_inner);
        !flags.stop_requested
    }
}
