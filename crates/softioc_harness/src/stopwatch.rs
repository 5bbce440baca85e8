use std::time::{Duration, Instant};

/// Completed timing measurement.
///
/// Immutable once produced; `elapsed` always equals `ended - started`.
#[derive(Debug, Clone, Copy)]
pub struct TimingResult {
    pub started: Instant,
    pub ended: Instant,
    pub elapsed: Duration,
}

impl TimingResult {
    /// Elapsed wall-clock time in seconds.
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Wall-clock stopwatch backed by the monotonic clock.
///
/// Measures an arbitrary caller-supplied scope; not a shared resource and not
/// meant to be used across threads.
///
/// ```
/// use softioc_harness::Stopwatch;
///
/// let watch = Stopwatch::start();
/// let result = fallible_work();
/// let timing = watch.stop();
/// assert!(timing.elapsed_secs() >= 0.0);
/// # fn fallible_work() -> Result<(), ()> { Ok(()) }
/// # result.unwrap();
/// ```
#[derive(Debug)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    /// Start timing now.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Time elapsed so far, without finalizing.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Finalize the measurement.
    pub fn stop(self) -> TimingResult {
        let ended = Instant::now();
        TimingResult {
            started: self.started,
            ended,
            elapsed: ended - self.started,
        }
    }

    /// Time a closure, returning its output alongside the measurement.
    ///
    /// The measurement is finalized whatever the closure returns, so error
    /// returns still produce a reading.
    pub fn time<T>(f: impl FnOnce() -> T) -> (T, TimingResult) {
        let watch = Self::start();
        let output = f();
        (output, watch.stop())
    }
}
