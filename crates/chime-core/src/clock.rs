//! Monotonic time sources and a stopwatch driven by them.
//!
//! Fade timing reads elapsed time through a [`Clock`] so tests can step time
//! by hand with [`ManualClock`] instead of sleeping.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic time source.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary, fixed origin.
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Shared system clock, ready to hand to a stopwatch.
    pub fn shared() -> Arc<dyn Clock> {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn advance_secs(&self, seconds: f64) {
        self.advance(Duration::from_secs_f64(seconds.max(0.0)));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock()
    }
}

// ── Stopwatch ───────────────────────────────────────────────────

/// Elapsed-time counter that can be started, restarted and reset.
#[derive(Clone)]
pub struct Stopwatch {
    clock: Arc<dyn Clock>,
    started_at: Option<Duration>,
}

impl Stopwatch {
    /// A stopped stopwatch.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            started_at: None,
        }
    }

    #[inline]
    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    /// Start counting from zero, whether running or not.
    pub fn restart(&mut self) {
        self.started_at = Some(self.clock.now());
    }

    /// Stop and clear.
    pub fn reset(&mut self) {
        self.started_at = None;
    }

    /// Seconds since the last restart, or zero when stopped.
    pub fn elapsed_sec(&self) -> f64 {
        match self.started_at {
            Some(start) => self.clock.now().saturating_sub(start).as_secs_f64(),
            None => 0.0,
        }
    }
}

impl fmt::Debug for Stopwatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stopwatch")
            .field("started_at", &self.started_at)
            .field("elapsed_sec", &self.elapsed_sec())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.advance(Duration::from_millis(250));
        clock.advance_secs(0.25);
        assert_eq!(clock.now(), Duration::from_millis(500));
    }

    #[test]
    fn test_stopwatch_lifecycle() {
        let clock = Arc::new(ManualClock::new());
        let mut watch = Stopwatch::new(clock.clone());
        assert!(!watch.is_started());
        assert_eq!(watch.elapsed_sec(), 0.0);

        clock.advance_secs(1.0);
        watch.restart();
        clock.advance_secs(0.5);
        assert!(watch.is_started());
        assert!((watch.elapsed_sec() - 0.5).abs() < 0.001);

        watch.restart();
        assert!(watch.elapsed_sec().abs() < 0.001);

        watch.reset();
        clock.advance_secs(2.0);
        assert!(!watch.is_started());
        assert_eq!(watch.elapsed_sec(), 0.0);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
