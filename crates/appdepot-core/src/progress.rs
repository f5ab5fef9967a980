//! Progress reporting for long-running rebuild and sync operations
//!
//! Providers report bounded 0-100 progress through a plain callback. The
//! callback may be invoked from a worker thread and must never block it;
//! `ProgressThrottle` drops updates arriving faster than a minimum interval
//! so slow scans (e.g. the full plugin-registry walk) do not flood the UI.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Container with progress update
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Bounded progress, 0-100
    pub percent: u8,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(percent: u8, message: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

/// Callback invoked with bounded progress updates. The lifetime keeps
/// borrowing wrappers usable: a rebuild may hand a provider a closure
/// that forwards into the caller's own callback.
pub type ProgressFn<'a> = dyn Fn(ProgressUpdate) + Send + Sync + 'a;

/// No-op progress callback for callers that don't care
pub fn discard_progress() -> Box<dyn Fn(ProgressUpdate) + Send + Sync> {
    Box::new(|_| {})
}

/// Rate limiter for progress updates
pub struct ProgressThrottle {
    min_interval: Duration,
    state: Mutex<Option<(Instant, u8)>>,
}

impl ProgressThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            state: Mutex::new(None),
        }
    }

    /// Whether an update at `percent` should be forwarded.
    ///
    /// Terminal updates (0 and 100) always pass, as do jumps of ten points
    /// or more; otherwise the minimum interval must have elapsed.
    pub fn accept(&self, percent: u8) -> bool {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();

        let pass = match *state {
            None => true,
            Some((last_time, last_percent)) => {
                percent == 0
                    || percent >= 100
                    || percent.saturating_sub(last_percent) >= 10
                    || now.duration_since(last_time) >= self.min_interval
            }
        };

        if pass {
            *state = Some((now, percent));
        }
        pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_update_passes() {
        let throttle = ProgressThrottle::new(Duration::from_secs(60));
        assert!(throttle.accept(3));
    }

    #[test]
    fn test_rapid_small_steps_dropped() {
        let throttle = ProgressThrottle::new(Duration::from_secs(60));
        assert!(throttle.accept(1));
        assert!(!throttle.accept(2));
        assert!(!throttle.accept(3));
    }

    #[test]
    fn test_large_jump_passes() {
        let throttle = ProgressThrottle::new(Duration::from_secs(60));
        assert!(throttle.accept(1));
        assert!(throttle.accept(50));
    }

    #[test]
    fn test_terminal_always_passes() {
        let throttle = ProgressThrottle::new(Duration::from_secs(60));
        assert!(throttle.accept(1));
        assert!(throttle.accept(100));
    }

    #[test]
    fn test_percent_clamped() {
        let update = ProgressUpdate::new(150, "done");
        assert_eq!(update.percent, 100);
    }
}
