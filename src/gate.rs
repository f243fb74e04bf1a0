use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Process-wide admission gate capping the rate of fetch orchestration
/// cycles, independent of cache TTLs.
///
/// A request arriving within `min_interval` of the last accepted one is
/// degraded: it may not trigger any upstream work and is answered straight
/// from whatever the caches hold. This is deliberately global, not
/// per-symbol or per-caller, as a second line of defense against upstream
/// throttling during request storms.
pub struct RequestGate {
    min_interval: Duration,
    last_accepted_at: Mutex<Option<Instant>>,
}

impl RequestGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted_at: Mutex::new(None),
        }
    }

    /// Returns true if this request may start upstream work, updating the
    /// acceptance timestamp as a side effect.
    pub fn try_accept(&self, now: Instant) -> bool {
        let mut last = self.last_accepted_at.lock().expect("gate mutex poisoned");
        match *last {
            Some(accepted_at) if now.saturating_duration_since(accepted_at) < self.min_interval => {
                false
            }
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_is_accepted() {
        let gate = RequestGate::new(Duration::from_secs(2));
        assert!(gate.try_accept(Instant::now()));
    }

    #[test]
    fn requests_inside_the_window_are_degraded() {
        let gate = RequestGate::new(Duration::from_secs(2));
        let start = Instant::now();

        assert!(gate.try_accept(start));
        assert!(!gate.try_accept(start + Duration::from_millis(500)));
        assert!(!gate.try_accept(start + Duration::from_millis(1_999)));
        assert!(gate.try_accept(start + Duration::from_secs(2)));
    }

    #[test]
    fn degraded_requests_do_not_push_the_window_forward() {
        let gate = RequestGate::new(Duration::from_secs(2));
        let start = Instant::now();

        assert!(gate.try_accept(start));
        // A rejected request must not reset the interval for the next one.
        assert!(!gate.try_accept(start + Duration::from_secs(1)));
        assert!(gate.try_accept(start + Duration::from_secs(2)));
    }
}
