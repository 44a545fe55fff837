//! Trailing-edge debounce: coalesce a burst of events into one signal.
//!
//! Every [`Debouncer::touch`] pushes the deadline out to `now + window`; the
//! signal fires once no event has arrived for a full window. Used for both
//! filesystem events and editor change notifications.

use std::future::pending;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};

#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an event now, restarting the quiet window.
    pub fn touch(&mut self) {
        self.touch_at(Instant::now());
    }

    pub fn touch_at(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    /// Arm (or re-arm) the timer for an explicit delay instead of the window.
    pub fn rearm_after(&mut self, delay: Duration) {
        self.deadline = Some(Instant::now() + delay);
    }

    /// Drop any pending deadline. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Non-async check: consume the deadline if it has passed.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Resolve when the pending deadline passes; never resolves while idle.
    ///
    /// Cancel-safe: dropping the future before it resolves keeps the deadline.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => pending::<()>().await,
        }
    }
}

/// Sleep until `deadline`, or forever when there is none.
pub async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, timeout};

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn burst_collapses_into_one_trailing_signal() {
        let window = Duration::from_millis(100);
        let mut debounce = Debouncer::new(window);
        let start = Instant::now();

        for _ in 0..5 {
            debounce.touch();
            advance(Duration::from_millis(40)).await;
        }
        let last_event = start + Duration::from_millis(160);

        debounce.fired().await;
        let fired_at = Instant::now();
        assert!(fired_at >= last_event + window);
        assert!(fired_at < last_event + window + Duration::from_millis(2));
        assert!(!debounce.is_pending());
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn idle_debouncer_never_fires() {
        let mut debounce = Debouncer::new(Duration::from_millis(10));
        let result = timeout(Duration::from_secs(5), debounce.fired()).await;
        assert!(result.is_err(), "no event, no signal");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn cancel_discards_pending_signal() {
        let mut debounce = Debouncer::new(Duration::from_millis(10));
        debounce.touch();
        assert!(debounce.cancel());
        advance(Duration::from_millis(50)).await;
        assert!(!debounce.fire_if_due(Instant::now()));
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn dropped_wait_keeps_deadline() {
        let mut debounce = Debouncer::new(Duration::from_millis(100));
        debounce.touch();
        let _ = timeout(Duration::from_millis(20), debounce.fired()).await;
        assert!(debounce.is_pending());
        debounce.fired().await;
        assert!(!debounce.is_pending());
    }
}
