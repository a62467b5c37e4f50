//! Timer/timeout utility implemented using `tokio::time::Sleep`.

use std::pin::Pin;

use tokio::time::{self, Instant, Sleep};

/// Timer utility for signalling after a given timeout. Used as the one-shot
/// run deadline: both the issuer and the collector kick off their own timer
/// at the same shared deadline instant.
///
/// Must be used within the context of a tokio runtime.
#[derive(Debug)]
pub struct Timer {
    /// Inner `tokio::time::Sleep` future, wrapped in a pinned box to support
    /// await multiple times.
    sleep: Pin<Box<Sleep>>,

    /// Instant the timer is currently armed to fire at.
    deadline: Instant,
}

impl Timer {
    /// Creates a timer already armed to fire at given instant.
    pub fn deadline_at(deadline: Instant) -> Self {
        Timer {
            sleep: Box::pin(time::sleep_until(deadline)),
            deadline,
        }
    }

    /// Returns true if the timer has already fired (or would fire if polled).
    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Waits for the timer to timeout. Typically, this should be used as a
    /// branch of a `tokio::select!`.
    pub async fn timeout(&mut self) {
        self.sleep.as_mut().await
    }
}

#[cfg(test)]
mod timer_tests {
    use super::*;
    use tokio::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn timer_past_deadline() {
        let start = Instant::now();
        let mut timer = Timer::deadline_at(start);
        timer.timeout().await; // should complete immediately
        assert!(start.elapsed() < Duration::from_millis(100));
        assert!(timer.expired());
        timer.timeout().await; // and stays fired
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn timer_fires_at_deadline() {
        let start = Instant::now();
        let mut timer = Timer::deadline_at(start + Duration::from_millis(200));
        assert!(!timer.expired());
        timer.timeout().await;
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert!(timer.expired());
    }

    #[tokio::test(start_paused = true)]
    async fn timer_shared_deadline() {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut t1 = Timer::deadline_at(deadline);
        let mut t2 = Timer::deadline_at(deadline);
        t1.timeout().await;
        assert!(t2.expired());
        t2.timeout().await;
        assert!(Instant::now() >= deadline);
    }
}
