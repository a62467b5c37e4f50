//! Batch pacing: spreads the workload's batches evenly across the run.

use crate::params::RunParams;

use tokio::time::{self, Duration, Interval, MissedTickBehavior};

/// Smallest interval the pacer ever ticks at.
const MIN_BATCH_INTERVAL: Duration = Duration::from_micros(1);

/// Computes the interval between two consecutive batches such that
/// `batch_count` batches are spread across `duration`. Never returns zero.
pub fn batch_interval(duration: Duration, batch_count: usize) -> Duration {
    let batch_count = batch_count.max(1) as u128;
    let nanos = duration.as_nanos() / batch_count;
    let interval = Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX));
    interval.max(MIN_BATCH_INTERVAL)
}

/// Periodic ticker regulating batch emission; the issuer emits at most one
/// batch per tick.
#[derive(Debug)]
pub struct Pacer {
    /// Interval ticker; missed ticks are skipped rather than bursted.
    ticker: Interval,
}

impl Pacer {
    /// Creates a pacer ticking at the given interval. The first tick
    /// completes immediately.
    pub fn new(interval: Duration) -> Self {
        let mut ticker = time::interval(interval.max(MIN_BATCH_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Pacer { ticker }
    }

    /// Creates a pacer for the given run parameters.
    pub fn for_run(params: &RunParams) -> Self {
        Self::new(batch_interval(params.duration(), params.batch_count()))
    }

    /// Current tick period.
    pub fn period(&self) -> Duration {
        self.ticker.period()
    }

    /// Waits for the next tick.
    pub async fn tick(&mut self) {
        self.ticker.tick().await;
    }
}

#[cfg(test)]
mod pacer_tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn interval_even_spread() {
        assert_eq!(
            batch_interval(Duration::from_secs(10), 5),
            Duration::from_secs(2)
        );
        assert_eq!(
            batch_interval(Duration::from_secs(1), 1000),
            Duration::from_millis(1)
        );
    }

    #[test]
    fn interval_never_zero() {
        assert!(!batch_interval(Duration::from_secs(1), 0).is_zero());
        assert!(!batch_interval(Duration::from_nanos(1), 1000000).is_zero());
        assert!(!batch_interval(Duration::ZERO, 10).is_zero());
    }

    #[test]
    fn interval_from_params() {
        let params = RunParams {
            duration_s: 10,
            request_count: 3,
            batch_size: 1,
            ..Default::default()
        };
        assert_eq!(
            batch_interval(params.duration(), params.batch_count()),
            Duration::from_nanos(3333333333)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pacer_ticks_at_period() {
        let mut pacer = Pacer::new(Duration::from_secs(2));
        assert_eq!(pacer.period(), Duration::from_secs(2));
        let start = Instant::now();
        pacer.tick().await; // first tick is immediate
        assert!(Instant::now().duration_since(start) < Duration::from_millis(1));
        pacer.tick().await;
        pacer.tick().await;
        assert!(Instant::now().duration_since(start) >= Duration::from_secs(4));
    }
}
