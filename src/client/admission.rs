//! Admission ledger: bounds how much work the issuer may have outstanding.
//!
//! The two protocols account admission differently. The quorum-register
//! issuer holds one permit per transaction, which the collector gives back
//! once the transaction is fully acknowledged. The fast-path issuer instead
//! announces the operation count of every batch over a bounded channel, and
//! the collector consumes exactly that many replies. Both are exposed
//! through the same `reserve()`/`release()`/`outstanding()` contract.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::utils::BenchError;

use async_trait::async_trait;

use tokio::sync::{mpsc, Semaphore};

/// Admission ledger trait shared by issuers and collectors.
#[async_trait]
pub trait AdmissionLedger: Send + Sync {
    /// Reserves `n` units, waiting until they become available.
    async fn reserve(&self, n: usize) -> Result<(), BenchError>;

    /// Gives back up to `n` units. Releasing more than is outstanding never
    /// inflates the budget; returns the number of units actually released.
    fn release(&self, n: usize) -> usize;

    /// Number of units currently reserved and not yet released.
    fn outstanding(&self) -> usize;
}

/// Decrements `counter` by at most `n` without underflowing, returning the
/// amount actually subtracted.
fn saturating_take(counter: &AtomicUsize, n: usize) -> usize {
    match counter.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
        Some(cur - n.min(cur))
    }) {
        Ok(prev) | Err(prev) => n.min(prev),
    }
}

/// Semaphore-style ledger: a fixed number of permits.
#[derive(Debug)]
pub struct PermitLedger {
    /// Permits not currently reserved.
    permits: Semaphore,

    /// Total number of permits.
    capacity: usize,

    /// Number of permits currently reserved.
    outstanding: AtomicUsize,
}

impl PermitLedger {
    /// Creates a new permit ledger of given capacity.
    pub fn new(capacity: usize) -> Self {
        PermitLedger {
            permits: Semaphore::new(capacity),
            capacity,
            outstanding: AtomicUsize::new(0),
        }
    }

    /// Total number of permits.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[async_trait]
impl AdmissionLedger for PermitLedger {
    async fn reserve(&self, n: usize) -> Result<(), BenchError> {
        if n > self.capacity {
            return Err(BenchError::msg(format!(
                "reserving {} permits exceeds capacity {}",
                n, self.capacity
            )));
        }
        let n_u32 = u32::try_from(n).map_err(BenchError::msg)?;

        // CANCELLATION SAFETY: nothing is recorded before the only await
        // point, so a cancelled reservation leaves the ledger untouched
        let permit = self.permits.acquire_many(n_u32).await?;
        permit.forget();
        self.outstanding.fetch_add(n, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self, n: usize) -> usize {
        let released = saturating_take(&self.outstanding, n);
        if released > 0 {
            self.permits.add_permits(released);
        }
        released
    }

    fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

/// Count-passing ledger: every reservation announces its unit count to the
/// collector over a bounded channel.
#[derive(Debug)]
pub struct CountLedger {
    /// Sender side of the announcement channel.
    tx_count: mpsc::Sender<usize>,

    /// Number of units announced and not yet released.
    outstanding: AtomicUsize,
}

impl CountLedger {
    /// Creates a new count ledger whose channel holds at most `capacity`
    /// unconsumed announcements. Returns the ledger together with the
    /// receiver side of the announcement channel, to be owned by the
    /// collector.
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<usize>) {
        let (tx_count, rx_count) = mpsc::channel(capacity.max(1));
        (
            Arc::new(CountLedger {
                tx_count,
                outstanding: AtomicUsize::new(0),
            }),
            rx_count,
        )
    }
}

#[async_trait]
impl AdmissionLedger for CountLedger {
    async fn reserve(&self, n: usize) -> Result<(), BenchError> {
        // CANCELLATION SAFETY: only the channel slot reservation awaits;
        // recording and announcing happen synchronously afterwards
        let slot = self.tx_count.reserve().await.map_err(|_| {
            BenchError::msg("admission announcement channel closed")
        })?;
        self.outstanding.fetch_add(n, Ordering::SeqCst);
        slot.send(n);
        Ok(())
    }

    fn release(&self, n: usize) -> usize {
        saturating_take(&self.outstanding, n)
    }

    fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod admission_tests {
    use super::*;
    use tokio::time::{self, Duration};

    async fn ledger_contract(ledger: &dyn AdmissionLedger) -> Result<(), BenchError> {
        assert_eq!(ledger.outstanding(), 0);
        ledger.reserve(1).await?;
        ledger.reserve(1).await?;
        assert_eq!(ledger.outstanding(), 2);
        assert_eq!(ledger.release(1), 1);
        assert_eq!(ledger.outstanding(), 1);
        // over-release is clamped
        assert_eq!(ledger.release(5), 1);
        assert_eq!(ledger.outstanding(), 0);
        assert_eq!(ledger.release(1), 0);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn permit_ledger_contract() -> Result<(), BenchError> {
        let ledger = PermitLedger::new(2);
        ledger_contract(&ledger).await?;
        assert_eq!(ledger.capacity(), 2);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn count_ledger_contract() -> Result<(), BenchError> {
        let (ledger, mut rx_count) = CountLedger::new(4);
        ledger_contract(ledger.as_ref()).await?;
        assert_eq!(rx_count.recv().await, Some(1));
        assert_eq!(rx_count.recv().await, Some(1));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn permit_ledger_blocks_when_exhausted() -> Result<(), BenchError> {
        let ledger = Arc::new(PermitLedger::new(1));
        ledger.reserve(1).await?;
        assert!(time::timeout(Duration::from_millis(100), ledger.reserve(1))
            .await
            .is_err());
        // a timed-out reservation must not leak into the ledger
        assert_eq!(ledger.outstanding(), 1);

        let ledger2 = ledger.clone();
        let waiter = tokio::spawn(async move { ledger2.reserve(1).await });
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ledger.release(1), 1);
        waiter.await??;
        assert_eq!(ledger.outstanding(), 1);
        assert!(ledger.reserve(2).await.is_err());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn count_ledger_announces_counts() -> Result<(), BenchError> {
        let (ledger, mut rx_count) = CountLedger::new(1);
        ledger.reserve(3).await?;
        // channel is full until the collector consumes the announcement
        assert!(time::timeout(Duration::from_millis(100), ledger.reserve(2))
            .await
            .is_err());
        assert_eq!(rx_count.recv().await, Some(3));
        ledger.reserve(2).await?;
        assert_eq!(rx_count.recv().await, Some(2));
        assert_eq!(ledger.outstanding(), 5);
        assert_eq!(ledger.release(3), 3);
        assert_eq!(ledger.outstanding(), 2);
        Ok(())
    }
}
