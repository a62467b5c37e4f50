//! ABD -- request issuer.

use std::sync::Arc;

use super::messages::{Transaction, TxnId};

use crate::client::{
    write_frame, AdmissionLedger, ClientId, IssueReport, Pacer, TraceHandle,
    TraceRecord, Workload,
};
use crate::utils::{make_timestamp, BenchError, Timer};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::{self, Duration, Instant};

/// Issuer forming and sending transactions at the paced rate.
pub struct AbdIssuer<W> {
    /// Client ID.
    id: ClientId,

    /// Pre-generated workload.
    workload: Arc<Workload>,

    /// Write half of the server connection.
    conn_write: W,

    /// Admission ledger shared with the collector; one unit per transaction.
    ledger: Arc<dyn AdmissionLedger>,

    /// Batch pacing ticker.
    pacer: Pacer,

    /// Run deadline timer.
    deadline: Timer,

    /// Linearizability trace handle, if tracing is on.
    trace: Option<TraceHandle>,
}

impl<W> AbdIssuer<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a new issuer. Issuance stops at `deadline` at the latest.
    pub fn new(
        id: ClientId,
        workload: Arc<Workload>,
        conn_write: W,
        ledger: Arc<dyn AdmissionLedger>,
        pacer: Pacer,
        deadline: Instant,
        trace: Option<TraceHandle>,
    ) -> Self {
        AbdIssuer {
            id,
            workload,
            conn_write,
            ledger,
            pacer,
            deadline: Timer::deadline_at(deadline),
            trace,
        }
    }

    /// Serializes a stamped transaction onto the connection.
    async fn send_txn(
        conn_write: &mut W,
        txn: &Transaction,
    ) -> Result<(), BenchError> {
        write_frame(txn, conn_write).await?;
        conn_write.flush().await?;
        Ok(())
    }

    /// Runs until the workload is exhausted or the deadline fires, whichever
    /// first. Returns what was sent.
    pub async fn run(mut self) -> Result<IssueReport, BenchError> {
        // stagger startup so that many clients don't burst simultaneously
        time::sleep(Duration::from_millis(self.id)).await;
        pf_info!(self.id; "issuing {} requests in {} batches every {:?}",
                          self.workload.len(),
                          self.workload.len().div_ceil(self.workload.batch_size()),
                          self.pacer.period());

        let mut report = IssueReport::default();
        while report.ops < self.workload.len() && !self.deadline.expired() {
            let batch = self.workload.batch_at(report.ops);
            let mut txn = Transaction::from_commands(
                batch.iter().map(|op| op.to_command()).collect(),
            );

            tokio::select! {
                () = self.deadline.timeout() => break,
                () = self.pacer.tick() => {},
            }
            tokio::select! {
                () = self.deadline.timeout() => break,
                res = self.ledger.reserve(1) => res?,
            }

            let tid = (report.ops + txn.len()) as TxnId;
            txn.stamp(make_timestamp(), tid);
            if let Some(trace) = &self.trace {
                for cmd in &txn.commands {
                    trace.record(TraceRecord::Invoke {
                        tid,
                        cmd: *cmd,
                        ts: txn.ts,
                    });
                }
            }

            // NOTE: a send interrupted by the deadline may leave a partial
            // frame on the wire; nothing is sent after that point anyway
            tokio::select! {
                () = self.deadline.timeout() => break,
                res = Self::send_txn(&mut self.conn_write, &txn) => res?,
            }
            pf_trace!(self.id; "sent txn {} of {} ops", tid, txn.len());

            report.ops += txn.len();
            report.batches += 1;
        }

        pf_info!(self.id; "issuer done, {} ops in {} batches sent",
                          report.ops, report.batches);
        Ok(report)
    }
}
