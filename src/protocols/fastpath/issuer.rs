//! FastPath -- request issuer.

use std::sync::Arc;

use super::messages::{ProposeMessage, PROPOSE_BODY_LEN};

use crate::client::{
    AdmissionLedger, ClientId, IssueReport, Pacer, TraceHandle, TraceRecord,
    Workload,
};
use crate::utils::{make_timestamp, BenchError, Timer};

use bytes::BytesMut;

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::time::{self, Duration, Instant};

/// Issuer proposing the workload one command at a time, a batch per tick.
pub struct FastPathIssuer<W> {
    /// Client ID.
    id: ClientId,

    /// Pre-generated workload.
    workload: Arc<Workload>,

    /// Buffered write half of the server connection.
    conn_write: BufWriter<W>,

    /// Count ledger shared with the collector; one unit per command.
    ledger: Arc<dyn AdmissionLedger>,

    /// Batch pacing ticker.
    pacer: Pacer,

    /// Run length, checked against elapsed time before every batch.
    duration: Duration,

    /// Run deadline timer.
    deadline: Timer,

    /// Linearizability trace handle, if tracing is on.
    trace: Option<TraceHandle>,
}

impl<W> FastPathIssuer<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Creates a new issuer. `deadline` is expected to be `duration` after
    /// the run start.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ClientId,
        workload: Arc<Workload>,
        conn_write: W,
        ledger: Arc<dyn AdmissionLedger>,
        pacer: Pacer,
        duration: Duration,
        deadline: Instant,
        trace: Option<TraceHandle>,
    ) -> Self {
        FastPathIssuer {
            id,
            workload,
            conn_write: BufWriter::new(conn_write),
            ledger,
            pacer,
            duration,
            deadline: Timer::deadline_at(deadline),
            trace,
        }
    }

    /// Encodes the batch starting at operation index `start` into one
    /// buffer of proposals sharing timestamp `ts`.
    fn encode_batch(&self, start: usize, ts: i64) -> (BytesMut, usize) {
        let batch = self.workload.batch_at(start);
        let mut buf = BytesMut::with_capacity(batch.len() * (1 + PROPOSE_BODY_LEN));
        for (i, op) in batch.iter().enumerate() {
            let msg = ProposeMessage {
                command_id: (start + i) as i32,
                command: op.to_command(),
                timestamp: ts,
            };
            msg.encode_to(&mut buf);
            if let Some(trace) = &self.trace {
                trace.record(TraceRecord::Invoke {
                    tid: msg.command_id as i64,
                    cmd: msg.command,
                    ts,
                });
            }
        }
        (buf, batch.len())
    }

    /// Runs until the workload is exhausted or the run time is up, whichever
    /// first. Returns what was sent.
    pub async fn run(mut self) -> Result<IssueReport, BenchError> {
        let start = Instant::now();
        time::sleep(Duration::from_millis(self.id)).await;
        pf_info!(self.id; "proposing {} commands in batches of {} every {:?}",
                          self.workload.len(),
                          self.workload.batch_size(),
                          self.pacer.period());

        // consume the immediate first tick; later waits span a full period
        self.pacer.tick().await;

        let mut report = IssueReport::default();
        while report.ops < self.workload.len() {
            if start.elapsed() > self.duration || self.deadline.expired() {
                break;
            }

            let (buf, batch_len) = self.encode_batch(report.ops, make_timestamp());
            tokio::select! {
                () = self.deadline.timeout() => break,
                res = self.conn_write.write_all(&buf) => res?,
            }
            tokio::select! {
                () = self.deadline.timeout() => break,
                res = self.ledger.reserve(batch_len) => res?,
            }
            tokio::select! {
                () = self.deadline.timeout() => break,
                res = self.conn_write.flush() => res?,
            }
            pf_trace!(self.id; "proposed commands {}..{}",
                               report.ops, report.ops + batch_len);

            report.ops += batch_len;
            report.batches += 1;

            tokio::select! {
                () = self.deadline.timeout() => break,
                () = self.pacer.tick() => {},
            }
        }

        pf_info!(self.id; "issuer done, {} commands in {} batches sent",
                          report.ops, report.batches);
        Ok(report)
    }
}

#[cfg(test)]
mod issuer_tests {
    use super::*;
    use crate::client::CountLedger;
    use crate::params::RunParams;
    use crate::protocols::fastpath::{PROPOSE, PROPOSE_BODY_LEN};
    use tokio::io::AsyncReadExt;

    #[tokio::test(start_paused = true)]
    async fn proposes_every_command() -> Result<(), BenchError> {
        let params = RunParams {
            duration_s: 10,
            request_count: 5,
            concurrency: 8,
            batch_size: 2,
            write_ratio: 1.0,
            ..Default::default()
        };
        let workload = Arc::new(Workload::generate(&params, 0)?);
        let (ledger, mut rx_count) = CountLedger::new(params.concurrency);
        let (client, mut server) = tokio::io::duplex(1 << 16);
        let issuer = FastPathIssuer::new(
            0,
            workload.clone(),
            client,
            ledger.clone(),
            Pacer::for_run(&params),
            params.duration(),
            Instant::now() + params.duration(),
            None,
        );
        let report = issuer.run().await?;
        assert_eq!(
            report,
            IssueReport {
                ops: 5,
                batches: 3
            }
        );
        assert_eq!(ledger.outstanding(), 5);
        for expected in [2, 2, 1] {
            assert_eq!(rx_count.recv().await, Some(expected));
        }

        let mut record = [0u8; 1 + PROPOSE_BODY_LEN];
        let mut stamps = vec![];
        for (i, op) in workload.ops().iter().enumerate() {
            server.read_exact(&mut record).await?;
            assert_eq!(record[0], PROPOSE);
            let msg = ProposeMessage::decode_body(&record[1..])?;
            assert_eq!(msg.command_id, i as i32);
            assert_eq!(msg.command, op.to_command());
            stamps.push(msg.timestamp);
        }
        // one timestamp per batch
        assert_eq!(stamps[0], stamps[1]);
        assert_eq!(stamps[2], stamps[3]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn stops_once_run_time_is_up() -> Result<(), BenchError> {
        let params = RunParams {
            duration_s: 3,
            request_count: 10,
            concurrency: 16,
            batch_size: 1,
            ..Default::default()
        };
        let workload = Arc::new(Workload::generate(&params, 0)?);
        let (ledger, mut rx_count) = CountLedger::new(params.concurrency);
        let (client, _server) = tokio::io::duplex(1 << 16);
        let start = Instant::now();
        // pacing slower than the workload needs, and a shared deadline far
        // past the run time, so only the elapsed-time check can stop it
        let issuer = FastPathIssuer::new(
            0,
            workload.clone(),
            client,
            ledger.clone(),
            Pacer::new(Duration::from_secs(2)),
            params.duration(),
            start + Duration::from_secs(60),
            None,
        );
        let report = issuer.run().await?;

        // batches go out at 0s and 2s; at 4s the run time is exceeded
        assert_eq!(
            report,
            IssueReport {
                ops: 2,
                batches: 2
            }
        );
        assert!(report.ops < workload.len());
        let stopped = Instant::now().duration_since(start);
        assert!(stopped >= Duration::from_secs(4));
        assert!(stopped < Duration::from_secs(5));
        assert_eq!(ledger.outstanding(), report.ops);
        assert_eq!(rx_count.recv().await, Some(1));
        assert_eq!(rx_count.recv().await, Some(1));
        assert!(rx_count.try_recv().is_err());
        Ok(())
    }
}
