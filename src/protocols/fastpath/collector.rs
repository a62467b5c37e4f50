//! FastPath -- reply collector.

use std::sync::Arc;

use super::messages::ProposeReply;

use crate::client::{
    AdmissionLedger, ClientId, Summary, TraceHandle, TraceRecord,
};
use crate::utils::{make_timestamp, BenchError, Timer};

use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Collector reading exactly as many replies as the issuer announced.
pub struct FastPathCollector<R> {
    /// Client ID.
    id: ClientId,

    /// Read half of the server connection.
    conn_read: R,

    /// Receiver side of the count ledger's announcement channel.
    rx_count: mpsc::Receiver<usize>,

    /// Count ledger shared with the issuer.
    ledger: Arc<dyn AdmissionLedger>,

    /// Run deadline timer.
    deadline: Timer,

    /// Linearizability trace handle, if tracing is on.
    trace: Option<TraceHandle>,

    /// Run summary being accumulated.
    summary: Summary,
}

impl<R> FastPathCollector<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Creates a new collector. Collection stops at `deadline`.
    pub fn new(
        id: ClientId,
        conn_read: R,
        rx_count: mpsc::Receiver<usize>,
        request_count: usize,
        ledger: Arc<dyn AdmissionLedger>,
        deadline: Instant,
        trace: Option<TraceHandle>,
    ) -> Self {
        FastPathCollector {
            id,
            conn_read,
            rx_count,
            ledger,
            deadline: Timer::deadline_at(deadline),
            trace,
            summary: Summary::new(request_count),
        }
    }

    /// Accounts one successfully decoded reply.
    fn absorb(&mut self, reply: &ProposeReply) {
        let now = make_timestamp();
        if let Some(trace) = &self.trace {
            trace.record(TraceRecord::Respond {
                tid: reply.command_id as i64,
                size: 1,
                vals: vec![reply.value],
                ts: now,
            });
        }
        self.summary.record_latency(now.saturating_sub(reply.timestamp), 1);
        // replies do not tell reads apart, nor fast from slow commits
        self.summary.total_read += 1;
    }

    /// Runs until the deadline fires, then publishes the summary.
    pub async fn run(mut self) -> Result<Summary, BenchError> {
        let mut stream_open = true;
        let mut announcing = true;

        'collect: loop {
            let count = tokio::select! {
                () = self.deadline.timeout() => break,
                count = self.rx_count.recv(), if stream_open && announcing => count,
            };
            let Some(count) = count else {
                announcing = false;
                continue;
            };

            for _ in 0..count {
                let reply = tokio::select! {
                    () = self.deadline.timeout() => break 'collect,
                    reply = ProposeReply::read_from(&mut self.conn_read) => reply,
                };
                match reply {
                    Ok(Ok(reply)) => self.absorb(&reply),
                    Ok(Err(e)) => {
                        pf_warn!(self.id; "skipping undecodable reply: {}", e);
                        self.summary.decode_failures += 1;
                    }
                    Err(e) => {
                        pf_warn!(self.id; "inbound stream ended: {}", e);
                        stream_open = false;
                        break;
                    }
                }
                self.ledger.release(1);
            }
        }

        self.summary.outstanding_at_end = self.ledger.outstanding();
        pf_info!(self.id; "collector done, {} commands acknowledged, {} outstanding",
                          self.summary.ack_num, self.summary.outstanding_at_end);
        Ok(self.summary)
    }
}
