//! ABD -- response collector.

use std::collections::HashMap;
use std::sync::Arc;

use super::messages::{Response, TxnId};

use crate::client::{
    decode_frame, AdmissionLedger, ClientId, FrameReader, Summary,
    TraceHandle, TraceRecord,
};
use crate::utils::{make_timestamp, BenchError, Timer, Timestamp};

use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Event forwarded by the decoder task to the collector.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum DecodeEvent {
    /// A response frame was decoded successfully.
    Decoded(Response),

    /// A frame arrived but could not be decoded; the decoder moved on to the
    /// next frame.
    Failed(String),

    /// The inbound stream broke or was closed; no more events follow.
    Closed(String),
}

/// Response matching bookkeeping: per-transaction acknowledgement counts and
/// the run summary.
#[derive(Debug)]
pub struct AbdTally {
    /// Number of operations per full transaction.
    batch_size: usize,

    /// Total number of operations in the workload.
    request_count: usize,

    /// Map from transaction ID -> operations acknowledged so far.
    acked: HashMap<TxnId, usize>,

    /// Run summary being accumulated.
    summary: Summary,
}

impl AbdTally {
    /// Creates an empty tally.
    pub fn new(batch_size: usize, request_count: usize) -> Self {
        AbdTally {
            batch_size,
            request_count,
            acked: HashMap::new(),
            summary: Summary::new(request_count),
        }
    }

    /// Number of operations transaction `tid` was issued with. Transactions
    /// carry the cumulative operation index after their batch as ID, so all
    /// are `batch_size` long except possibly the final one. Returns 0 for IDs
    /// the issuer can never have produced.
    pub fn expected_acks(&self, tid: TxnId) -> usize {
        if tid <= 0 || tid as usize > self.request_count {
            return 0;
        }
        let tid = tid as usize;
        tid - ((tid - 1) / self.batch_size) * self.batch_size
    }

    /// Operations acknowledged so far for transaction `tid`.
    pub fn acked(&self, tid: TxnId) -> usize {
        self.acked.get(&tid).copied().unwrap_or(0)
    }

    /// Accounts a response arriving at time `now`. Returns true iff this
    /// response completes its transaction, i.e. the running count has just
    /// reached the transaction's size; this happens at most once per ID.
    pub fn absorb(&mut self, resp: &Response, now: Timestamp) -> bool {
        let expected = self.expected_acks(resp.tid);
        if expected == 0 {
            pf_warn!("abd"; "response for unknown txn {}", resp.tid);
            return false;
        }
        let acked = self.acked.entry(resp.tid).or_insert(0);
        let accepted = resp.size.min(expected - *acked);
        if accepted < resp.size {
            pf_warn!("abd"; "txn {} over-acknowledged: {} + {} > {}",
                            resp.tid, *acked, resp.size, expected);
        }
        if accepted == 0 {
            return false;
        }

        *acked += accepted;
        let completed = *acked == expected;

        self.summary.record_latency(now.saturating_sub(resp.ts), accepted);
        if !resp.vals.is_empty() {
            self.summary.total_read += accepted as u64;
            if !resp.is_fast {
                self.summary.total_slow += accepted as u64;
            }
        }
        completed
    }

    /// Counts an inbound frame that failed to decode.
    pub fn count_decode_failure(&mut self) {
        self.summary.decode_failures += 1;
    }

    /// Current summary.
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Consumes the tally, yielding the summary.
    pub fn into_summary(self) -> Summary {
        self.summary
    }
}

/// Collector matching responses to outstanding transactions.
pub struct AbdCollector<R> {
    /// Client ID.
    id: ClientId,

    /// Read half of the server connection; moved into the decoder task.
    conn_read: Option<R>,

    /// Capacity of the decoded-response queue.
    buffer_size: usize,

    /// Admission ledger shared with the issuer.
    ledger: Arc<dyn AdmissionLedger>,

    /// Run deadline timer.
    deadline: Timer,

    /// Linearizability trace handle, if tracing is on.
    trace: Option<TraceHandle>,

    /// Matching bookkeeping and run summary.
    tally: AbdTally,
}

impl<R> AbdCollector<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    /// Creates a new collector. Collection stops at `deadline`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ClientId,
        conn_read: R,
        batch_size: usize,
        request_count: usize,
        buffer_size: usize,
        ledger: Arc<dyn AdmissionLedger>,
        deadline: Instant,
        trace: Option<TraceHandle>,
    ) -> Self {
        AbdCollector {
            id,
            conn_read: Some(conn_read),
            buffer_size,
            ledger,
            deadline: Timer::deadline_at(deadline),
            trace,
            tally: AbdTally::new(batch_size, request_count),
        }
    }

    /// Decoder task function: perpetually reads frames and forwards decode
    /// results. A frame that fails to decode is reported and skipped; a
    /// broken stream ends the task.
    async fn decoder_thread(
        id: ClientId,
        mut reader: FrameReader<R>,
        tx_event: mpsc::Sender<DecodeEvent>,
    ) {
        pf_debug!(id; "decoder thread spawned");

        loop {
            let event = match reader.read_frame().await {
                Ok(body) => match decode_frame::<Response>(&body) {
                    Ok(resp) => DecodeEvent::Decoded(resp),
                    Err(e) => {
                        pf_warn!(id; "error decoding response: {}", e);
                        DecodeEvent::Failed(e.to_string())
                    }
                },
                Err(e) => {
                    pf_warn!(id; "inbound stream ended: {}", e);
                    let _ = tx_event.send(DecodeEvent::Closed(e.to_string())).await;
                    break;
                }
            };
            if tx_event.send(event).await.is_err() {
                break; // collector has finished
            }
        }

        pf_debug!(id; "decoder thread exitted");
    }

    /// Handles one event from the decoder task. Returns false once the
    /// inbound stream is known to be closed.
    fn handle_event(&mut self, event: DecodeEvent) -> bool {
        match event {
            DecodeEvent::Decoded(resp) => {
                let now = make_timestamp();
                if let Some(trace) = &self.trace {
                    trace.record(TraceRecord::Respond {
                        tid: resp.tid,
                        size: resp.size,
                        vals: resp.vals.clone(),
                        ts: now,
                    });
                }
                if self.tally.absorb(&resp, now) {
                    pf_trace!(self.id; "txn {} fully acknowledged", resp.tid);
                    self.ledger.release(1);
                }
                true
            }
            DecodeEvent::Failed(_) => {
                self.tally.count_decode_failure();
                true
            }
            DecodeEvent::Closed(_) => false,
        }
    }

    /// Runs until the deadline fires, then publishes the summary. Responses
    /// still in flight at that point are not counted.
    pub async fn run(mut self) -> Result<Summary, BenchError> {
        let conn_read = self.conn_read.take().ok_or_else(|| {
            BenchError::msg("collector connection already taken")
        })?;
        let (tx_event, mut rx_event) = mpsc::channel(self.buffer_size.max(1));
        let decoder_handle: JoinHandle<()> = tokio::spawn(Self::decoder_thread(
            self.id,
            FrameReader::new(conn_read),
            tx_event,
        ));

        let mut stream_open = true;
        loop {
            tokio::select! {
                () = self.deadline.timeout() => break,

                event = rx_event.recv(), if stream_open => {
                    stream_open = match event {
                        Some(event) => self.handle_event(event),
                        None => false,
                    };
                }
            }
        }

        decoder_handle.abort();
        let mut summary = self.tally.into_summary();
        summary.outstanding_at_end = self.ledger.outstanding();
        pf_info!(self.id; "collector done, {} ops acknowledged, {} txns outstanding",
                          summary.ack_num, summary.outstanding_at_end);
        Ok(summary)
    }
}
