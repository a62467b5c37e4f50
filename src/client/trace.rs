//! Optional linearizability trace: invocation & response records of every
//! operation, written by a dedicated writer task.

use std::fmt;
use std::path::Path;

use crate::protocols::{Command, Value};
use crate::utils::{BenchError, Timestamp};

use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One trace record.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum TraceRecord {
    /// An operation was sent to the server.
    Invoke {
        /// Transaction (or command) ID it was sent under.
        tid: i64,

        /// The command itself.
        cmd: Command,

        /// Submission timestamp.
        ts: Timestamp,
    },

    /// An acknowledgement arrived from the server.
    Respond {
        /// Transaction (or command) ID acknowledged.
        tid: i64,

        /// Number of operations acknowledged.
        size: usize,

        /// Values returned for reads.
        vals: Vec<Value>,

        /// Arrival timestamp.
        ts: Timestamp,
    },
}

impl fmt::Display for TraceRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Invoke { tid, cmd, ts } => write!(
                f,
                "INV {} {} {} {} {}",
                tid, cmd.op, cmd.key, cmd.value, ts
            ),
            Self::Respond {
                tid,
                size,
                vals,
                ts,
            } => write!(f, "RES {} {} {:?} {}", tid, size, vals, ts),
        }
    }
}

/// Cloneable sending handle held by the issuer and the collector.
#[derive(Debug, Clone)]
pub struct TraceHandle {
    tx_record: mpsc::UnboundedSender<TraceRecord>,
}

impl TraceHandle {
    /// Submits a record to the writer task. Records submitted after the
    /// writer has gone away are dropped.
    pub fn record(&self, record: TraceRecord) {
        if self.tx_record.send(record).is_err() {
            pf_debug!("trace"; "trace writer gone, record dropped");
        }
    }
}

/// Trace logger owning the writer task.
#[derive(Debug)]
pub struct TraceLogger {
    /// Sender side kept so that handles can be created on demand.
    tx_record: mpsc::UnboundedSender<TraceRecord>,

    /// Join handle of the writer task, yielding the number of records
    /// written.
    writer_handle: JoinHandle<Result<u64, BenchError>>,
}

impl TraceLogger {
    /// Creates (truncating) the trace file at `path` and spawns the writer
    /// task.
    pub async fn new_file(path: impl AsRef<Path>) -> Result<Self, BenchError> {
        let file = File::create(path).await?;
        Ok(Self::new(file))
    }

    /// Spawns the writer task over any writable sink.
    pub fn new<W>(sink: W) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx_record, rx_record) = mpsc::unbounded_channel();
        let writer_handle =
            tokio::spawn(Self::writer_thread(BufWriter::new(sink), rx_record));
        TraceLogger {
            tx_record,
            writer_handle,
        }
    }

    /// Returns a new sending handle.
    pub fn handle(&self) -> TraceHandle {
        TraceHandle {
            tx_record: self.tx_record.clone(),
        }
    }

    /// Closes the logger: waits until every outstanding handle is dropped
    /// and all records are flushed. Returns the number of records written.
    pub async fn finish(self) -> Result<u64, BenchError> {
        drop(self.tx_record);
        self.writer_handle.await?
    }

    /// Writer task function.
    async fn writer_thread<W>(
        mut writer: BufWriter<W>,
        mut rx_record: mpsc::UnboundedReceiver<TraceRecord>,
    ) -> Result<u64, BenchError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0;
        while let Some(record) = rx_record.recv().await {
            writer.write_all(format!("{}\n", record).as_bytes()).await?;
            written += 1;
        }
        writer.flush().await?;
        Ok(written)
    }
}

#[cfg(test)]
mod trace_tests {
    use super::*;

    #[test]
    fn record_format() {
        let inv = TraceRecord::Invoke {
            tid: 4,
            cmd: Command::put(42, 7),
            ts: 1000,
        };
        assert_eq!(format!("{}", inv), "INV 4 PUT 42 7 1000");
        let res = TraceRecord::Respond {
            tid: 4,
            size: 2,
            vals: vec![7, 8],
            ts: 1003,
        };
        assert_eq!(format!("{}", res), "RES 4 2 [7, 8] 1003");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn trace_to_file() -> Result<(), BenchError> {
        let path = std::env::temp_dir()
            .join(format!("quorumbench-trace-{}.out", std::process::id()));
        let logger = TraceLogger::new_file(&path).await?;
        let handle = logger.handle();
        let handle2 = handle.clone();
        let task = tokio::spawn(async move {
            handle2.record(TraceRecord::Invoke {
                tid: 1,
                cmd: Command::get(5),
                ts: 10,
            });
        });
        task.await?;
        handle.record(TraceRecord::Respond {
            tid: 1,
            size: 1,
            vals: vec![0],
            ts: 12,
        });
        drop(handle);
        assert_eq!(logger.finish().await?, 2);

        let content = tokio::fs::read_to_string(&path).await?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["INV 1 GET 5 0 10", "RES 1 1 [0] 12"]);
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }
}
