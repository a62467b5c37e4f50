//! One benchmarking client instance: dials the server, splits the
//! connection, and drives an issuer and a collector task to completion.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::client::{
    tcp_connect_with_retry, AdmissionLedger, ClientId, CountLedger,
    IssueReport, Pacer, PermitLedger, RunStats, Summary, TraceHandle,
    TraceLogger, Workload,
};
use crate::params::RunParams;
use crate::protocols::abd::{AbdCollector, AbdIssuer};
use crate::protocols::fastpath::{FastPathCollector, FastPathIssuer};
use crate::protocols::BenchProtocol;
use crate::utils::BenchError;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Number of additional dial attempts before giving up.
const CONNECT_RETRIES: u8 = 10;

/// Benchmarking client instance.
pub struct BenchClient {
    /// Client ID; seeds the workload and staggers startup.
    id: ClientId,

    /// Run parameters.
    params: Arc<RunParams>,

    /// Protocol spoken with the server.
    protocol: BenchProtocol,

    /// Server address.
    server: SocketAddr,

    /// Directory that output files are created in.
    output_dir: PathBuf,
}

impl BenchClient {
    /// Creates a new client instance; nothing happens until `run()`.
    pub fn new(
        id: ClientId,
        params: Arc<RunParams>,
        protocol: BenchProtocol,
        server: SocketAddr,
    ) -> Self {
        BenchClient {
            id,
            params,
            protocol,
            server,
            output_dir: PathBuf::from("."),
        }
    }

    /// Sets the directory that output files are created in.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Path of the linearizability trace file of this client.
    pub fn trace_file_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("linearizability.{}.out", self.id))
    }

    /// Path of the latency dump file of this client.
    pub fn latency_file_path(&self) -> PathBuf {
        self.output_dir
            .join(RunStats::latency_file_name(self.id))
    }

    /// Connects to the server and runs the benchmark over that connection.
    /// Failing to connect fails the run.
    pub async fn run(&self) -> Result<Summary, BenchError> {
        let stream = tcp_connect_with_retry(self.server, CONNECT_RETRIES)
            .await
            .map_err(|e| {
                pf_error!(self.id; "{}", e);
                e
            })?;
        pf_info!(self.id; "connected to {} server {}", self.protocol, self.server);
        self.run_with_stream(stream).await
    }

    /// Runs the benchmark over an established connection. Returns the
    /// summary once the run deadline has fired.
    pub async fn run_with_stream<S>(
        &self,
        stream: S,
    ) -> Result<Summary, BenchError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        self.params.sanitize()?;
        let workload = Arc::new(Workload::generate(&self.params, self.id)?);

        let trace_logger = if self.params.linearizability {
            Some(TraceLogger::new_file(self.trace_file_path()).await?)
        } else {
            None
        };
        let trace = trace_logger.as_ref().map(TraceLogger::handle);

        let result = self.drive(stream, workload, trace).await;

        if let Some(logger) = trace_logger {
            let written = logger.finish().await?;
            pf_info!(self.id; "wrote {} trace records to {}",
                              written, self.trace_file_path().display());
        }
        result
    }

    /// Spawns the protocol's issuer and collector over the two halves of
    /// the connection.
    async fn drive<S>(
        &self,
        stream: S,
        workload: Arc<Workload>,
        trace: Option<TraceHandle>,
    ) -> Result<Summary, BenchError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (conn_read, conn_write) = tokio::io::split(stream);
        let params = &self.params;
        let deadline = Instant::now() + params.duration();
        let pacer = Pacer::for_run(params);

        match self.protocol {
            BenchProtocol::Abd => {
                let ledger: Arc<dyn AdmissionLedger> =
                    Arc::new(PermitLedger::new(params.concurrency));
                let issuer = AbdIssuer::new(
                    self.id,
                    workload.clone(),
                    conn_write,
                    ledger.clone(),
                    pacer,
                    deadline,
                    trace.clone(),
                );
                let collector = AbdCollector::new(
                    self.id,
                    conn_read,
                    params.batch_size,
                    workload.len(),
                    params.buffer_size,
                    ledger,
                    deadline,
                    trace,
                );
                self.join_tasks(
                    tokio::spawn(issuer.run()),
                    tokio::spawn(collector.run()),
                )
                .await
            }

            BenchProtocol::FastPath => {
                let (ledger, rx_count) = CountLedger::new(params.concurrency);
                let ledger: Arc<dyn AdmissionLedger> = ledger;
                let issuer = FastPathIssuer::new(
                    self.id,
                    workload.clone(),
                    conn_write,
                    ledger.clone(),
                    pacer,
                    params.duration(),
                    deadline,
                    trace.clone(),
                );
                let collector = FastPathCollector::new(
                    self.id,
                    conn_read,
                    rx_count,
                    workload.len(),
                    ledger,
                    deadline,
                    trace,
                );
                self.join_tasks(
                    tokio::spawn(issuer.run()),
                    tokio::spawn(collector.run()),
                )
                .await
            }
        }
    }

    /// Waits for the collector's summary, then reaps the issuer. An issuer
    /// failure is logged but does not discard what was collected.
    async fn join_tasks(
        &self,
        issuer_handle: JoinHandle<Result<IssueReport, BenchError>>,
        collector_handle: JoinHandle<Result<Summary, BenchError>>,
    ) -> Result<Summary, BenchError> {
        let summary = match collector_handle.await? {
            Ok(summary) => summary,
            Err(e) => {
                issuer_handle.abort();
                return logged_err!(self.id; "collector failed: {}", e);
            }
        };

        if !issuer_handle.is_finished() {
            issuer_handle.abort();
        }
        match issuer_handle.await {
            Ok(Ok(report)) => {
                pf_debug!(self.id; "issuer sent {} ops in {} batches",
                                   report.ops, report.batches);
            }
            Ok(Err(e)) => pf_error!(self.id; "issuer failed: {}", e),
            Err(e) if e.is_cancelled() => {
                pf_debug!(self.id; "issuer cancelled at deadline");
            }
            Err(e) => pf_error!(self.id; "issuer task join error: {}", e),
        }
        Ok(summary)
    }
}
