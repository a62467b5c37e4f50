//! Client-side benchmarking machinery shared by all protocols.

mod admission;
mod apistub;
mod pacer;
mod runner;
mod summary;
mod trace;
mod workload;

pub use admission::{AdmissionLedger, CountLedger, PermitLedger};
pub use apistub::{
    decode_frame, encode_frame, tcp_connect_with_retry, write_frame,
    FrameReader,
};
pub use pacer::{batch_interval, Pacer};
pub use runner::BenchClient;
pub use summary::{RunStats, Summary};
pub use trace::{TraceHandle, TraceLogger, TraceRecord};
pub use workload::{Workload, WorkloadOp, HOT_KEY};

/// Client ID type.
pub type ClientId = u64;

/// What an issuer managed to send before it stopped.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct IssueReport {
    /// Number of operations sent.
    pub ops: usize,

    /// Number of batches sent.
    pub batches: usize,
}
