//! Replication protocol: ABD quorum register.
//!
//! Atomic read/write register over replicated servers, using read & write
//! quorums and versioned values. The client side batches commands into
//! transactions and holds one admission permit per transaction until all of
//! its operations are acknowledged, possibly across multiple fragmented
//! responses. References:
//!   - <https://dl.acm.org/doi/10.1145/200836.200869>

mod collector;
mod issuer;
mod messages;

pub use collector::{AbdCollector, AbdTally, DecodeEvent};
pub use issuer::AbdIssuer;
pub use messages::{Response, Transaction, TxnId};
