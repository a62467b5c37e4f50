//! Quorumbench: workload-driving benchmark client for replicated KV-stores.

#[macro_use]
mod utils;

pub mod client;
pub mod params;
pub mod protocols;
pub mod version;

pub use crate::client::{BenchClient, ClientId, RunStats, Summary};
pub use crate::params::{Distribution, RunParams};
pub use crate::protocols::BenchProtocol;
pub use crate::utils::{logger_init, BenchError};
pub use crate::version::{Version, MIN_VERSION};
