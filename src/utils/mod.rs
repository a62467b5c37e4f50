//! Helper utilities, functions, and macros.

#[macro_use]
mod print;

#[macro_use]
mod config;

mod error;
mod timer;
mod timestamp;

pub(crate) use config::{config_table, reject_leftovers, take_field};
pub use error::BenchError;
pub use print::logger_init;
pub use timer::Timer;
pub use timestamp::{make_timestamp, Timestamp};
