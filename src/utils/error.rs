//! Customized unified error type.

use std::error;
use std::fmt;
use std::io;
use std::net;
use std::num;
use std::string;

/// Customized error type for quorumbench.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct BenchError(pub(crate) String);

impl BenchError {
    pub fn msg(msg: impl ToString) -> Self {
        BenchError(msg.to_string())
    }
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0) // do not display literal quotes
    }
}

impl error::Error for BenchError {}

// Helper macro for saving boiler-plate `impl From<X>`s for transparent
// conversion from various common error types to `BenchError`.
macro_rules! impl_from_error {
    ($error:ty) => {
        impl From<$error> for BenchError {
            fn from(e: $error) -> Self {
                // just store the source error's string representation
                BenchError(e.to_string())
            }
        }
    };
}

// Helper macro for saving boiler-plate `impl From<X<T>>`s for transparent
// conversion from various common generic error types to `BenchError`.
macro_rules! impl_from_error_generic {
    ($error:ty) => {
        impl<T> From<$error> for BenchError {
            fn from(e: $error) -> BenchError {
                BenchError::msg(e.to_string())
            }
        }
    };
}

impl_from_error!(io::Error);
impl_from_error!(string::FromUtf8Error);
impl_from_error!(num::ParseIntError);
impl_from_error!(num::ParseFloatError);
impl_from_error!(net::AddrParseError);
impl_from_error!(toml::ser::Error);
impl_from_error!(toml::de::Error);
impl_from_error!(rmp_serde::encode::Error);
impl_from_error!(rmp_serde::decode::Error);
impl_from_error!(rand_distr::ZipfError);
impl_from_error!(tokio::sync::AcquireError);
impl_from_error!(tokio::task::JoinError);

impl_from_error_generic!(tokio::sync::mpsc::error::SendError<T>);

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn error_display() {
        let e = BenchError("what the heck?".into());
        assert_eq!(format!("{}", e), String::from("what the heck?"));
    }

    #[test]
    fn from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "oh no!");
        let e = BenchError::from(io_error);
        assert!(e.0.contains("oh no!"));
    }

    #[test]
    fn from_parse_error() {
        let e = BenchError::from("xyz".parse::<u64>().unwrap_err());
        assert!(!e.0.is_empty());
    }
}
