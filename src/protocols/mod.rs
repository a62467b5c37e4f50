//! Supported replication protocols and the command types they share.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod abd;
pub mod fastpath;

/// Key type of a single addressable register.
pub type Key = i64;

/// Value type of a single addressable register.
pub type Value = i64;

/// Operation kind of a command.
#[derive(
    Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize,
)]
pub enum Operation {
    #[default]
    None,
    Get,
    Put,
}

impl Operation {
    /// One-byte wire representation.
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Get => 1,
            Self::Put => 2,
        }
    }

    /// Parses the one-byte wire representation.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::None),
            1 => Some(Self::Get),
            2 => Some(Self::Put),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::None => write!(f, "NONE"),
            Self::Get => write!(f, "GET"),
            Self::Put => write!(f, "PUT"),
        }
    }
}

/// Atomic unit of work.
#[derive(
    Debug, PartialEq, Eq, Clone, Copy, Default, Serialize, Deserialize,
)]
pub struct Command {
    pub op: Operation,
    pub key: Key,
    pub value: Value,
}

impl Command {
    /// Composes a Get command.
    pub fn get(key: Key) -> Self {
        Command {
            op: Operation::Get,
            key,
            value: 0,
        }
    }

    /// Composes a Put command.
    pub fn put(key: Key, value: Value) -> Self {
        Command {
            op: Operation::Put,
            key,
            value,
        }
    }
}

/// Enum of supported replication protocol types.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BenchProtocol {
    /// Quorum-based atomic register protocol.
    Abd,

    /// Leader-based consensus protocol with a fast commit path.
    FastPath,
}

impl BenchProtocol {
    /// Parse command line string into BenchProtocol enum.
    pub fn parse_name(name: &str) -> Option<Self> {
        match &name.to_lowercase()[..] {
            "abd" => Some(Self::Abd),
            "fastpath" | "epaxos" => Some(Self::FastPath),
            _ => None,
        }
    }
}

impl fmt::Display for BenchProtocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod protocols_name_tests {
    use super::*;

    macro_rules! valid_name_test {
        ($protocol:ident) => {
            assert_eq!(
                BenchProtocol::parse_name(stringify!($protocol)),
                Some(BenchProtocol::$protocol)
            );
        };
    }

    #[test]
    fn parse_valid_names() {
        valid_name_test!(Abd);
        valid_name_test!(FastPath);
        assert_eq!(
            BenchProtocol::parse_name("epaxos"),
            Some(BenchProtocol::FastPath)
        );
    }

    #[test]
    fn parse_invalid_name() {
        assert_eq!(BenchProtocol::parse_name("InvalidProtocol"), None);
    }

    #[test]
    fn operation_byte_mapping() {
        for op in [Operation::None, Operation::Get, Operation::Put] {
            assert_eq!(Operation::from_byte(op.as_byte()), Some(op));
        }
        assert_eq!(Operation::from_byte(9), None);
    }
}
