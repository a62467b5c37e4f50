//! ABD -- client-server wire messages.

use crate::protocols::{Command, Operation, Value};
use crate::utils::Timestamp;

use serde::{Deserialize, Serialize};

/// Transaction ID type. Equals the cumulative operation index reached after
/// the transaction's batch was appended.
pub type TxnId = i64;

/// A batch of commands submitted as one unit.
#[derive(Debug, PartialEq, Eq, Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    /// Commands, sorted ascending by key before transmission.
    pub commands: Vec<Command>,

    /// True iff every command is a Get.
    pub read_only: bool,

    /// Submission timestamp, echoed back in responses.
    pub ts: Timestamp,

    /// Transaction ID.
    pub tid: TxnId,
}

impl Transaction {
    /// Builds an unstamped transaction from given commands: computes the
    /// read-only flag and sorts the commands by key.
    ///
    /// The server acquires per-key locks in key order, so submitting
    /// unsorted keys risks lock-order inversion across concurrent
    /// transactions touching overlapping keys.
    pub fn from_commands(mut commands: Vec<Command>) -> Self {
        let read_only = !commands.is_empty()
            && commands.iter().all(|cmd| cmd.op == Operation::Get);
        commands.sort_by_key(|cmd| cmd.key);
        Transaction {
            commands,
            read_only,
            ts: 0,
            tid: 0,
        }
    }

    /// Stamps the transaction with its submission timestamp and ID.
    pub fn stamp(&mut self, ts: Timestamp, tid: TxnId) {
        self.ts = ts;
        self.tid = tid;
    }

    /// Number of commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if the transaction has no commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// (Possibly partial) acknowledgement of a transaction.
#[derive(Debug, PartialEq, Eq, Clone, Default, Serialize, Deserialize)]
pub struct Response {
    /// ID of the acknowledged transaction.
    pub tid: TxnId,

    /// Submission timestamp of the transaction, echoed back.
    pub ts: Timestamp,

    /// Number of operations acknowledged by this response.
    pub size: usize,

    /// Values returned; non-empty only for reads.
    pub vals: Vec<Value>,

    /// False if the slow path was taken.
    pub is_fast: bool,

    /// Opaque byte passed through unmodified.
    pub is_water: u8,
}

#[cfg(test)]
mod messages_tests {
    use super::*;
    use crate::client::{decode_frame, encode_frame};
    use crate::utils::BenchError;

    #[test]
    fn commands_sorted_by_key() {
        let txn = Transaction::from_commands(vec![
            Command::put(9, 1),
            Command::get(3),
            Command::put(5, 2),
            Command::get(3),
        ]);
        let keys: Vec<_> = txn.commands.iter().map(|c| c.key).collect();
        assert_eq!(keys, vec![3, 3, 5, 9]);
        assert!(!txn.read_only);
        assert_eq!(txn.len(), 4);
    }

    #[test]
    fn read_only_iff_all_gets() {
        let txn = Transaction::from_commands(vec![Command::get(2), Command::get(1)]);
        assert!(txn.read_only);
        let txn = Transaction::from_commands(vec![Command::get(2), Command::put(1, 0)]);
        assert!(!txn.read_only);
        let txn = Transaction::from_commands(vec![]);
        assert!(!txn.read_only);
        assert!(txn.is_empty());
    }

    #[test]
    fn response_wire_preserves_opaque_byte() -> Result<(), BenchError> {
        let resp = Response {
            tid: 12,
            ts: 1700000000000,
            size: 2,
            vals: vec![4, 5],
            is_fast: false,
            is_water: 0xab,
        };
        let decoded: Response = decode_frame(&encode_frame(&resp)?)?;
        assert_eq!(decoded, resp);
        Ok(())
    }
}
