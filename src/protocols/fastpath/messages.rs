//! FastPath -- fixed-layout little-endian wire messages.

use crate::protocols::{Command, Operation};
use crate::utils::{BenchError, Timestamp};

use bytes::{Buf, BufMut};

use tokio::io::{AsyncRead, AsyncReadExt};

/// Kind byte preceding every proposal on the wire.
pub const PROPOSE: u8 = 0;

/// Encoded length of a proposal record after its kind byte.
pub const PROPOSE_BODY_LEN: usize = 4 + 1 + 8 + 8 + 8;

/// Encoded length of a reply record.
pub const REPLY_LEN: usize = 1 + 4 + 8 + 8;

/// Proposal of a single command.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct ProposeMessage {
    pub command_id: i32,
    pub command: Command,
    pub timestamp: Timestamp,
}

impl ProposeMessage {
    /// Appends the kind byte followed by the proposal record to `buf`.
    pub fn encode_to(&self, buf: &mut impl BufMut) {
        buf.put_u8(PROPOSE);
        buf.put_i32_le(self.command_id);
        buf.put_u8(self.command.op.as_byte());
        buf.put_i64_le(self.command.key);
        buf.put_i64_le(self.command.value);
        buf.put_i64_le(self.timestamp);
    }

    /// Parses a proposal record (kind byte already stripped).
    pub fn decode_body(mut body: &[u8]) -> Result<Self, BenchError> {
        if body.len() < PROPOSE_BODY_LEN {
            return Err(BenchError::msg(format!(
                "proposal too short: {} < {}",
                body.len(),
                PROPOSE_BODY_LEN
            )));
        }
        let command_id = body.get_i32_le();
        let op_byte = body.get_u8();
        let op = Operation::from_byte(op_byte).ok_or_else(|| {
            BenchError::msg(format!("unknown operation byte {}", op_byte))
        })?;
        let key = body.get_i64_le();
        let value = body.get_i64_le();
        let timestamp = body.get_i64_le();
        Ok(ProposeMessage {
            command_id,
            command: Command { op, key, value },
            timestamp,
        })
    }
}

/// Reply to a single proposal.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct ProposeReply {
    /// 1 on success, 0 otherwise.
    pub ok: u8,
    pub command_id: i32,
    pub value: i64,

    /// Timestamp of the proposal, echoed back.
    pub timestamp: Timestamp,
}

impl ProposeReply {
    /// Appends the reply record to `buf`.
    pub fn encode_to(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.ok);
        buf.put_i32_le(self.command_id);
        buf.put_i64_le(self.value);
        buf.put_i64_le(self.timestamp);
    }

    /// Parses a reply record. Any `ok` byte other than 0 or 1 means the
    /// record is garbage.
    pub fn decode(mut record: &[u8]) -> Result<Self, BenchError> {
        if record.len() < REPLY_LEN {
            return Err(BenchError::msg(format!(
                "reply too short: {} < {}",
                record.len(),
                REPLY_LEN
            )));
        }
        let ok = record.get_u8();
        if ok > 1 {
            return Err(BenchError::msg(format!("invalid ok byte {}", ok)));
        }
        Ok(ProposeReply {
            ok,
            command_id: record.get_i32_le(),
            value: record.get_i64_le(),
            timestamp: record.get_i64_le(),
        })
    }

    /// Reads one fixed-size reply record off `conn_read`. The outer error
    /// means the stream broke; the inner one that the record was garbage.
    pub async fn read_from<R>(
        conn_read: &mut R,
    ) -> Result<Result<Self, BenchError>, BenchError>
    where
        R: AsyncRead + Unpin,
    {
        let mut record = [0u8; REPLY_LEN];
        conn_read.read_exact(&mut record).await?;
        Ok(Self::decode(&record))
    }
}
