//! Replication protocol: leader-based consensus with a fast commit path.
//!
//! Every command is proposed individually to the connected replica, which
//! commits it on the fast path when no interfering command is concurrently
//! in flight and falls back to a slower round otherwise. Replies carry no
//! transaction grouping, so the client matches them to proposals purely by
//! count, in order. References:
//!   - <https://dl.acm.org/doi/10.1145/2517349.2517350>

mod collector;
mod issuer;
mod messages;

pub use collector::FastPathCollector;
pub use issuer::FastPathIssuer;
pub use messages::{
    ProposeMessage, ProposeReply, PROPOSE, PROPOSE_BODY_LEN, REPLY_LEN,
};
