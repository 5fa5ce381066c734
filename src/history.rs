//! History seam.
//!
//! The history subsystem keeps the merkle log of requests and emits
//! signature entries into the replicated log. The frontend records every
//! accepted request with it and asks it to emit signatures on the leader,
//! both on a transaction-count rule and on a wall-clock tick.

use crate::context::Actor;
use crate::context::CallerId;

/// Identity of a request within the history log.
///
/// Within a single caller session, responses are ordered by `seq_no`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId {
    /// Authenticated caller.
    pub caller_id: CallerId,
    /// Transport session the request arrived on.
    pub session_id: u64,
    /// JSON-RPC id of the request.
    pub seq_no: u64,
}

/// Merkle history of requests as driven by the frontend.
pub trait TxHistory: Send + Sync {
    /// Record an accepted request before dispatch.
    fn add_request(&self, id: RequestId, actor: Actor, request: &[u8]);

    /// Stamp a merkle-signature entry into the replicated log.
    fn emit_signature(&self);
}
