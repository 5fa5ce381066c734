//! Forwarder seam.
//!
//! When a mutating call reaches a follower whose handler allows it, the
//! transport ships the raw serialized request to the leader over this
//! channel. Forwarding is fire-and-not-forget from the follower's
//! perspective: the response comes back through the transport, not as a
//! return value.

use crate::context::CallerId;
use crate::nodes::NodeId;

/// Channel used by the transport to ship pending requests to the leader.
pub trait RequestForwarder: Send + Sync {
    /// Enqueue `input` for delivery to node `to` on behalf of the resolved
    /// caller. Returns false if the request could not be enqueued.
    fn forward(&self, to: NodeId, caller_id: CallerId, session_id: u64, input: &[u8]) -> bool;
}
