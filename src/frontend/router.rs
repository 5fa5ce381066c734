//! Leader routing for mutating calls on a follower.

use serde_json::Value;
use serde_json::json;
use tracing::debug;

use crate::context::RpcContext;
use crate::frontend::RpcFrontend;
use crate::frontend::handler::Forwardable;
use crate::jsonrpc;
use crate::jsonrpc::ErrorCode;

impl RpcFrontend {
    /// Decide what to do with a mutating call on a follower.
    ///
    /// Returns `None` when the request should stay pending so the transport
    /// forwards it to the leader: a forwarder is configured, the handler
    /// allows forwarding, and the request has not already been forwarded.
    /// Otherwise returns a `TX_NOT_LEADER` redirect naming the leader's
    /// public endpoint when the node directory knows it.
    pub(crate) fn forward_or_redirect(
        &self,
        ctx: &RpcContext,
        forwardable: Forwardable,
    ) -> Option<Value> {
        if self.has_forwarder()
            && forwardable == Forwardable::CanForward
            && ctx.fwd.is_none()
        {
            debug!(seq_no = ctx.seq_no, "leaving write pending for forwarding");
            return None;
        }

        if let Some(consensus) = self.cached_consensus() {
            let leader_id = consensus.leader();
            let mut tx = self.store().begin();
            let mut nodes = self.nodes_map().view(tx.as_mut());
            if let Ok(Some(info)) = nodes.get(&leader_id) {
                debug!(leader_id, "redirecting write to leader");
                return Some(jsonrpc::error_response_with_data(
                    ctx.seq_no,
                    ErrorCode::TxNotLeader,
                    "Not leader.",
                    json!(info.public_endpoint()),
                ));
            }
        }
        Some(jsonrpc::error_response_with_data(
            ctx.seq_no,
            ErrorCode::TxNotLeader,
            "Not leader.",
            json!("Not leader, leader unknown."),
        ))
    }
}
