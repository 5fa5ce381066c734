//! Per-request context shared between the transport and the frontend.
//!
//! The transport owns an [`RpcContext`] per client call and hands it to the
//! frontend mutably; the frontend records the negotiated pack, the request's
//! sequence number and whether the call became pending (response produced
//! out-of-band, typically after forwarding to the leader).

use serde::Deserialize;
use serde::Serialize;

use crate::jsonrpc::Pack;
use crate::nodes::NodeId;
use crate::store::TypedMap;

/// Opaque integer identifying an authenticated client certificate.
pub type CallerId = u64;

/// Raw caller certificate bytes as presented on the connection.
pub type CallerCert = Vec<u8>;

/// The certificates map in the replicated store: caller certificate bytes
/// to caller id.
pub const CERTS: TypedMap<CallerCert, CallerId> = TypedMap::new("certs");

/// Sentinel caller id meaning "no certificate map is configured": caller
/// authentication is disabled and every caller is admitted under this id.
pub const INVALID_ID: CallerId = u64::MAX;

/// Classification of the frontend a request entered through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    /// Ordinary service users.
    Users,
    /// Consortium members driving governance methods.
    Members,
    /// Other service nodes.
    Nodes,
}

/// Context attached to a request that was forwarded by a follower.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardedContext {
    /// Caller id as resolved by the forwarding follower.
    pub caller_id: CallerId,
    /// Consensus id of the node that executed the forwarded request;
    /// stamped by the leader on receipt.
    pub leader_id: NodeId,
}

/// Mutable per-request state owned by the transport.
#[derive(Debug, Clone)]
pub struct RpcContext {
    /// Certificate bytes of the calling client, empty when anonymous.
    pub caller_cert: CallerCert,
    /// Transport session the request arrived on.
    pub client_session_id: u64,
    /// Which frontend class the request entered through.
    pub actor: Actor,
    /// Wire encoding negotiated from the request's first byte.
    pub pack: Option<Pack>,
    /// The JSON-RPC `id` of the request being processed.
    pub seq_no: u64,
    /// True when the response will be produced out-of-band and the
    /// transport must keep the call open.
    pub is_pending: bool,
    /// Present iff this request arrived over the forwarder channel.
    pub fwd: Option<ForwardedContext>,
}

impl RpcContext {
    /// Context for a fresh client request.
    pub fn new(client_session_id: u64, caller_cert: CallerCert, actor: Actor) -> Self {
        Self {
            caller_cert,
            client_session_id,
            actor,
            pack: None,
            seq_no: 0,
            is_pending: false,
            fwd: None,
        }
    }

    /// Context for a request arriving over the forwarder channel, carrying
    /// the caller id resolved by the forwarding follower.
    pub fn forwarded(client_session_id: u64, caller_id: CallerId, actor: Actor) -> Self {
        let mut ctx = Self::new(client_session_id, CallerCert::new(), actor);
        ctx.fwd = Some(ForwardedContext {
            caller_id,
            leader_id: 0,
        });
        ctx
    }
}
