//! Shared helpers for frontend integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::Value;
use serde_json::json;

use madrona::RpcFrontend;
use madrona::context::Actor;
use madrona::context::CallerId;
use madrona::context::RpcContext;
use madrona::jsonrpc;
use madrona::nodes::NODES;
use madrona::nodes::NodeId;
use madrona::nodes::NodeInfo;
use madrona::nodes::NodeStatus;
use madrona::signed_req::SignedReq;
use madrona::store::MemoryStore;
use madrona::store::Store;

/// A trusted node directory entry.
pub fn node_info(pubhost: &str, tlsport: &str) -> NodeInfo {
    NodeInfo {
        host: pubhost.to_string(),
        nodeport: "7000".to_string(),
        pubhost: pubhost.to_string(),
        tlsport: tlsport.to_string(),
        status: NodeStatus::Trusted,
    }
}

/// Seed the node directory with one trusted node.
pub fn seed_node(store: &MemoryStore, id: NodeId, pubhost: &str, tlsport: &str) {
    store.seed(&NODES, &id, &node_info(pubhost, tlsport)).unwrap();
}

/// A plain request envelope.
pub fn request(id: u64, method: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "method": method})
}

/// Dispatch `rpc` through the executor with a fresh context and
/// transaction, as the transport's dispatch path would.
pub fn dispatch(frontend: &RpcFrontend, store: &Arc<MemoryStore>, rpc: &Value) -> Option<Value> {
    let mut ctx = RpcContext::new(1, Vec::new(), Actor::Users);
    dispatch_as(frontend, store, &mut ctx, 1, rpc)
}

/// Dispatch with an explicit context and caller id.
pub fn dispatch_as(
    frontend: &RpcFrontend,
    store: &Arc<MemoryStore>,
    ctx: &mut RpcContext,
    caller_id: CallerId,
    rpc: &Value,
) -> Option<Value> {
    let mut tx = store.begin();
    frontend.process_json(ctx, tx.as_mut(), caller_id, rpc, &SignedReq::default())
}

/// Error code of a reply envelope.
pub fn error_code(reply: &Value) -> i64 {
    reply[jsonrpc::ERROR][jsonrpc::CODE]
        .as_i64()
        .expect("reply carries no error code")
}

/// Error data of a reply envelope.
pub fn error_data(reply: &Value) -> &Value {
    &reply[jsonrpc::ERROR][jsonrpc::DATA]
}
