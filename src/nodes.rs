//! Node directory types.
//!
//! The replicated store carries a directory of service nodes keyed by
//! consensus id. The frontend reads it to redirect writes to the current
//! leader and to answer network-topology queries.

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

use crate::store::TypedMap;

/// Consensus identity of a service node.
pub type NodeId = u64;

/// Lifecycle status of a node within the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Joined but not yet trusted by governance.
    Pending,
    /// Full member of the service.
    Trusted,
    /// Removed from the service.
    Retired,
}

/// Directory entry for a service node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Node-to-node host.
    pub host: String,
    /// Node-to-node port.
    pub nodeport: String,
    /// Host clients should connect to.
    pub pubhost: String,
    /// TLS port clients should connect to.
    pub tlsport: String,
    /// Current status.
    pub status: NodeStatus,
}

impl NodeInfo {
    /// The `host:port` endpoint clients are redirected to.
    pub fn public_endpoint(&self) -> String {
        format!("{}:{}", self.pubhost, self.tlsport)
    }
}

/// The node directory map in the replicated store.
pub const NODES: TypedMap<NodeId, NodeInfo> = TypedMap::new("nodes");

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> NodeInfo {
        NodeInfo {
            host: "10.0.0.2".into(),
            nodeport: "7443".into(),
            pubhost: "node2.example.com".into(),
            tlsport: "8443".into(),
            status: NodeStatus::Trusted,
        }
    }

    #[test]
    fn public_endpoint_joins_host_and_port() {
        assert_eq!(info().public_endpoint(), "node2.example.com:8443");
    }

    #[test]
    fn node_info_serialization_roundtrip() {
        let original = info();
        let json = serde_json::to_string(&original).unwrap();
        let decoded: NodeInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn node_status_serializes_lowercase() {
        assert_eq!(serde_json::to_value(NodeStatus::Trusted).unwrap(), "trusted");
    }
}
