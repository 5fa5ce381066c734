//! Built-in management methods.
//!
//! Every frontend instance installs these at construction time. They cover
//! commit/term queries, metrics, manual signature emission, leader and
//! network discovery, and method introspection.

use std::sync::Arc;
use std::sync::Weak;

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::frontend::RpcFrontend;
use crate::frontend::handler::Forwardable;
use crate::frontend::handler::HandlerResult;
use crate::frontend::handler::ReadWrite;
use crate::frontend::handler::RequestArgs;
use crate::frontend::handler::error;
use crate::frontend::handler::params_as;
use crate::frontend::handler::success;
use crate::jsonrpc::ErrorCode;
use crate::metrics::MetricsSnapshot;
use crate::nodes::NodeId;
use crate::nodes::NodeStatus;
use crate::store::Version;

/// Commit/term query.
pub const GET_COMMIT: &str = "GET_COMMIT";
/// Transaction-rate metrics.
pub const GET_METRICS: &str = "GET_METRICS";
/// Manual signature emission.
pub const MK_SIGN: &str = "MK_SIGN";
/// Leader discovery.
pub const GET_LEADER_INFO: &str = "GET_LEADER_INFO";
/// Network topology.
pub const GET_NETWORK_INFO: &str = "GET_NETWORK_INFO";
/// Method introspection.
pub const LIST_METHODS: &str = "LIST_METHODS";
/// Schema introspection.
pub const GET_SCHEMA: &str = "GET_SCHEMA";

/// Parameters of `GET_COMMIT`.
#[derive(Debug, Default, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetCommitIn {
    /// Commit version to query; defaults to the store's commit version.
    pub commit: Option<Version>,
}

/// Result of `GET_COMMIT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GetCommitOut {
    /// Term the queried version was committed in.
    pub term: u64,
    /// The queried version.
    pub commit: Version,
}

/// Result of `GET_LEADER_INFO`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GetLeaderInfoOut {
    /// Consensus id of the current leader.
    pub leader_id: NodeId,
    /// Public host of the leader.
    pub leader_host: String,
    /// Public TLS port of the leader.
    pub leader_port: String,
}

/// One node in a `GET_NETWORK_INFO` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NodeDescriptor {
    /// Consensus id.
    pub node_id: NodeId,
    /// Public host.
    pub host: String,
    /// Public TLS port.
    pub port: String,
}

/// Result of `GET_NETWORK_INFO`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GetNetworkInfoOut {
    /// Consensus id of the current leader, if consensus is installed.
    pub leader_id: Option<NodeId>,
    /// All trusted nodes.
    pub nodes: Vec<NodeDescriptor>,
}

/// Result of `LIST_METHODS`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ListMethodsOut {
    /// Installed method names, lexicographically sorted.
    pub methods: Vec<String>,
}

/// Parameters of `GET_SCHEMA`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetSchemaIn {
    /// Method to look up.
    pub method: String,
}

/// Result of `GET_SCHEMA`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetSchemaOut {
    /// Installed parameter schema.
    pub params_schema: Value,
    /// Installed result schema.
    pub result_schema: Value,
}

impl RpcFrontend {
    pub(crate) fn install_builtins(frontend: &Arc<Self>) {
        let weak = Arc::downgrade(frontend);
        frontend.install_auto::<GetCommitIn, GetCommitOut, _>(
            GET_COMMIT,
            with_frontend(weak, RpcFrontend::builtin_get_commit),
            ReadWrite::Read,
            Forwardable::CanForward,
        );

        let weak = Arc::downgrade(frontend);
        frontend.install_auto_out::<MetricsSnapshot, _>(
            GET_METRICS,
            with_frontend(weak, RpcFrontend::builtin_get_metrics),
            ReadWrite::Read,
            Forwardable::CanForward,
        );

        let weak = Arc::downgrade(frontend);
        frontend.install_auto_out::<bool, _>(
            MK_SIGN,
            with_frontend(weak, RpcFrontend::builtin_make_signature),
            ReadWrite::Write,
            Forwardable::CanForward,
        );

        let weak = Arc::downgrade(frontend);
        frontend.install_auto_out::<GetLeaderInfoOut, _>(
            GET_LEADER_INFO,
            with_frontend(weak, RpcFrontend::builtin_get_leader_info),
            ReadWrite::Read,
            Forwardable::CanForward,
        );

        let weak = Arc::downgrade(frontend);
        frontend.install_auto_out::<GetNetworkInfoOut, _>(
            GET_NETWORK_INFO,
            with_frontend(weak, RpcFrontend::builtin_get_network_info),
            ReadWrite::Read,
            Forwardable::CanForward,
        );

        let weak = Arc::downgrade(frontend);
        frontend.install_auto_out::<ListMethodsOut, _>(
            LIST_METHODS,
            with_frontend(weak, RpcFrontend::builtin_list_methods),
            ReadWrite::Read,
            Forwardable::CanForward,
        );

        let weak = Arc::downgrade(frontend);
        frontend.install_auto::<GetSchemaIn, GetSchemaOut, _>(
            GET_SCHEMA,
            with_frontend(weak, RpcFrontend::builtin_get_schema),
            ReadWrite::Read,
            Forwardable::CanForward,
        );
    }

    fn builtin_get_commit(&self, args: &mut RequestArgs<'_>) -> HandlerResult {
        let input: GetCommitIn = params_as(args.params)?;
        let commit = input.commit.unwrap_or_else(|| self.store().commit_version());
        self.refresh_consensus();
        match self.cached_consensus() {
            Some(consensus) => success(GetCommitOut {
                term: consensus.term_of(commit),
                commit,
            }),
            None => error(
                ErrorCode::InternalError,
                "Failed to get commit info from consensus",
            ),
        }
    }

    fn builtin_get_metrics(&self, _args: &mut RequestArgs<'_>) -> HandlerResult {
        success(self.metrics_snapshot())
    }

    fn builtin_make_signature(&self, _args: &mut RequestArgs<'_>) -> HandlerResult {
        self.refresh_history();
        match self.cached_history() {
            Some(history) => {
                history.emit_signature();
                success(true)
            }
            None => error(ErrorCode::InternalError, "Failed to trigger signature"),
        }
    }

    fn builtin_get_leader_info(&self, args: &mut RequestArgs<'_>) -> HandlerResult {
        self.refresh_consensus();
        if let Some(consensus) = self.cached_consensus() {
            let leader_id = consensus.leader();
            let mut nodes = self.nodes_map().view(&mut *args.tx);
            if let Ok(Some(info)) = nodes.get(&leader_id) {
                return success(GetLeaderInfoOut {
                    leader_id,
                    leader_host: info.pubhost,
                    leader_port: info.tlsport,
                });
            }
        }
        error(ErrorCode::TxLeaderUnknown, "Leader unknown.")
    }

    fn builtin_get_network_info(&self, args: &mut RequestArgs<'_>) -> HandlerResult {
        self.refresh_consensus();
        let leader_id = self.cached_consensus().map(|c| c.leader());
        let mut nodes = Vec::new();
        let mut view = self.nodes_map().view(&mut *args.tx);
        if let Err(err) = view.for_each(|node_id, info| {
            if info.status == NodeStatus::Trusted {
                nodes.push(NodeDescriptor {
                    node_id,
                    host: info.pubhost,
                    port: info.tlsport,
                });
            }
            true
        }) {
            return Err(anyhow::Error::new(err)
                .context("failed to enumerate node directory")
                .into());
        }
        success(GetNetworkInfoOut { leader_id, nodes })
    }

    fn builtin_list_methods(&self, _args: &mut RequestArgs<'_>) -> HandlerResult {
        let mut methods = self.installed_methods();
        methods.sort();
        success(ListMethodsOut { methods })
    }

    fn builtin_get_schema(&self, args: &mut RequestArgs<'_>) -> HandlerResult {
        let input: GetSchemaIn = params_as(args.params)?;
        match self.method_schemas(&input.method) {
            Some((params_schema, result_schema)) => success(GetSchemaOut {
                params_schema,
                result_schema,
            }),
            None => error(
                ErrorCode::InvalidParams,
                format!("Method {} not recognised", input.method),
            ),
        }
    }
}

/// Adapt a frontend method into a handler closure holding a weak
/// back-reference, so installed builtins do not keep the frontend alive.
fn with_frontend(
    frontend: Weak<RpcFrontend>,
    method: fn(&RpcFrontend, &mut RequestArgs<'_>) -> HandlerResult,
) -> impl Fn(&mut RequestArgs<'_>) -> HandlerResult + Send + Sync + 'static {
    move |args: &mut RequestArgs<'_>| match frontend.upgrade() {
        Some(frontend) => method(&frontend, args),
        None => error(ErrorCode::InternalError, "Frontend has shut down"),
    }
}
