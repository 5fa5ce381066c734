//! The RPC frontend.
//!
//! A long-lived object co-owned by the transport. It terminates the
//! JSON-RPC protocol, authenticates callers, verifies client signatures,
//! dispatches to installed handlers inside store transactions, routes
//! writes on followers to the leader, annotates committed replies with
//! consensus metadata, and triggers merkle signature emission on both a
//! transaction-count and a wall-clock interval.
//!
//! Entry points are serialized by the host: `process` for client calls,
//! `process_forwarded` for calls arriving over the forwarder channel,
//! `process_bft` for the byzantine-fault-tolerant ordering path, and
//! `tick` for periodic upkeep.

pub mod builtins;
pub mod handler;
mod router;
mod signatures;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use parking_lot::RwLock;
use schemars::JsonSchema;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tracing::debug;
use tracing::warn;

use crate::config::ConfigError;
use crate::config::FrontendConfig;
use crate::consensus::Consensus;
use crate::context::Actor;
use crate::context::CallerCert;
use crate::context::CallerId;
use crate::context::INVALID_ID;
use crate::context::RpcContext;
use crate::forwarder::RequestForwarder;
use crate::frontend::handler::Forwardable;
use crate::frontend::handler::Handler;
use crate::frontend::handler::HandlerError;
use crate::frontend::handler::HandlerOutcome;
use crate::frontend::handler::HandlerResult;
use crate::frontend::handler::ReadWrite;
use crate::frontend::handler::RequestArgs;
use crate::frontend::handler::empty_schema;
use crate::frontend::handler::schema_of;
use crate::history::RequestId;
use crate::history::TxHistory;
use crate::jsonrpc;
use crate::jsonrpc::ErrorCode;
use crate::jsonrpc::Pack;
use crate::metrics::Metrics;
use crate::metrics::MetricsSnapshot;
use crate::nodes::NODES;
use crate::nodes::NodeId;
use crate::nodes::NodeInfo;
use crate::signed_req::SignedReq;
use crate::store::CommitOutcome;
use crate::store::Store;
use crate::store::Transaction;
use crate::store::TypedMap;
use crate::store::Version;
use crate::verifier::VerifierCache;

/// Driver errors that indicate wiring bugs, not client mistakes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrontendError {
    /// `process_forwarded` was invoked without a forwarded context.
    #[error("processing forwarded command with uninitialised forwarded context")]
    MissingForwardedContext,
    /// The executor declined to respond to a forwarded request; forwarded
    /// requests must never forward again.
    #[error("forwarded RPC cannot be forwarded")]
    ForwardedRequestCannotForward,
}

struct SigState {
    sig_max_tx: u64,
    sig_max_ms: Duration,
    ms_to_sig: Duration,
    tx_count: u64,
    request_storing_disabled: bool,
}

/// The RPC frontend of the replicated key-value service.
///
/// Construct with [`RpcFrontend::new`] or [`RpcFrontend::builder`]; the
/// built-in management methods are installed automatically. Application
/// handlers are installed before serving begins and may be replaced.
pub struct RpcFrontend {
    store: Arc<dyn Store>,
    certs: Option<TypedMap<CallerCert, CallerId>>,
    client_signatures: Option<TypedMap<CallerId, SignedReq>>,
    nodes: TypedMap<NodeId, NodeInfo>,
    handlers: RwLock<HashMap<String, Handler>>,
    default_handler: RwLock<Option<Handler>>,
    verifiers: Mutex<VerifierCache>,
    forwarder: RwLock<Option<Arc<dyn RequestForwarder>>>,
    consensus: RwLock<Option<Arc<dyn Consensus>>>,
    history: RwLock<Option<Arc<dyn TxHistory>>>,
    sig_state: Mutex<SigState>,
    metrics: Mutex<Metrics>,
}

/// Builder for [`RpcFrontend`].
pub struct RpcFrontendBuilder {
    store: Arc<dyn Store>,
    config: FrontendConfig,
    certs: Option<TypedMap<CallerCert, CallerId>>,
    client_signatures: Option<TypedMap<CallerId, SignedReq>>,
    verifier_capacity: Option<usize>,
}

impl RpcFrontendBuilder {
    /// Start building a frontend over `store`.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            config: FrontendConfig::default(),
            certs: None,
            client_signatures: None,
            verifier_capacity: None,
        }
    }

    /// Use `config` after validating it.
    pub fn config(mut self, config: FrontendConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Authenticate callers against this certificates map.
    pub fn certs(mut self, certs: TypedMap<CallerCert, CallerId>) -> Self {
        self.certs = Some(certs);
        self
    }

    /// Persist accepted signed requests into this map.
    pub fn client_signatures(
        mut self,
        client_signatures: TypedMap<CallerId, SignedReq>,
    ) -> Self {
        self.client_signatures = Some(client_signatures);
        self
    }

    /// Bound the verifier cache to `capacity` entries.
    pub fn verifier_capacity(mut self, capacity: usize) -> Self {
        self.verifier_capacity = Some(capacity);
        self
    }

    /// Build the frontend and install the built-in methods.
    pub fn build(self) -> Arc<RpcFrontend> {
        let sig_max_ms = Duration::from_millis(self.config.sig_max_ms);
        let frontend = Arc::new(RpcFrontend {
            store: self.store,
            certs: self.certs,
            client_signatures: self.client_signatures,
            nodes: NODES,
            handlers: RwLock::new(HashMap::new()),
            default_handler: RwLock::new(None),
            verifiers: Mutex::new(match self.verifier_capacity {
                Some(capacity) => VerifierCache::with_capacity(capacity),
                None => VerifierCache::unbounded(),
            }),
            forwarder: RwLock::new(None),
            consensus: RwLock::new(None),
            history: RwLock::new(None),
            sig_state: Mutex::new(SigState {
                sig_max_tx: self.config.sig_max_tx,
                sig_max_ms,
                ms_to_sig: sig_max_ms,
                tx_count: 0,
                request_storing_disabled: self.config.request_storing_disabled,
            }),
            metrics: Mutex::new(Metrics::new()),
        });
        RpcFrontend::install_builtins(&frontend);
        frontend
    }
}

impl RpcFrontend {
    /// Frontend with caller authentication disabled and default
    /// configuration.
    pub fn new(store: Arc<dyn Store>) -> Arc<Self> {
        RpcFrontendBuilder::new(store).build()
    }

    /// Start building a frontend over `store`.
    pub fn builder(store: Arc<dyn Store>) -> RpcFrontendBuilder {
        RpcFrontendBuilder::new(store)
    }

    // =========================================================================
    // Handler installation
    // =========================================================================

    /// Install `func` for `method`, replacing any existing handler.
    pub fn install<F>(&self, method: &str, func: F, rw: ReadWrite)
    where
        F: Fn(&mut RequestArgs<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.install_full(
            method,
            func,
            rw,
            empty_schema(),
            empty_schema(),
            Forwardable::CanForward,
        );
    }

    /// Install `func` with explicit schemas and forwarding policy.
    pub fn install_full<F>(
        &self,
        method: &str,
        func: F,
        rw: ReadWrite,
        params_schema: Value,
        result_schema: Value,
        forwardable: Forwardable,
    ) where
        F: Fn(&mut RequestArgs<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers.write().insert(method.to_string(), Handler {
            func: Arc::new(func),
            rw,
            params_schema,
            result_schema,
            forwardable,
        });
    }

    /// Install a minimal handler needing only the transaction and the
    /// request parameters.
    pub fn install_minimal<F>(&self, method: &str, func: F, rw: ReadWrite)
    where
        F: Fn(&mut dyn Transaction, &Value) -> HandlerResult + Send + Sync + 'static,
    {
        self.install(method, move |args| func(&mut *args.tx, args.params), rw);
    }

    /// Install `func` with schemas inferred from typed parameter and
    /// result shapes.
    pub fn install_auto<In, Out, F>(
        &self,
        method: &str,
        func: F,
        rw: ReadWrite,
        forwardable: Forwardable,
    ) where
        In: JsonSchema,
        Out: JsonSchema,
        F: Fn(&mut RequestArgs<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.install_full(
            method,
            func,
            rw,
            schema_of::<In>(),
            schema_of::<Out>(),
            forwardable,
        );
    }

    /// Install `func` taking no parameters, with a result schema inferred
    /// from the typed result shape.
    pub fn install_auto_out<Out, F>(
        &self,
        method: &str,
        func: F,
        rw: ReadWrite,
        forwardable: Forwardable,
    ) where
        Out: JsonSchema,
        F: Fn(&mut RequestArgs<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.install_full(
            method,
            func,
            rw,
            empty_schema(),
            schema_of::<Out>(),
            forwardable,
        );
    }

    /// Install the fallback handler invoked for unknown methods.
    pub fn set_default<F>(&self, func: F, rw: ReadWrite)
    where
        F: Fn(&mut RequestArgs<'_>) -> HandlerResult + Send + Sync + 'static,
    {
        *self.default_handler.write() = Some(Handler {
            func: Arc::new(func),
            rw,
            params_schema: empty_schema(),
            result_schema: empty_schema(),
            forwardable: Forwardable::CanForward,
        });
    }

    // =========================================================================
    // Runtime policy
    // =========================================================================

    /// Install the forwarder channel used for follower-to-leader
    /// forwarding.
    pub fn set_forwarder(&self, forwarder: Arc<dyn RequestForwarder>) {
        *self.forwarder.write() = Some(forwarder);
    }

    /// Re-tune both signature intervals; resets the tick countdown.
    pub fn set_sig_intervals(&self, sig_max_tx: u64, sig_max_ms: Duration) {
        let mut state = self.sig_state.lock();
        state.sig_max_tx = sig_max_tx.max(1);
        state.sig_max_ms = sig_max_ms;
        state.ms_to_sig = sig_max_ms;
    }

    /// Persist client signature records with the signed content cleared.
    pub fn disable_request_storing(&self) {
        self.sig_state.lock().request_storing_disabled = true;
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Process a serialized client request.
    ///
    /// Detects the pack, validates the caller, verifies a signed envelope
    /// when present, records the request with history and leaves the call
    /// pending: the response is produced out-of-band by the transport's
    /// dispatch path. Intake failures are returned immediately as packed
    /// error envelopes.
    pub fn process(&self, ctx: &mut RpcContext, input: &[u8]) -> Vec<u8> {
        let mut tx = self.store.begin();

        ctx.pack = jsonrpc::detect_pack(input);
        let Some(pack) = ctx.pack else {
            return jsonrpc::pack(
                &jsonrpc::error_response(0, ErrorCode::InvalidRequest, "Empty request."),
                Pack::Text,
            );
        };

        let Some(caller_id) = self.valid_caller(tx.as_mut(), &ctx.caller_cert) else {
            return jsonrpc::pack(
                &jsonrpc::error_response(
                    0,
                    ErrorCode::InvalidCallerId,
                    "No corresponding caller entry exists.",
                ),
                pack,
            );
        };

        let rpc = match self.unpack_json(input, pack) {
            Ok(rpc) => rpc,
            Err(response) => return jsonrpc::pack(&response, pack),
        };

        let mut unsigned = &rpc;
        let inner;
        if rpc.get(jsonrpc::SIG).is_some() {
            let Some(req) = rpc.get(jsonrpc::REQ) else {
                return jsonrpc::pack(
                    &jsonrpc::error_response(
                        0,
                        ErrorCode::InvalidRequest,
                        "Signed envelope is missing the req field.",
                    ),
                    pack,
                );
            };
            if self
                .verify_client_signature(
                    tx.as_mut(),
                    &ctx.caller_cert,
                    caller_id,
                    &rpc,
                    input,
                    ctx.fwd.is_some(),
                )
                .is_none()
            {
                let inner_id = req.get(jsonrpc::ID).and_then(Value::as_u64).unwrap_or(0);
                return jsonrpc::pack(
                    &jsonrpc::error_response(
                        inner_id,
                        ErrorCode::InvalidClientSignature,
                        "Failed to verify client signature.",
                    ),
                    pack,
                );
            }
            inner = req.clone();
            unsigned = &inner;
        }

        let Some(jsonrpc_id) = unsigned.get(jsonrpc::ID).and_then(Value::as_u64) else {
            return jsonrpc::pack(
                &jsonrpc::error_response(
                    0,
                    ErrorCode::InvalidRequest,
                    "Missing or invalid id field.",
                ),
                pack,
            );
        };

        self.refresh_history();
        if let Some(history) = self.cached_history() {
            let reqid = RequestId {
                caller_id,
                session_id: ctx.client_session_id,
                seq_no: jsonrpc_id,
            };
            history.add_request(reqid, ctx.actor, input);
            tx.set_request_id(reqid);
        }

        ctx.is_pending = true;
        Vec::new()
    }

    /// Process a request forwarded by a follower.
    ///
    /// The forwarding follower already resolved and verified the caller;
    /// `ctx.fwd` carries its caller id. Returns the serialized reply to
    /// ship back over the forwarder channel.
    pub fn process_forwarded(
        &self,
        ctx: &mut RpcContext,
        input: &[u8],
    ) -> Result<Vec<u8>, FrontendError> {
        if ctx.fwd.is_none() {
            return Err(FrontendError::MissingForwardedContext);
        }

        let mut tx = self.store.begin();

        self.refresh_consensus();
        if let (Some(fwd), Some(consensus)) = (ctx.fwd.as_mut(), self.cached_consensus()) {
            fwd.leader_id = consensus.id();
        }

        let Some(pack) = jsonrpc::detect_pack(input) else {
            return Ok(jsonrpc::pack(
                &jsonrpc::error_response(
                    0,
                    ErrorCode::InvalidRequest,
                    "Empty forwarded request.",
                ),
                Pack::Text,
            ));
        };

        let caller_id = ctx.fwd.as_ref().map(|fwd| fwd.caller_id).unwrap_or(INVALID_ID);
        if self.certs.is_some() && caller_id == INVALID_ID {
            return Ok(jsonrpc::pack(
                &jsonrpc::error_response(
                    0,
                    ErrorCode::InvalidCallerId,
                    "No corresponding caller entry exists (forwarded).",
                ),
                pack,
            ));
        }

        let rpc = match self.unpack_json(input, pack) {
            Ok(rpc) => rpc,
            Err(response) => return Ok(jsonrpc::pack(&response, pack)),
        };

        // The follower already verified the signature; unwrap without
        // re-verifying.
        let mut signed_request = SignedReq::default();
        let mut unsigned = &rpc;
        let inner;
        if rpc.get(jsonrpc::SIG).is_some() {
            signed_request = match SignedReq::from_envelope(&rpc, input) {
                Ok(signed_request) => signed_request,
                Err(err) => {
                    warn!(%err, "malformed forwarded signed envelope");
                    return Ok(jsonrpc::pack(
                        &jsonrpc::error_response(
                            0,
                            ErrorCode::InvalidRequest,
                            "Malformed signed envelope.",
                        ),
                        pack,
                    ));
                }
            };
            let Some(req) = rpc.get(jsonrpc::REQ) else {
                return Ok(jsonrpc::pack(
                    &jsonrpc::error_response(
                        0,
                        ErrorCode::InvalidRequest,
                        "Signed envelope is missing the req field.",
                    ),
                    pack,
                ));
            };
            inner = req.clone();
            unsigned = &inner;
        }

        match self.process_json(ctx, tx.as_mut(), caller_id, unsigned, &signed_request) {
            Some(reply) => Ok(jsonrpc::pack(&reply, pack)),
            None => Err(FrontendError::ForwardedRequestCannotForward),
        }
    }

    /// Process a request delivered by the byzantine-fault-tolerant
    /// ordering path: default pack, synthesized context, signed envelope
    /// unwrapped without verification.
    pub fn process_bft(&self, input: &[u8]) -> Vec<u8> {
        let mut tx = self.store.begin();
        let mut ctx = RpcContext::new(0, CallerCert::new(), Actor::Users);
        let pack = Pack::MsgPack;
        let caller_id: CallerId = 1;

        let rpc = match self.unpack_json(input, pack) {
            Ok(rpc) => rpc,
            Err(response) => return jsonrpc::pack(&response, pack),
        };

        // Strip the signed envelope without verification; the ordering
        // path already authenticated the request.
        let mut signed_request = SignedReq::default();
        let mut unsigned = &rpc;
        let inner;
        if rpc.get(jsonrpc::SIG).is_some() {
            signed_request = match SignedReq::from_envelope(&rpc, input) {
                Ok(signed_request) => signed_request,
                Err(err) => {
                    warn!(%err, "malformed signed envelope");
                    return jsonrpc::pack(
                        &jsonrpc::error_response(
                            0,
                            ErrorCode::InvalidRequest,
                            "Malformed signed envelope.",
                        ),
                        pack,
                    );
                }
            };
            let Some(req) = rpc.get(jsonrpc::REQ) else {
                return jsonrpc::pack(
                    &jsonrpc::error_response(
                        0,
                        ErrorCode::InvalidRequest,
                        "Signed envelope is missing the req field.",
                    ),
                    pack,
                );
            };
            inner = req.clone();
            unsigned = &inner;
        }

        match self.process_json(&mut ctx, tx.as_mut(), caller_id, unsigned, &signed_request) {
            Some(reply) => jsonrpc::pack(&reply, pack),
            None => jsonrpc::pack(
                &jsonrpc::error_response(
                    ctx.seq_no,
                    ErrorCode::InternalError,
                    "No response produced.",
                ),
                pack,
            ),
        }
    }

    /// Periodic upkeep, driven by the host.
    ///
    /// Feeds the tx-rate metrics, refreshes the consensus pointer and, on
    /// the leader, counts down to wall-clock signature emission: when the
    /// countdown expires it resets to `sig_max_ms` and a signature is
    /// emitted whenever a commit gap exists.
    pub fn tick(&self, elapsed: Duration) {
        let tx_count = {
            let mut state = self.sig_state.lock();
            let count = state.tx_count;
            state.tx_count = 0;
            count
        };
        self.metrics.lock().track_tx_rates(elapsed, tx_count);

        self.refresh_consensus();
        let Some(consensus) = self.cached_consensus() else {
            return;
        };
        if !consensus.is_leader() {
            return;
        }

        {
            let mut state = self.sig_state.lock();
            if elapsed < state.ms_to_sig {
                state.ms_to_sig -= elapsed;
                return;
            }
            state.ms_to_sig = state.sig_max_ms;
        }

        self.refresh_history();
        if let Some(history) = self.cached_history() {
            if self.store.commit_gap() > 0 {
                debug!("emitting signature on tick");
                history.emit_signature();
            }
        }
    }

    // =========================================================================
    // Executor
    // =========================================================================

    /// Dispatch a decoded request to its handler inside `tx`.
    ///
    /// Returns `None` when the request must stay pending (a write on a
    /// follower that the transport should forward), otherwise the reply
    /// envelope.
    pub fn process_json(
        &self,
        ctx: &mut RpcContext,
        tx: &mut dyn Transaction,
        caller_id: CallerId,
        rpc: &Value,
        signed_request: &SignedReq,
    ) -> Option<Value> {
        let Some(seq_no) = rpc.get(jsonrpc::ID).and_then(Value::as_u64) else {
            return Some(jsonrpc::error_response(
                0,
                ErrorCode::InvalidRequest,
                "Missing or invalid id field.",
            ));
        };
        ctx.seq_no = seq_no;

        if rpc.get(jsonrpc::JSON_RPC).and_then(Value::as_str) != Some(jsonrpc::RPC_VERSION) {
            return Some(jsonrpc::error_response(
                seq_no,
                ErrorCode::InvalidRequest,
                "Wrong JSON-RPC version.",
            ));
        }

        let params = match rpc.get(jsonrpc::PARAMS) {
            Some(params) if !params.is_array() && !params.is_object() => {
                return Some(jsonrpc::error_response(
                    seq_no,
                    ErrorCode::InvalidRequest,
                    "If present, parameters must be an array or object",
                ));
            }
            Some(params) => params.clone(),
            None => Value::Null,
        };

        let Some(method) = rpc.get(jsonrpc::METHOD).and_then(Value::as_str) else {
            return Some(jsonrpc::error_response(
                seq_no,
                ErrorCode::InvalidRequest,
                "Missing method field.",
            ));
        };

        let handler = match self.handlers.read().get(method) {
            Some(handler) => handler.clone(),
            None => match self.default_handler.read().clone() {
                Some(handler) => handler,
                None => {
                    debug!(method, "method not found");
                    return Some(jsonrpc::error_response_with_data(
                        seq_no,
                        ErrorCode::MethodNotFound,
                        "Method not found.",
                        json!(method),
                    ));
                }
            },
        };

        self.refresh_consensus();
        self.refresh_history();
        let consensus = self.cached_consensus();

        let is_leader = consensus.as_ref().map_or(true, |c| c.is_leader());
        if !is_leader {
            match handler.rw {
                ReadWrite::Read => {}
                ReadWrite::Write => {
                    return self.forward_or_redirect(ctx, handler.forwardable);
                }
                ReadWrite::MayWrite => {
                    let readonly = rpc
                        .get(jsonrpc::READONLY)
                        .and_then(Value::as_bool)
                        .unwrap_or(true);
                    if !readonly {
                        return self.forward_or_redirect(ctx, handler.forwardable);
                    }
                }
            }
        }

        self.sig_state.lock().tx_count += 1;

        let func = handler.func.clone();
        loop {
            let outcome = {
                let mut args = RequestArgs {
                    ctx: &mut *ctx,
                    tx: &mut *tx,
                    caller_id,
                    method,
                    params: &params,
                    signed_request,
                };
                (func)(&mut args)
            };

            match outcome {
                Ok(HandlerOutcome::Error(error)) => {
                    return Some(jsonrpc::custom_error_response(ctx.seq_no, error));
                }
                Ok(HandlerOutcome::Success(payload)) => match tx.commit() {
                    CommitOutcome::Ok => {
                        return Some(self.annotate_result(ctx.seq_no, payload, tx));
                    }
                    CommitOutcome::Conflict => {
                        debug!(method, "commit conflict, re-executing handler");
                        continue;
                    }
                    CommitOutcome::NoReplicate => {
                        return Some(jsonrpc::error_response(
                            ctx.seq_no,
                            ErrorCode::TxFailedToReplicate,
                            "Transaction failed to replicate.",
                        ));
                    }
                },
                Err(HandlerError::Rpc { code, message }) => {
                    return Some(jsonrpc::error_response(ctx.seq_no, code, message));
                }
                Err(HandlerError::Parse { pointer, message }) => {
                    return Some(jsonrpc::error_response(
                        ctx.seq_no,
                        ErrorCode::ParseError,
                        format!("At {pointer}: {message}"),
                    ));
                }
                Err(err) => {
                    return Some(jsonrpc::error_response(
                        ctx.seq_no,
                        ErrorCode::InternalError,
                        err.to_string(),
                    ));
                }
            }
        }
    }

    /// Annotate a committed reply with `commit`, and with `term` and
    /// `global_commit` when consensus is installed. On the leader, hitting
    /// the midpoint of the transaction-count signature interval emits a
    /// signature.
    fn annotate_result(&self, seq_no: u64, payload: Value, tx: &dyn Transaction) -> Value {
        let mut result = jsonrpc::result_response(seq_no, payload);
        let commit: Version = tx
            .commit_version()
            .or_else(|| tx.read_version())
            .unwrap_or_else(|| self.store.current_version());
        result[jsonrpc::COMMIT] = json!(commit);

        if let Some(consensus) = self.cached_consensus() {
            result[jsonrpc::TERM] = json!(consensus.term());
            result[jsonrpc::GLOBAL_COMMIT] = json!(consensus.commit_idx());

            let sig_max_tx = self.sig_state.lock().sig_max_tx;
            if consensus.is_leader() && commit % sig_max_tx == sig_max_tx / 2 {
                if let Some(history) = self.cached_history() {
                    debug!(commit, "emitting signature at tx-count interval");
                    history.emit_signature();
                }
            }
        }
        result
    }

    // =========================================================================
    // Intake helpers
    // =========================================================================

    /// Resolve the caller certificate to a caller id.
    ///
    /// With no certificates map configured authentication is disabled and
    /// every caller maps to [`INVALID_ID`]. Otherwise an empty certificate
    /// or a certificate without a map entry resolves to no caller.
    fn valid_caller(&self, tx: &mut dyn Transaction, caller_cert: &[u8]) -> Option<CallerId> {
        let Some(certs) = self.certs else {
            return Some(INVALID_ID);
        };
        if caller_cert.is_empty() {
            return None;
        }
        let mut view = certs.view(tx);
        match view.get(&caller_cert.to_vec()) {
            Ok(found) => found,
            Err(err) => {
                warn!(%err, "failed to read certificates map");
                None
            }
        }
    }

    /// Decode `input` into a JSON-RPC object, or an error envelope.
    fn unpack_json(&self, input: &[u8], pack: Pack) -> Result<Value, Value> {
        match jsonrpc::unpack(input, pack) {
            Ok(rpc) if rpc.is_object() => Ok(rpc),
            Ok(_) => Err(jsonrpc::error_response(
                0,
                ErrorCode::InvalidRequest,
                "Request body is not an object.",
            )),
            Err(err) => {
                debug!(%err, "failed to decode request");
                Err(jsonrpc::error_response(
                    0,
                    ErrorCode::InvalidRequest,
                    "Failed to deserialize request.",
                ))
            }
        }
    }

    // =========================================================================
    // Shared-state accessors used across the frontend modules
    // =========================================================================

    pub(crate) fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub(crate) fn nodes_map(&self) -> TypedMap<NodeId, NodeInfo> {
        self.nodes
    }

    pub(crate) fn client_signatures_map(&self) -> Option<TypedMap<CallerId, SignedReq>> {
        self.client_signatures
    }

    pub(crate) fn verifier_cache(&self) -> &Mutex<VerifierCache> {
        &self.verifiers
    }

    pub(crate) fn has_forwarder(&self) -> bool {
        self.forwarder.read().is_some()
    }

    pub(crate) fn request_storing_disabled(&self) -> bool {
        self.sig_state.lock().request_storing_disabled
    }

    pub(crate) fn refresh_consensus(&self) {
        *self.consensus.write() = self.store.consensus();
    }

    pub(crate) fn cached_consensus(&self) -> Option<Arc<dyn Consensus>> {
        self.consensus.read().clone()
    }

    pub(crate) fn refresh_history(&self) {
        *self.history.write() = self.store.history();
    }

    pub(crate) fn cached_history(&self) -> Option<Arc<dyn TxHistory>> {
        self.history.read().clone()
    }

    pub(crate) fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.lock().snapshot()
    }

    pub(crate) fn installed_methods(&self) -> Vec<String> {
        self.handlers.read().keys().cloned().collect()
    }

    pub(crate) fn method_schemas(&self, method: &str) -> Option<(Value, Value)> {
        self.handlers
            .read()
            .get(method)
            .map(|handler| (handler.params_schema.clone(), handler.result_schema.clone()))
    }
}
