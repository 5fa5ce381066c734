//! Madrona library entry point.
//!
//! Madrona is the RPC frontend of a replicated, transactional key-value
//! service: the single entry point through which authenticated clients
//! submit JSON-RPC calls against replicated state. The consensus module,
//! the store engine, the merkle history and the wire transport are
//! collaborators behind narrow trait seams, so the frontend can be driven
//! deterministically in tests and embedded under any host runtime that
//! serializes calls per instance.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use madrona::RpcFrontend;
//! use madrona::context::{Actor, RpcContext};
//! use madrona::store::MemoryStore;
//!
//! let store = MemoryStore::new();
//! let frontend = RpcFrontend::new(store);
//! let mut ctx = RpcContext::new(1, Vec::new(), Actor::Users);
//! let reply = frontend.process(&mut ctx, br#"{"jsonrpc":"2.0","id":1,"method":"LIST_METHODS"}"#);
//! # let _ = reply;
//! ```

#![warn(missing_docs)]

/// Frontend configuration knobs.
pub mod config;
/// Consensus seam: leader identity, terms, commit progress.
pub mod consensus;
/// Per-request context shared with the transport.
pub mod context;
/// Forwarder seam for follower-to-leader forwarding.
pub mod forwarder;
/// The frontend object, handler model and built-in methods.
pub mod frontend;
/// History seam: request log and signature emission.
pub mod history;
/// JSON-RPC envelope codec.
pub mod jsonrpc;
/// Transaction-rate metrics.
pub mod metrics;
/// Node directory types.
pub mod nodes;
/// Signed client request records.
pub mod signed_req;
/// Store seam and the deterministic in-memory store.
pub mod store;

/// Deterministic fixtures for frontend tests.
pub mod testing;

/// Per-caller request verifiers and their cache.
pub mod verifier;

pub use config::FrontendConfig;
pub use context::Actor;
pub use context::CallerId;
pub use context::INVALID_ID;
pub use context::RpcContext;
pub use frontend::FrontendError;
pub use frontend::RpcFrontend;
pub use frontend::RpcFrontendBuilder;
pub use frontend::handler::Forwardable;
pub use frontend::handler::HandlerOutcome;
pub use frontend::handler::HandlerResult;
pub use frontend::handler::ReadWrite;
pub use frontend::handler::RequestArgs;
pub use jsonrpc::ErrorCode;
pub use jsonrpc::Pack;
pub use signed_req::SignedReq;
