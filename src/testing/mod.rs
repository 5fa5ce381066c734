//! Deterministic fixtures for frontend tests.
//!
//! Pair them with [`crate::store::MemoryStore`] to drive the frontend end
//! to end.
//!
//! # Tiger Style
//!
//! - All fixtures are bounded and deterministic
//! - No real network or file I/O
//! - Keys derive from fixed seed bytes, so failures reproduce exactly

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use parking_lot::Mutex;
use serde_json::Value;
use serde_json::json;

use crate::consensus::Consensus;
use crate::consensus::Term;
use crate::context::Actor;
use crate::context::CallerId;
use crate::forwarder::RequestForwarder;
use crate::history::RequestId;
use crate::history::TxHistory;
use crate::jsonrpc;
use crate::nodes::NodeId;
use crate::store::Version;

// =============================================================================
// ScriptedConsensus
// =============================================================================

struct ConsensusState {
    id: NodeId,
    leader: NodeId,
    is_leader: bool,
    term: Term,
    commit_idx: Version,
}

/// Consensus whose observations are set by the test.
pub struct ScriptedConsensus {
    state: Mutex<ConsensusState>,
}

impl ScriptedConsensus {
    /// A leader with the given id.
    pub fn leader(id: NodeId) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ConsensusState {
                id,
                leader: id,
                is_leader: true,
                term: 1,
                commit_idx: 0,
            }),
        })
    }

    /// A follower with the given id that believes `leader` leads.
    pub fn follower(id: NodeId, leader: NodeId) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ConsensusState {
                id,
                leader,
                is_leader: false,
                term: 1,
                commit_idx: 0,
            }),
        })
    }

    /// Change leadership.
    pub fn set_leader(&self, leader: NodeId, is_leader: bool) {
        let mut state = self.state.lock();
        state.leader = leader;
        state.is_leader = is_leader;
    }

    /// Set the reported term.
    pub fn set_term(&self, term: Term) {
        self.state.lock().term = term;
    }

    /// Set the reported global commit index.
    pub fn set_commit_idx(&self, commit_idx: Version) {
        self.state.lock().commit_idx = commit_idx;
    }
}

impl Consensus for ScriptedConsensus {
    fn id(&self) -> NodeId {
        self.state.lock().id
    }

    fn is_leader(&self) -> bool {
        self.state.lock().is_leader
    }

    fn leader(&self) -> NodeId {
        self.state.lock().leader
    }

    fn term(&self) -> Term {
        self.state.lock().term
    }

    fn term_of(&self, _version: Version) -> Term {
        self.state.lock().term
    }

    fn commit_idx(&self) -> Version {
        self.state.lock().commit_idx
    }
}

// =============================================================================
// RecordingHistory
// =============================================================================

/// One request recorded by [`RecordingHistory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Request identity.
    pub id: RequestId,
    /// Frontend class the request entered through.
    pub actor: Actor,
    /// Raw request bytes.
    pub request: Vec<u8>,
}

/// History that records requests and counts signature emissions.
#[derive(Default)]
pub struct RecordingHistory {
    requests: Mutex<Vec<RecordedRequest>>,
    signatures: AtomicUsize,
}

impl RecordingHistory {
    /// Empty history.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All recorded requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Number of signatures emitted so far.
    pub fn signature_count(&self) -> usize {
        self.signatures.load(Ordering::SeqCst)
    }
}

impl TxHistory for RecordingHistory {
    fn add_request(&self, id: RequestId, actor: Actor, request: &[u8]) {
        self.requests.lock().push(RecordedRequest {
            id,
            actor,
            request: request.to_vec(),
        });
    }

    fn emit_signature(&self) {
        self.signatures.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// QueueForwarder
// =============================================================================

/// One request captured by [`QueueForwarder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedRequest {
    /// Destination node.
    pub to: NodeId,
    /// Caller resolved by the forwarding follower.
    pub caller_id: CallerId,
    /// Session the request arrived on.
    pub session_id: u64,
    /// Raw request bytes.
    pub input: Vec<u8>,
}

/// Forwarder that captures forwarded requests instead of sending them.
#[derive(Default)]
pub struct QueueForwarder {
    sent: Mutex<Vec<ForwardedRequest>>,
}

impl QueueForwarder {
    /// Empty forwarder.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All captured requests.
    pub fn sent(&self) -> Vec<ForwardedRequest> {
        self.sent.lock().clone()
    }
}

impl RequestForwarder for QueueForwarder {
    fn forward(&self, to: NodeId, caller_id: CallerId, session_id: u64, input: &[u8]) -> bool {
        self.sent.lock().push(ForwardedRequest {
            to,
            caller_id,
            session_id,
            input: input.to_vec(),
        });
        true
    }
}

// =============================================================================
// Keys and signed envelopes
// =============================================================================

/// Deterministic signing key from a seed byte.
pub fn signing_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

/// Caller certificate bytes for a signing key: its Ed25519 verifying key.
pub fn cert_for(key: &SigningKey) -> Vec<u8> {
    key.verifying_key().as_bytes().to_vec()
}

/// Wrap `inner` in a signed envelope: the signature covers the canonical
/// MessagePack packing of the inner envelope, the same bytes the frontend
/// verifies against.
pub fn sign_envelope(key: &SigningKey, inner: &Value) -> Value {
    let packed = jsonrpc::pack(inner, jsonrpc::Pack::MsgPack);
    let signature = key.sign(&packed);
    json!({
        "sig": signature.to_bytes().to_vec(),
        "req": inner,
        "md": "sha256",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_consensus_reports_leadership() {
        let consensus = ScriptedConsensus::follower(2, 1);
        assert!(!consensus.is_leader());
        assert_eq!(consensus.leader(), 1);
        consensus.set_leader(2, true);
        assert!(consensus.is_leader());
    }

    #[test]
    fn recording_history_counts_signatures() {
        let history = RecordingHistory::new();
        history.emit_signature();
        history.emit_signature();
        assert_eq!(history.signature_count(), 2);
    }

    #[test]
    fn queue_forwarder_captures_requests() {
        let forwarder = QueueForwarder::new();
        assert!(forwarder.forward(1, 7, 3, b"bytes"));
        assert_eq!(forwarder.sent(), vec![ForwardedRequest {
            to: 1,
            caller_id: 7,
            session_id: 3,
            input: b"bytes".to_vec(),
        }]);
    }

    #[test]
    fn sign_envelope_wraps_inner_request() {
        let key = signing_key(1);
        let inner = json!({"jsonrpc": "2.0", "id": 1, "method": "m"});
        let envelope = sign_envelope(&key, &inner);
        assert_eq!(envelope["req"], inner);
        assert!(!envelope["sig"].as_array().unwrap().is_empty());
    }
}
