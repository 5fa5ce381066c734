//! Per-caller request verifiers.
//!
//! A caller certificate is an Ed25519 verifying key; signed requests are
//! authenticated against it. Building a verifier validates the key bytes,
//! so verifiers are cached per caller id and reused across requests. The
//! cache is unbounded by default; embedders can set a capacity, in which
//! case the least recently used entry is evicted.

use std::collections::HashMap;
use std::sync::Arc;

use ed25519_dalek::Signature;
use ed25519_dalek::Verifier;
use ed25519_dalek::VerifyingKey;
use thiserror::Error;

use crate::context::CallerId;

/// Ed25519 public key size in bytes.
const ED25519_PUBLIC_KEY_LEN: usize = 32;

/// Failure while building a verifier from certificate bytes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifierError {
    /// The certificate does not have the size of an Ed25519 key.
    #[error("caller certificate must be {expected} bytes, got {actual}")]
    MalformedCertificate {
        /// Required length.
        expected: usize,
        /// Length presented.
        actual: usize,
    },
    /// The certificate bytes are not a valid curve point.
    #[error("caller certificate is not a valid Ed25519 key")]
    InvalidKey,
    /// Weak and small-order keys are rejected.
    #[error("weak Ed25519 caller key rejected")]
    WeakKey,
}

/// Verifies request signatures for one caller.
#[derive(Debug)]
pub struct RequestVerifier {
    key: VerifyingKey,
}

impl RequestVerifier {
    /// Build a verifier from caller certificate bytes. Fails closed on
    /// malformed, invalid or weak keys.
    pub fn from_cert(cert: &[u8]) -> Result<Self, VerifierError> {
        let bytes: &[u8; ED25519_PUBLIC_KEY_LEN] =
            cert.try_into()
                .map_err(|_| VerifierError::MalformedCertificate {
                    expected: ED25519_PUBLIC_KEY_LEN,
                    actual: cert.len(),
                })?;
        let key = VerifyingKey::from_bytes(bytes).map_err(|_| VerifierError::InvalidKey)?;
        if key.is_weak() {
            return Err(VerifierError::WeakKey);
        }
        Ok(Self { key })
    }

    /// True iff `signature` authenticates `message` under this caller's key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        self.key.verify(message, &signature).is_ok()
    }
}

struct CacheEntry {
    verifier: Arc<RequestVerifier>,
    last_used: u64,
}

/// Cache of per-caller verifiers keyed by caller id.
pub struct VerifierCache {
    entries: HashMap<CallerId, CacheEntry>,
    capacity: Option<usize>,
    clock: u64,
}

impl VerifierCache {
    /// Cache without an eviction bound.
    pub fn unbounded() -> Self {
        Self {
            entries: HashMap::new(),
            capacity: None,
            clock: 0,
        }
    }

    /// Cache bounded to `capacity` entries (minimum one), evicting the
    /// least recently used entry when full.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: Some(capacity.max(1)),
            clock: 0,
        }
    }

    /// Fetch the verifier for `caller_id`, building it from `cert` on
    /// first use.
    pub fn get_or_create(
        &mut self,
        caller_id: CallerId,
        cert: &[u8],
    ) -> Result<Arc<RequestVerifier>, VerifierError> {
        self.clock += 1;
        let now = self.clock;
        if let Some(entry) = self.entries.get_mut(&caller_id) {
            entry.last_used = now;
            return Ok(entry.verifier.clone());
        }
        let verifier = Arc::new(RequestVerifier::from_cert(cert)?);
        if let Some(capacity) = self.capacity {
            while self.entries.len() >= capacity {
                let oldest = self
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_used)
                    .map(|(id, _)| *id);
                match oldest {
                    Some(id) => self.entries.remove(&id),
                    None => break,
                };
            }
        }
        self.entries.insert(caller_id, CacheEntry {
            verifier: verifier.clone(),
            last_used: now,
        });
        Ok(verifier)
    }

    /// Number of cached verifiers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
