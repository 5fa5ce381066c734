//! Signed client requests.
//!
//! A caller may wrap an RPC in a signed envelope `{sig, req, md}`. The
//! frontend verifies `sig` over the canonical MessagePack packing of `req`
//! and persists the latest accepted record per caller in the replicated
//! store, keyed by caller id.

use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::context::CallerId;
use crate::jsonrpc;
use crate::jsonrpc::CodecError;
use crate::store::TypedMap;

/// Hash algorithm declared by a signed envelope.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum MdAlgorithm {
    /// No pre-hashing declared.
    #[default]
    None,
    /// SHA-256.
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

/// Latest signed request accepted from a caller.
///
/// `req` holds the canonical MessagePack packing of the signed inner
/// envelope; `raw_req` holds the client's original bytes. Either may be
/// empty: `req` is cleared before persisting when request storing is
/// disabled, and unsigned requests leave the whole record empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedReq {
    /// Signature bytes.
    pub sig: Vec<u8>,
    /// The signed content: packed inner envelope.
    pub req: Vec<u8>,
    /// The original request body.
    pub raw_req: Vec<u8>,
    /// The hashing algorithm used.
    pub md: MdAlgorithm,
}

impl SignedReq {
    /// Build a record from a signed envelope and the raw input it arrived
    /// in. Fields absent from the envelope stay empty.
    pub fn from_envelope(envelope: &Value, raw_req: &[u8]) -> Result<Self, CodecError> {
        let mut signed = SignedReq {
            raw_req: raw_req.to_vec(),
            ..SignedReq::default()
        };
        if let Some(sig) = envelope.get(jsonrpc::SIG) {
            signed.sig =
                serde_json::from_value(sig.clone()).map_err(|e| CodecError::SignedField {
                    field: jsonrpc::SIG,
                    reason: e.to_string(),
                })?;
        }
        if let Some(req) = envelope.get(jsonrpc::REQ) {
            signed.req = jsonrpc::to_msgpack(req)?;
        }
        if let Some(md) = envelope.get(jsonrpc::MD) {
            signed.md =
                serde_json::from_value(md.clone()).map_err(|e| CodecError::SignedField {
                    field: jsonrpc::MD,
                    reason: e.to_string(),
                })?;
        }
        Ok(signed)
    }

    /// JSON projection. Empty byte fields are omitted; the packed `req` is
    /// re-expanded into the inner envelope object.
    pub fn to_json(&self) -> Result<Value, CodecError> {
        let mut value = json!({});
        if !self.sig.is_empty() {
            value[jsonrpc::SIG] = json!(self.sig);
        }
        if !self.req.is_empty() {
            value[jsonrpc::REQ] = jsonrpc::from_msgpack(&self.req)?;
        }
        if !self.raw_req.is_empty() {
            value["raw_req"] = json!(self.raw_req);
        }
        if self.md != MdAlgorithm::None {
            value[jsonrpc::MD] = json!(self.md);
        }
        Ok(value)
    }

    /// Rebuild a record from its JSON projection. Omitted fields come back
    /// empty; the inner envelope object is re-packed into `req`.
    pub fn from_json(value: &Value) -> Result<Self, CodecError> {
        let mut signed = SignedReq::default();
        if let Some(sig) = value.get(jsonrpc::SIG) {
            signed.sig =
                serde_json::from_value(sig.clone()).map_err(|e| CodecError::SignedField {
                    field: jsonrpc::SIG,
                    reason: e.to_string(),
                })?;
        }
        if let Some(req) = value.get(jsonrpc::REQ) {
            signed.req = jsonrpc::to_msgpack(req)?;
        }
        if let Some(raw_req) = value.get("raw_req") {
            signed.raw_req =
                serde_json::from_value(raw_req.clone()).map_err(|e| CodecError::SignedField {
                    field: "raw_req",
                    reason: e.to_string(),
                })?;
        }
        if let Some(md) = value.get(jsonrpc::MD) {
            signed.md =
                serde_json::from_value(md.clone()).map_err(|e| CodecError::SignedField {
                    field: jsonrpc::MD,
                    reason: e.to_string(),
                })?;
        }
        Ok(signed)
    }
}

/// Per-caller latest accepted signed request, in the replicated store.
pub const CLIENT_SIGNATURES: TypedMap<CallerId, SignedReq> =
    TypedMap::new("client_signatures");

#[cfg(test)]
mod tests {
    use super::*;

    fn inner_envelope() -> Value {
        json!({"jsonrpc": "2.0", "id": 5, "method": "PING"})
    }

    #[test]
    fn from_envelope_packs_inner_request() {
        let envelope = json!({
            "sig": [1, 2, 3],
            "req": inner_envelope(),
            "md": "sha256",
        });
        let signed = SignedReq::from_envelope(&envelope, b"raw bytes").unwrap();
        assert_eq!(signed.sig, vec![1, 2, 3]);
        assert_eq!(signed.raw_req, b"raw bytes".to_vec());
        assert_eq!(signed.md, MdAlgorithm::Sha256);
        assert_eq!(
            jsonrpc::from_msgpack(&signed.req).unwrap(),
            inner_envelope()
        );
    }

    #[test]
    fn from_envelope_without_signature_fields_is_empty() {
        let signed = SignedReq::from_envelope(&inner_envelope(), b"").unwrap();
        assert!(signed.sig.is_empty());
        assert!(signed.req.is_empty());
        assert_eq!(signed.md, MdAlgorithm::None);
    }

    #[test]
    fn json_projection_omits_empty_fields() {
        let signed = SignedReq::default();
        let value = signed.to_json().unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn json_projection_expands_req() {
        let envelope = json!({"sig": [9], "req": inner_envelope()});
        let signed = SignedReq::from_envelope(&envelope, b"x").unwrap();
        let value = signed.to_json().unwrap();
        assert_eq!(value[jsonrpc::REQ], inner_envelope());
        assert_eq!(value[jsonrpc::SIG], json!([9]));
    }

    #[test]
    fn json_roundtrip_preserves_all_fields() {
        let envelope = json!({
            "sig": [4, 5],
            "req": inner_envelope(),
            "md": "sha512",
        });
        let original = SignedReq::from_envelope(&envelope, b"body").unwrap();
        let projected = original.to_json().unwrap();
        let decoded = SignedReq::from_json(&projected).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn packed_roundtrip_preserves_all_fields() {
        let envelope = json!({"sig": [7], "req": inner_envelope(), "md": "sha384"});
        let original = SignedReq::from_envelope(&envelope, b"body").unwrap();
        let packed = rmp_serde::to_vec_named(&original).unwrap();
        let decoded: SignedReq = rmp_serde::from_slice(&packed).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn sig_is_probed_from_its_own_field() {
        // A projection carrying only `req` must decode with an empty sig.
        let value = json!({"req": inner_envelope()});
        let decoded = SignedReq::from_json(&value).unwrap();
        assert!(decoded.sig.is_empty());
        assert!(!decoded.req.is_empty());
    }
}
