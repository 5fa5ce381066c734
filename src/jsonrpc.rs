//! JSON-RPC envelope codec.
//!
//! Requests and responses travel in one of two wire encodings: text JSON or
//! MessagePack. The encoding is negotiated per request from the first byte
//! of the input (`{` means text, anything else means MessagePack) and the
//! response is packed with the same encoding.
//!
//! A request envelope looks like:
//!
//! ```text
//! { "jsonrpc": "2.0", "id": 7, "method": "...", "params": {...}, "readonly": true }
//! ```
//!
//! A signed envelope wraps an inner envelope:
//!
//! ```text
//! { "sig": [...], "req": { ...inner envelope... }, "md": "sha256" }
//! ```

use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Envelope field holding the protocol version.
pub const JSON_RPC: &str = "jsonrpc";
/// The only accepted protocol version.
pub const RPC_VERSION: &str = "2.0";
/// Envelope field holding the request id.
pub const ID: &str = "id";
/// Envelope field holding the method name.
pub const METHOD: &str = "method";
/// Envelope field holding the parameters.
pub const PARAMS: &str = "params";
/// Envelope field holding a successful result payload.
pub const RESULT: &str = "result";
/// Envelope field holding an error object.
pub const ERROR: &str = "error";
/// Error object field holding the error code.
pub const CODE: &str = "code";
/// Error object field holding the error message.
pub const MESSAGE: &str = "message";
/// Error object field holding auxiliary error data.
pub const DATA: &str = "data";
/// Envelope field declaring whether a `MayWrite` call intends to read only.
pub const READONLY: &str = "readonly";
/// Signed-envelope field holding the signature bytes.
pub const SIG: &str = "sig";
/// Signed-envelope field holding the inner envelope.
pub const REQ: &str = "req";
/// Signed-envelope field declaring the hash algorithm.
pub const MD: &str = "md";
/// Response annotation: the transaction's commit version.
pub const COMMIT: &str = "commit";
/// Response annotation: the consensus term at commit time.
pub const TERM: &str = "term";
/// Response annotation: the consensus global commit index.
pub const GLOBAL_COMMIT: &str = "global_commit";

/// Wire encoding of a request or response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pack {
    /// Text JSON.
    Text,
    /// MessagePack binary.
    MsgPack,
}

/// Stable error codes carried in JSON-RPC error envelopes.
///
/// The first five are the standard JSON-RPC 2.0 codes; the rest sit in an
/// application-specific range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// A handler failed to parse its parameters or result.
    ParseError,
    /// The envelope is malformed (empty input, non-object, wrong version,
    /// bad params shape, missing id).
    InvalidRequest,
    /// No handler is installed for the method and there is no default.
    MethodNotFound,
    /// Parameters were well-formed but not understood by the handler.
    InvalidParams,
    /// Anything else that went wrong inside a handler.
    InternalError,
    /// A mutating call reached a follower; redirect data names the leader.
    TxNotLeader,
    /// The transaction committed locally but was not replicated.
    TxFailedToReplicate,
    /// Leader information was requested but no leader is known.
    TxLeaderUnknown,
    /// The caller certificate did not resolve to a known caller.
    InvalidCallerId,
    /// The per-request client signature failed verification.
    InvalidClientSignature,
}

impl ErrorCode {
    /// The wire value of this code.
    pub const fn code(self) -> i64 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
            ErrorCode::TxNotLeader => -32051,
            ErrorCode::TxFailedToReplicate => -32052,
            ErrorCode::TxLeaderUnknown => -32053,
            ErrorCode::InvalidCallerId => -32054,
            ErrorCode::InvalidClientSignature => -32055,
        }
    }
}

impl From<ErrorCode> for i64 {
    fn from(code: ErrorCode) -> i64 {
        code.code()
    }
}

/// Failure while encoding or decoding an envelope.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The input could not be decoded with the detected pack.
    #[error("failed to decode {pack:?} envelope: {reason}")]
    Decode {
        /// The pack the input claimed to be.
        pack: Pack,
        /// Decoder diagnostic.
        reason: String,
    },
    /// A value could not be encoded with the requested pack.
    #[error("failed to encode {pack:?} envelope: {reason}")]
    Encode {
        /// The pack requested.
        pack: Pack,
        /// Encoder diagnostic.
        reason: String,
    },
    /// A signed-envelope field did not have the expected shape.
    #[error("malformed signed envelope field {field}: {reason}")]
    SignedField {
        /// Field name within the signed envelope.
        field: &'static str,
        /// Decoder diagnostic.
        reason: String,
    },
}

/// Detect the wire encoding of `input`.
///
/// `None` means the input was empty and no encoding could be negotiated.
pub fn detect_pack(input: &[u8]) -> Option<Pack> {
    match input.first() {
        None => None,
        Some(b'{') => Some(Pack::Text),
        Some(_) => Some(Pack::MsgPack),
    }
}

/// Encode `value` with the given pack.
///
/// Encoding a `serde_json::Value` cannot fail for well-formed values; if it
/// does, the failure is logged and a minimal internal-error envelope is
/// returned so the transport always has bytes to send.
pub fn pack(value: &Value, pack: Pack) -> Vec<u8> {
    let encoded = match pack {
        Pack::Text => serde_json::to_vec(value).map_err(|e| e.to_string()),
        Pack::MsgPack => rmp_serde::to_vec_named(value).map_err(|e| e.to_string()),
    };
    match encoded {
        Ok(bytes) => bytes,
        Err(reason) => {
            error!(%reason, "failed to encode response envelope");
            let fallback =
                error_response(0, ErrorCode::InternalError, "Failed to encode response.");
            serde_json::to_vec(&fallback).unwrap_or_default()
        }
    }
}

/// Decode `input` with the given pack into a JSON value.
pub fn unpack(input: &[u8], pack: Pack) -> Result<Value, CodecError> {
    match pack {
        Pack::Text => serde_json::from_slice(input).map_err(|e| CodecError::Decode {
            pack,
            reason: e.to_string(),
        }),
        Pack::MsgPack => rmp_serde::from_slice(input).map_err(|e| CodecError::Decode {
            pack,
            reason: e.to_string(),
        }),
    }
}

/// Build a success envelope carrying `payload` as the result.
pub fn result_response(seq_no: u64, payload: Value) -> Value {
    json!({
        JSON_RPC: RPC_VERSION,
        ID: seq_no,
        RESULT: payload,
    })
}

/// Build an error object `{code, message}` for use inside an envelope or as
/// a handler's declared error.
pub fn error_object(code: impl Into<i64>, message: impl Into<String>) -> Value {
    json!({
        CODE: code.into(),
        MESSAGE: message.into(),
    })
}

/// Build an error envelope with the given code and message.
pub fn error_response(seq_no: u64, code: impl Into<i64>, message: impl Into<String>) -> Value {
    json!({
        JSON_RPC: RPC_VERSION,
        ID: seq_no,
        ERROR: error_object(code, message),
    })
}

/// Build an error envelope with auxiliary data (for example the unknown
/// method name, or the leader's endpoint).
pub fn error_response_with_data(
    seq_no: u64,
    code: impl Into<i64>,
    message: impl Into<String>,
    data: Value,
) -> Value {
    let mut error = error_object(code, message);
    error[DATA] = data;
    json!({
        JSON_RPC: RPC_VERSION,
        ID: seq_no,
        ERROR: error,
    })
}

/// Wrap a pre-built error object in an envelope.
pub fn custom_error_response(seq_no: u64, error: Value) -> Value {
    json!({
        JSON_RPC: RPC_VERSION,
        ID: seq_no,
        ERROR: error,
    })
}

/// Encode `value` as canonical MessagePack, the packing used for signed
/// request bodies and store values.
pub fn to_msgpack<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    rmp_serde::to_vec_named(value).map_err(|e| CodecError::Encode {
        pack: Pack::MsgPack,
        reason: e.to_string(),
    })
}

/// Decode canonical MessagePack into a JSON value.
pub fn from_msgpack(bytes: &[u8]) -> Result<Value, CodecError> {
    rmp_serde::from_slice(bytes).map_err(|e| CodecError::Decode {
        pack: Pack::MsgPack,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_pack_text_on_open_brace() {
        assert_eq!(detect_pack(b"{\"id\":1}"), Some(Pack::Text));
    }

    #[test]
    fn detect_pack_msgpack_on_other_bytes() {
        assert_eq!(detect_pack(&[0x82, 0xa2]), Some(Pack::MsgPack));
        assert_eq!(detect_pack(b"x"), Some(Pack::MsgPack));
    }

    #[test]
    fn detect_pack_none_on_empty() {
        assert_eq!(detect_pack(&[]), None);
    }

    #[test]
    fn pack_unpack_roundtrip_text() {
        let value = json!({"jsonrpc": "2.0", "id": 3, "method": "m"});
        let bytes = pack(&value, Pack::Text);
        assert_eq!(bytes[0], b'{');
        let decoded = unpack(&bytes, Pack::Text).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn pack_unpack_roundtrip_msgpack() {
        let value = json!({"jsonrpc": "2.0", "id": 3, "params": [1, 2, 3]});
        let bytes = pack(&value, Pack::MsgPack);
        assert_ne!(bytes[0], b'{');
        let decoded = unpack(&bytes, Pack::MsgPack).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn error_response_shape() {
        let resp = error_response(9, ErrorCode::MethodNotFound, "Method not found.");
        assert_eq!(resp[JSON_RPC], RPC_VERSION);
        assert_eq!(resp[ID], 9);
        assert_eq!(resp[ERROR][CODE], ErrorCode::MethodNotFound.code());
        assert_eq!(resp[ERROR][MESSAGE], "Method not found.");
    }

    #[test]
    fn error_response_with_data_carries_data() {
        let resp = error_response_with_data(
            1,
            ErrorCode::TxNotLeader,
            "Not leader.",
            json!("10.0.0.2:8443"),
        );
        assert_eq!(resp[ERROR][DATA], "10.0.0.2:8443");
    }

    #[test]
    fn result_response_shape() {
        let resp = result_response(4, json!({"ok": true}));
        assert_eq!(resp[ID], 4);
        assert_eq!(resp[RESULT]["ok"], true);
    }

    #[test]
    fn error_codes_are_stable() {
        assert_eq!(ErrorCode::ParseError.code(), -32700);
        assert_eq!(ErrorCode::InvalidRequest.code(), -32600);
        assert_eq!(ErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(ErrorCode::InvalidParams.code(), -32602);
        assert_eq!(ErrorCode::InternalError.code(), -32603);
        assert_eq!(ErrorCode::TxNotLeader.code(), -32051);
        assert_eq!(ErrorCode::TxFailedToReplicate.code(), -32052);
        assert_eq!(ErrorCode::TxLeaderUnknown.code(), -32053);
        assert_eq!(ErrorCode::InvalidCallerId.code(), -32054);
        assert_eq!(ErrorCode::InvalidClientSignature.code(), -32055);
    }
}
