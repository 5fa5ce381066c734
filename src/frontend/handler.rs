//! Handler model for the RPC frontend.
//!
//! A handler is a closure over [`RequestArgs`] returning either a success
//! payload or a pre-built error object; schemas describing its parameters
//! and result are plain JSON data kept beside it in the registry, so the
//! registry stays a homogeneous map no matter how handler inputs and
//! outputs vary.

use std::sync::Arc;

use schemars::JsonSchema;
use schemars::schema_for;
use serde::de::DeserializeOwned;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

use crate::context::CallerId;
use crate::context::RpcContext;
use crate::jsonrpc;
use crate::signed_req::SignedReq;
use crate::store::Transaction;

/// Read/write classification of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadWrite {
    /// Never writes; may run on any replica.
    Read,
    /// Writes; must run on the leader.
    Write,
    /// Reads or writes depending on the envelope's `readonly` flag.
    MayWrite,
}

/// Whether a follower may transparently forward a mutating call to the
/// leader instead of redirecting the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forwardable {
    /// Forward over the forwarder channel when one is configured.
    CanForward,
    /// Always redirect.
    DoNotForward,
}

/// What a handler produced.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    /// Result payload for a success envelope.
    Success(Value),
    /// Pre-built error object (`{code, message, ...}`) for an error
    /// envelope.
    Error(Value),
}

/// Failure raised by a handler body.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A declared RPC-domain error with its own wire code.
    #[error("{message}")]
    Rpc {
        /// Wire error code.
        code: i64,
        /// Error message.
        message: String,
    },
    /// Parameter or result JSON did not have the expected shape.
    #[error("At {pointer}: {message}")]
    Parse {
        /// JSON pointer to the offending location.
        pointer: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Anything else; surfaced as `INTERNAL_ERROR`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// What handlers return.
pub type HandlerResult = Result<HandlerOutcome, HandlerError>;

/// Installed handler function.
pub type HandlerFn = Arc<dyn Fn(&mut RequestArgs<'_>) -> HandlerResult + Send + Sync>;

/// Per-invocation bundle passed to handlers.
pub struct RequestArgs<'a> {
    /// Request context; handlers may mutate it.
    pub ctx: &'a mut RpcContext,
    /// The transaction the handler executes in.
    pub tx: &'a mut dyn Transaction,
    /// Authenticated caller.
    pub caller_id: CallerId,
    /// Method name the request named.
    pub method: &'a str,
    /// Request parameters; JSON null when absent.
    pub params: &'a Value,
    /// Signed request record, empty for unsigned requests.
    pub signed_request: &'a SignedReq,
}

/// Registry entry for one method.
#[derive(Clone)]
pub(crate) struct Handler {
    pub func: HandlerFn,
    pub rw: ReadWrite,
    pub params_schema: Value,
    pub result_schema: Value,
    pub forwardable: Forwardable,
}

/// Wrap a payload into a success outcome.
pub fn success<T: serde::Serialize>(payload: T) -> HandlerResult {
    match serde_json::to_value(payload) {
        Ok(value) => Ok(HandlerOutcome::Success(value)),
        Err(err) => Err(HandlerError::Other(anyhow::Error::new(err).context(
            "failed to serialize handler result",
        ))),
    }
}

/// Build an error outcome with the given code and message.
pub fn error(code: impl Into<i64>, message: impl Into<String>) -> HandlerResult {
    Ok(HandlerOutcome::Error(jsonrpc::error_object(code, message)))
}

/// Decode handler parameters. JSON null (absent params) decodes as an
/// empty object so parameter types with all-optional fields accept it.
pub fn params_as<T: DeserializeOwned>(params: &Value) -> Result<T, HandlerError> {
    let value = if params.is_null() {
        Value::Object(Map::new())
    } else {
        params.clone()
    };
    serde_json::from_value(value).map_err(|err| HandlerError::Parse {
        pointer: "/params".to_string(),
        message: err.to_string(),
    })
}

/// The empty schema, used where no parameters or result are declared.
pub fn empty_schema() -> Value {
    Value::Object(Map::new())
}

/// JSON schema for a typed parameter or result shape.
pub fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| empty_schema())
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, PartialEq, Deserialize, Default)]
    struct Params {
        commit: Option<u64>,
    }

    #[test]
    fn params_as_accepts_null_for_optional_fields() {
        let params: Params = params_as(&Value::Null).unwrap();
        assert_eq!(params, Params { commit: None });
    }

    #[test]
    fn params_as_decodes_object() {
        let params: Params = params_as(&json!({"commit": 9})).unwrap();
        assert_eq!(params.commit, Some(9));
    }

    #[test]
    fn params_as_reports_parse_failures() {
        let err = params_as::<Params>(&json!({"commit": "nope"})).unwrap_err();
        match err {
            HandlerError::Parse { pointer, .. } => assert_eq!(pointer, "/params"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn success_serializes_payload() {
        let outcome = success(true).unwrap();
        assert_eq!(outcome, HandlerOutcome::Success(json!(true)));
    }

    #[test]
    fn error_builds_error_object() {
        let outcome = error(jsonrpc::ErrorCode::InvalidParams, "bad").unwrap();
        match outcome {
            HandlerOutcome::Error(obj) => {
                assert_eq!(obj[jsonrpc::CODE], jsonrpc::ErrorCode::InvalidParams.code());
                assert_eq!(obj[jsonrpc::MESSAGE], "bad");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn schema_of_produces_object_schema() {
        #[derive(JsonSchema)]
        #[allow(dead_code)]
        struct Out {
            term: u64,
            commit: u64,
        }
        let schema = schema_of::<Out>();
        assert_eq!(schema["properties"]["term"]["type"], "integer");
    }
}
