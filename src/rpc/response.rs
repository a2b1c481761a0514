//! JSON-RPC 2.0 response envelopes
//!
//! Error messages pass through the registry's memory hooks: the builder
//! duplicates the text, copies it into the envelope and releases the
//! duplicate, so each message is consumed exactly once.

use serde_json::{json, Value};

use crate::{
    errors::RpcError,
    hooks::{self, MemoryHooks},
};

pub const JSONRPC_VERSION: &str = "2.0";

pub fn success_response(result: Value, id: Value) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "result": result,
        "id": id
    })
}

pub fn error_response(
    hooks: &dyn MemoryHooks,
    code: i64,
    message: &str,
    id: Value,
) -> Result<Value, RpcError> {
    let message = hooks::duplicate(hooks, message)?;
    let envelope = json!({
        "jsonrpc": JSONRPC_VERSION,
        "error": {
            "code": code,
            "message": message.as_str()
        },
        "id": id
    });
    hooks::release_string(hooks, message);
    Ok(envelope)
}
