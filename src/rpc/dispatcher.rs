//! The JSON-RPC 2.0 request engine

use std::{any::Any, sync::Arc};

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::{
    errors::{ErrorCode, RpcError, Status},
    hooks::MemoryHooks,
    logging::report_error,
    registry::MethodRegistry,
    rpc::{
        context::{CallContext, ParamsKind, Procedure, UserArg},
        response::{error_response, success_response, JSONRPC_VERSION},
    },
};

pub const PARSE_ERROR_MESSAGE: &str = "Invalid request received: Not a JSON formatted request.";
pub const EMPTY_REQUEST_MESSAGE: &str = "Invalid request received: Empty JSON object or array.";
pub const NOT_OBJECT_OR_ARRAY_MESSAGE: &str =
    "Invalid request received: Not a JSON object or array.";
pub const NOT_OBJECT_MESSAGE: &str = "Invalid request received: Not a JSON object.";
pub const ID_TYPE_MESSAGE: &str = "Invalid request received: 'id' member type error.";
pub const VERSION_MESSAGE: &str = "Invalid request received: JSON-RPC version error.";
pub const NO_METHOD_MESSAGE: &str = "Invalid request received: No 'method' member.";
pub const METHOD_NOT_FOUND_MESSAGE: &str = "Method not found.";

const REDACTED: &str = "[REDACTED]";
const SENSITIVE_MARKERS: [&str; 6] = [
    "token",
    "secret",
    "password",
    "credential",
    "authorization",
    "api_key",
];

type Outcome = (Option<Value>, Status);

/// There is no internal locking: share one instance across threads behind a
/// mutex, or keep one instance per thread.
#[derive(Debug)]
pub struct Dispatcher {
    registry: MethodRegistry,
}

impl Dispatcher {
    pub fn new(initial_capacity: usize) -> Result<Self, RpcError> {
        Ok(Self {
            registry: MethodRegistry::new(initial_capacity)?,
        })
    }

    pub fn with_hooks(
        initial_capacity: usize,
        hooks: Arc<dyn MemoryHooks>,
    ) -> Result<Self, RpcError> {
        Ok(Self {
            registry: MethodRegistry::with_hooks(initial_capacity, hooks)?,
        })
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    pub fn add_method<F>(
        &mut self,
        name: &str,
        procedure: F,
        arg: Option<UserArg>,
    ) -> Result<(), RpcError>
    where
        F: Fn(&mut CallContext<'_>, Option<&Value>, Option<&Value>) -> Value
            + Send
            + Sync
            + 'static,
    {
        self.registry.add(name, procedure, arg)
    }

    pub fn add_boxed_method(
        &mut self,
        name: &str,
        procedure: Box<Procedure>,
        arg: Option<UserArg>,
    ) -> Result<(), RpcError> {
        self.registry.add_boxed(name, procedure, arg)
    }

    pub fn del_method(&mut self, name: &str) -> Result<(), RpcError> {
        self.registry.remove(name)
    }

    pub fn method_count(&self) -> usize {
        self.registry.len()
    }

    pub fn for_each_method<V>(&self, visitor: V)
    where
        V: FnMut(&str, Option<&(dyn Any + Send + Sync)>),
    {
        self.registry.for_each(visitor)
    }

    /// Parse `request`, dispatch it and serialize the reply. `None` means
    /// nothing should be sent back; `status` tells a notification apart from
    /// a local failure.
    pub fn process_str(&self, request: &str) -> (Option<String>, Status) {
        let (response, status) = match serde_json::from_str::<Value>(request) {
            Ok(value) => self.process_value(&value),
            Err(err) => {
                warn!(error = %err, "rejected unparsable request");
                self.parse_error()
            }
        };
        (response.map(|value| value.to_string()), status)
    }

    pub fn process_value(&self, request: &Value) -> (Option<Value>, Status) {
        self.classify(request).unwrap_or_else(|err| {
            report_error(&err.to_string());
            (None, Status::from(&err))
        })
    }

    pub fn parse_error(&self) -> (Option<Value>, Status) {
        match self.envelope(ErrorCode::PARSE_ERROR, PARSE_ERROR_MESSAGE, Value::Null) {
            Ok(envelope) => (Some(envelope), Status::ParseFailed),
            Err(err) => (None, Status::from(&err)),
        }
    }

    fn classify(&self, request: &Value) -> Result<Outcome, RpcError> {
        match request {
            Value::Array(items) if items.is_empty() => {
                self.reject(Status::EmptyRequest, EMPTY_REQUEST_MESSAGE, Value::Null)
            }
            Value::Object(members) if members.is_empty() => {
                self.reject(Status::EmptyRequest, EMPTY_REQUEST_MESSAGE, Value::Null)
            }
            Value::Array(items) => self.handle_batch(items),
            Value::Object(members) => self.handle_object(members),
            _ => self.reject(
                Status::NotObjectOrArray,
                NOT_OBJECT_OR_ARRAY_MESSAGE,
                Value::Null,
            ),
        }
    }

    fn handle_batch(&self, items: &[Value]) -> Result<Outcome, RpcError> {
        let mut responses = Vec::new();
        for item in items {
            let (response, _) = match item {
                Value::Object(members) => self.handle_object(members)?,
                _ => self.reject(Status::NotObjectOrArray, NOT_OBJECT_MESSAGE, Value::Null)?,
            };
            responses.extend(response);
        }

        if responses.is_empty() {
            return Ok((None, Status::OkNotification));
        }
        Ok((Some(Value::Array(responses)), Status::Ok))
    }

    fn handle_object(&self, request: &Map<String, Value>) -> Result<Outcome, RpcError> {
        let notification = !request.contains_key("id");
        let id = match request.get("id") {
            None => Value::Null,
            Some(id @ (Value::Null | Value::String(_) | Value::Number(_))) => id.clone(),
            Some(_) => return self.reject(Status::IdTypeError, ID_TYPE_MESSAGE, Value::Null),
        };

        let version = request.get("jsonrpc").and_then(Value::as_str);
        if version != Some(JSONRPC_VERSION) {
            return self.reject_unless_notification(
                notification,
                Status::VersionError,
                VERSION_MESSAGE,
                id,
            );
        }

        let Some(method) = request.get("method").and_then(Value::as_str) else {
            return self.reject_unless_notification(
                notification,
                Status::NoMethodMember,
                NO_METHOD_MESSAGE,
                id,
            );
        };

        let params = request.get("params");
        match self.invoke(method, params, id, notification)? {
            Some(response) => Ok((Some(response), Status::Ok)),
            None => Ok((None, Status::OkNotification)),
        }
    }

    fn invoke(
        &self,
        method: &str,
        params: Option<&Value>,
        id: Value,
        notification: bool,
    ) -> Result<Option<Value>, RpcError> {
        let Some(entry) = self.registry.get(method) else {
            warn!(method = %method, notification, "method not found");
            if notification {
                return Ok(None);
            }
            return self
                .envelope(ErrorCode::METHOD_NOT_FOUND, METHOD_NOT_FOUND_MESSAGE, id)
                .map(Some);
        };

        let mut ctx = CallContext::new(entry.arg(), ParamsKind::of(params));
        let result = entry.invoke(&mut ctx, params, (!notification).then_some(&id));
        let failure = ctx.take_error();

        info!(
            method = %method,
            params = %audit_params(params),
            notification,
            outcome = if failure.is_some() { "failure" } else { "success" },
            "rpc call dispatched"
        );
        if notification {
            return Ok(None);
        }

        let response = match failure {
            Some((code, message)) => {
                drop(result);
                let text = message
                    .as_deref()
                    .unwrap_or_else(|| ErrorCode::default_message(code));
                self.envelope(code, text, id)?
            }
            None => success_response(result, id),
        };
        Ok(Some(response))
    }

    fn reject(&self, status: Status, message: &str, id: Value) -> Result<Outcome, RpcError> {
        warn!(status = status.as_str(), "invalid request");
        let envelope = self.envelope(ErrorCode::INVALID_REQUEST, message, id)?;
        Ok((Some(envelope), status))
    }

    fn reject_unless_notification(
        &self,
        notification: bool,
        status: Status,
        message: &str,
        id: Value,
    ) -> Result<Outcome, RpcError> {
        if notification {
            warn!(status = status.as_str(), "dropped invalid notification");
            return Ok((None, Status::OkNotification));
        }
        self.reject(status, message, id)
    }

    fn envelope(&self, code: i64, message: &str, id: Value) -> Result<Value, RpcError> {
        error_response(self.registry.hooks().as_ref(), code, message, id)
    }
}

// Params as they appear in the audit event, with credential-like members masked.
fn audit_params(params: Option<&Value>) -> Value {
    match params {
        Some(Value::Object(members)) => Value::Object(
            members
                .iter()
                .map(|(key, value)| {
                    let kept = if is_sensitive(key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        audit_params(Some(value))
                    };
                    (key.clone(), kept)
                })
                .collect(),
        ),
        Some(Value::Array(items)) => {
            Value::Array(items.iter().map(|item| audit_params(Some(item))).collect())
        }
        Some(value) => value.clone(),
        None => Value::Null,
    }
}

fn is_sensitive(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| key.contains(marker))
}
