//! Request builders for callers talking to a dispatcher

use serde_json::{Map, Value};

use crate::rpc::response::JSONRPC_VERSION;

/// Build a request object. `id: None` yields a notification; pass
/// `Some(Value::Null)` for an explicit `"id": null`.
pub fn build_request(method: &str, params: Option<Value>, id: Option<Value>) -> Value {
    let mut request = Map::new();
    request.insert("jsonrpc".to_string(), Value::from(JSONRPC_VERSION));
    request.insert("method".to_string(), Value::from(method));
    if let Some(params) = params {
        request.insert("params".to_string(), params);
    }
    if let Some(id) = id {
        request.insert("id".to_string(), id);
    }
    Value::Object(request)
}

pub fn build_request_string(method: &str, params: Option<Value>, id: Option<Value>) -> String {
    build_request(method, params, id).to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn notification_has_no_id_member() {
        assert_eq!(
            build_request_string("notif", None, None),
            r#"{"jsonrpc":"2.0","method":"notif"}"#
        );
    }

    #[test]
    fn explicit_null_id_is_kept() {
        assert_eq!(
            build_request_string("null_id", None, Some(Value::Null)),
            r#"{"jsonrpc":"2.0","method":"null_id","id":null}"#
        );
    }

    #[test]
    fn params_precede_id() {
        let request = build_request(
            "method_with_params",
            Some(json!(["param1", 42])),
            Some(json!("req-1")),
        );
        assert_eq!(
            request.to_string(),
            r#"{"jsonrpc":"2.0","method":"method_with_params","params":["param1",42],"id":"req-1"}"#
        );
    }
}
