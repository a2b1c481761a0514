//! Sample procedures served by the bundled binary

use serde_json::{json, Value};

use crate::{
    errors::{ErrorCode, RpcError},
    rpc::{
        context::{CallContext, ParamsKind},
        dispatcher::Dispatcher,
    },
};

pub const DIVISION_BY_ZERO: i64 = -32000;

#[derive(Debug, Clone)]
pub struct DefaultName(pub String);

pub fn register_samples(dispatcher: &mut Dispatcher) -> Result<(), RpcError> {
    dispatcher.add_method("add", add, None)?;
    dispatcher.add_method("mul", mul, None)?;
    dispatcher.add_method("divide", divide, None)?;
    dispatcher.add_method("echo", echo, None)?;
    dispatcher.add_method(
        "hello",
        hello,
        Some(Box::new(DefaultName("World".to_string()))),
    )?;
    Ok(())
}

fn number_pair(ctx: &mut CallContext<'_>, params: Option<&Value>) -> Option<(f64, f64)> {
    let pair = params
        .and_then(Value::as_array)
        .filter(|items| items.len() == 2)
        .and_then(|items| Some((items[0].as_f64()?, items[1].as_f64()?)));
    if pair.is_none() {
        ctx.set_error(
            ErrorCode::INVALID_PARAMS,
            "Invalid params: expected an array of two numbers",
        );
    }
    pair
}

// Keep integral results integral on the wire.
fn number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

pub fn add(ctx: &mut CallContext<'_>, params: Option<&Value>, _id: Option<&Value>) -> Value {
    number_pair(ctx, params).map_or(Value::Null, |(a, b)| number(a + b))
}

pub fn mul(ctx: &mut CallContext<'_>, params: Option<&Value>, _id: Option<&Value>) -> Value {
    number_pair(ctx, params).map_or(Value::Null, |(a, b)| number(a * b))
}

pub fn divide(ctx: &mut CallContext<'_>, params: Option<&Value>, _id: Option<&Value>) -> Value {
    let Some((a, b)) = number_pair(ctx, params) else {
        return Value::Null;
    };
    if b == 0.0 {
        ctx.set_error(DIVISION_BY_ZERO, "Division by zero is not allowed.");
        return Value::Null;
    }
    number(a / b)
}

pub fn echo(_ctx: &mut CallContext<'_>, params: Option<&Value>, _id: Option<&Value>) -> Value {
    params.cloned().unwrap_or(Value::Null)
}

pub fn hello(ctx: &mut CallContext<'_>, params: Option<&Value>, _id: Option<&Value>) -> Value {
    let fallback = ctx
        .arg::<DefaultName>()
        .map_or("World", |name| name.0.as_str());
    let name = match ctx.params_kind() {
        ParamsKind::Object => params
            .and_then(|params| params.get("name"))
            .and_then(Value::as_str)
            .unwrap_or(fallback),
        ParamsKind::Array => params
            .and_then(|params| params.get(0))
            .and_then(Value::as_str)
            .unwrap_or(fallback),
        ParamsKind::None => fallback,
    };
    json!(format!("Hello, {name}!"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Status;

    fn dispatcher() -> Dispatcher {
        let mut dispatcher = Dispatcher::new(0).expect("dispatcher");
        register_samples(&mut dispatcher).expect("register samples");
        dispatcher
    }

    fn call(request: &str) -> Value {
        let (response, status) = dispatcher().process_str(request);
        assert_eq!(status, Status::Ok);
        serde_json::from_str(&response.expect("response")).expect("valid json")
    }

    #[test]
    fn registers_every_sample() {
        assert_eq!(dispatcher().method_count(), 5);
    }

    #[test]
    fn arithmetic_keeps_integers_integral() {
        let response = call(r#"{"jsonrpc":"2.0","method":"add","params":[2,3],"id":1}"#);
        assert_eq!(response["result"], 5);
        let response = call(r#"{"jsonrpc":"2.0","method":"divide","params":[10,4],"id":1}"#);
        assert_eq!(response["result"], 2.5);
    }

    #[test]
    fn divide_by_zero_is_an_application_error() {
        let response = call(r#"{"jsonrpc":"2.0","method":"divide","params":[10,0],"id":2}"#);
        assert_eq!(response["error"]["code"], DIVISION_BY_ZERO);
        assert_eq!(
            response["error"]["message"],
            "Division by zero is not allowed."
        );
    }

    #[test]
    fn malformed_params_are_invalid_params() {
        let response = call(r#"{"jsonrpc":"2.0","method":"mul","params":{"a":1},"id":3}"#);
        assert_eq!(response["error"]["code"], ErrorCode::INVALID_PARAMS);
    }

    #[test]
    fn hello_uses_registered_default() {
        let response = call(r#"{"jsonrpc":"2.0","method":"hello","id":4}"#);
        assert_eq!(response["result"], "Hello, World!");
        let response =
            call(r#"{"jsonrpc":"2.0","method":"hello","params":{"name":"Alice"},"id":5}"#);
        assert_eq!(response["result"], "Hello, Alice!");
    }

    #[test]
    fn echo_returns_params() {
        let response = call(r#"{"jsonrpc":"2.0","method":"echo","params":{"k":[1,2]},"id":6}"#);
        assert_eq!(response["result"], json!({"k": [1, 2]}));
    }
}
