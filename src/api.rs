//! Status-code surface for embedders
//!
//! Mirrors the handle-based interface: every call reports a [`Status`], an
//! absent handle yields `HandleNotInitialized` and an absent name or
//! procedure yields `InvalidArgument`. Callers that own a [`Dispatcher`]
//! directly can use its `Result`-returning methods instead.

use std::any::Any;

use serde_json::Value;

use crate::{
    errors::{RpcError, Status},
    hooks::{self, AllocateFn, DuplicateFn, ReleaseFn},
    logging::{self, ErrorLogHook},
    rpc::{
        context::{Procedure, UserArg},
        dispatcher::Dispatcher,
    },
};

pub use crate::rpc::client::{build_request, build_request_string};

fn report(result: Result<(), RpcError>) -> Status {
    if let Err(err) = &result {
        logging::report_error(&err.to_string());
    }
    Status::from(result)
}

pub fn create(initial_capacity: usize) -> Result<Dispatcher, Status> {
    Dispatcher::new(initial_capacity).map_err(|err| {
        logging::report_error(&err.to_string());
        Status::from(&err)
    })
}

pub fn destroy(handle: Option<Dispatcher>) -> Status {
    match handle {
        Some(dispatcher) => {
            drop(dispatcher);
            Status::Ok
        }
        None => Status::HandleNotInitialized,
    }
}

pub fn add_method(
    handle: Option<&mut Dispatcher>,
    procedure: Option<Box<Procedure>>,
    name: Option<&str>,
    arg: Option<UserArg>,
) -> Status {
    let Some(dispatcher) = handle else {
        return report(Err(RpcError::HandleNotInitialized));
    };
    let (Some(procedure), Some(name)) = (procedure, name) else {
        return report(Err(RpcError::InvalidArgument(
            "method name and procedure are required",
        )));
    };
    report(dispatcher.add_boxed_method(name, procedure, arg))
}

pub fn del_method(handle: Option<&mut Dispatcher>, name: Option<&str>) -> Status {
    let Some(dispatcher) = handle else {
        return report(Err(RpcError::HandleNotInitialized));
    };
    let Some(name) = name else {
        return report(Err(RpcError::InvalidArgument("method name is required")));
    };
    report(dispatcher.del_method(name))
}

pub fn get_method_count(handle: Option<&Dispatcher>) -> usize {
    handle.map_or(0, Dispatcher::method_count)
}

pub fn enumerate<V>(handle: Option<&Dispatcher>, visitor: V) -> Status
where
    V: FnMut(&str, Option<&(dyn Any + Send + Sync)>),
{
    match handle {
        Some(dispatcher) => {
            dispatcher.for_each_method(visitor);
            Status::Ok
        }
        None => report(Err(RpcError::HandleNotInitialized)),
    }
}

/// Dispatch a parsed request. `None` stands for input that failed to parse
/// and is answered with a parse-error envelope.
pub fn process(handle: Option<&Dispatcher>, request: Option<&Value>) -> (Option<Value>, Status) {
    let Some(dispatcher) = handle else {
        return (None, report(Err(RpcError::HandleNotInitialized)));
    };
    match request {
        Some(request) => dispatcher.process_value(request),
        None => dispatcher.parse_error(),
    }
}

pub fn process_str(handle: Option<&Dispatcher>, request: &str) -> (Option<String>, Status) {
    let Some(dispatcher) = handle else {
        return (None, report(Err(RpcError::HandleNotInitialized)));
    };
    dispatcher.process_str(request)
}

pub fn set_allocator_hooks(
    allocate: Option<AllocateFn>,
    release: Option<ReleaseFn>,
    duplicate: Option<DuplicateFn>,
) -> Status {
    Status::from(hooks::set_memory_hooks(allocate, release, duplicate))
}

pub fn set_error_log_hook(hook: Option<ErrorLogHook>) {
    logging::set_error_log_hook(hook);
}
