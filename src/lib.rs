use std::sync::{Arc, Mutex};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod api;
pub mod config;
pub mod errors;
pub mod hooks;
pub mod http;
pub mod logging;
pub mod procedures;
pub mod registry;
pub mod rpc;

pub use errors::{ErrorCode, RpcError, Status};
pub use hooks::{MemoryHooks, SystemHooks};
pub use registry::MethodRegistry;
pub use rpc::{
    client::{build_request, build_request_string},
    context::{CallContext, ParamsKind, Procedure, UserArg},
    dispatcher::Dispatcher,
};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Mutex<Dispatcher>>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(Mutex::new(dispatcher)),
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/rpc", post(http::handlers::rpc_endpoint))
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}
