use std::{cell::Cell, time::Instant};

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

pub type ErrorLogHook = fn(&str);

thread_local! {
    static ERROR_LOG_HOOK: Cell<Option<ErrorLogHook>> = const { Cell::new(None) };
}

pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Install (or clear with `None`) the error-log hook for the calling thread.
pub fn set_error_log_hook(hook: Option<ErrorLogHook>) {
    ERROR_LOG_HOOK.with(|slot| slot.set(hook));
}

pub(crate) fn report_error(message: &str) {
    error!(error = %message, "jsonrpc core error");
    if let Some(hook) = ERROR_LOG_HOOK.with(Cell::get) {
        hook(message);
    }
}

pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started_at = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started_at.elapsed().as_millis();

    info!(
        method = %method,
        path = %path,
        status = status.as_u16(),
        duration_ms = elapsed_ms,
        "request summary"
    );

    if status.is_client_error() {
        warn!(method = %method, path = %path, "rejected request");
    }

    response
}
