//! Axum HTTP handlers for the demo server

use std::sync::PoisonError;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::{errors::Status, AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub methods: usize,
}

#[derive(Debug, Serialize)]
pub struct FailureResponse {
    pub code: &'static str,
    pub message: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let dispatcher = state
        .dispatcher
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    Json(HealthResponse {
        status: "ok",
        methods: dispatcher.method_count(),
    })
}

pub async fn rpc_endpoint(State(state): State<AppState>, body: Bytes) -> Response {
    let (response, status) = {
        let dispatcher = state
            .dispatcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match serde_json::from_slice::<Value>(&body) {
            Ok(request) => dispatcher.process_value(&request),
            Err(_) => dispatcher.parse_error(),
        }
    };

    match response {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None if status == Status::OkNotification => StatusCode::NO_CONTENT.into_response(),
        None => {
            error!(status = status.as_str(), "request produced no response");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(FailureResponse {
                    code: status.as_str(),
                    message: "internal server error",
                }),
            )
                .into_response()
        }
    }
}
