//! HTTP API for the coaching backend

mod handlers;
mod server;

pub use server::{router, ApiServer, ApiServerConfig, AppState};

use crate::error::CoachError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

impl IntoResponse for CoachError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            CoachError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            CoachError::NotFound(what) => (StatusCode::NOT_FOUND, format!("Not found: {what}")),
            CoachError::InvalidInput(why) => (StatusCode::BAD_REQUEST, why.clone()),
            _ => {
                // Internal detail goes to the log, never the client
                error!("Request failed: {self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
