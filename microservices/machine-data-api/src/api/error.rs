//! Uniform error envelope: `{success: false, error, ...context}`

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use ingest_core::IngestError;
use ingest_store::StoreError;
use serde_json::{json, Value};
use tracing::{error, warn};

#[derive(Debug)]
pub struct ApiError(pub IngestError);

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        Self(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    fn body(&self) -> Value {
        let mut body = json!({
            "success": false,
            "error": self.0.public_message(),
            "code": self.0.error_code(),
        });

        match &self.0 {
            IngestError::RateLimited { scope, retry_after_secs } => {
                body["retryAfter"] = json!(retry_after_secs);
                body["scope"] = json!(scope);
            }
            IngestError::MissingFields(fields) => {
                body["missingFields"] = json!(fields);
                body["required"] = json!(["machineId", "timestamp", "data"]);
            }
            IngestError::PayloadTooLarge { limit } => {
                body["maxBytes"] = json!(limit);
            }
            _ => {}
        }

        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if self.0.is_server_error() {
            error!(code = self.0.error_code(), detail = %self.0, "Request failed");
        } else {
            warn!(code = self.0.error_code(), detail = %self.0, "Request rejected");
        }

        let mut response = (status, Json(self.body())).into_response();
        if let IngestError::RateLimited { retry_after_secs, .. } = &self.0 {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
        }
        response
    }
}
