//! Tagged response body shared by every HTTP route.
//!
//! ```json
//! { "status": "ok", "data": ... }
//! { "status": "error", "message": "..." }
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ApiResponse<T: Serialize> {
    Ok {
        data: T,
    },
    Error {
        message: String,
        #[serde(skip)]
        code: StatusCode,
    },
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse::Ok { data }
    }
}

impl ApiResponse<()> {
    pub fn error(code: StatusCode, message: impl Into<String>) -> Self {
        ApiResponse::Error {
            message: message.into(),
            code,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiResponse::Ok { .. } => StatusCode::OK,
            ApiResponse::Error { code, .. } => *code,
        };

        let body = serde_json::to_string(&self).unwrap_or_else(|_| {
            r#"{"status":"error","message":"Failed to serialize response"}"#.to_string()
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}
