//! Error-to-HTTP response conversion.
//!
//! Route handlers return `Result<T, AppError>`; anything that converts into
//! [`rpi_core::Error`] can be propagated with `?`.

use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use rpi_core::{Error, FieldErrors};

use crate::middleware::request_id::current_request_id;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: Error,
}

impl AppError {
    pub fn new(inner: Error) -> Self {
        Self { inner }
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self::new(e)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::new(Error::PayloadTooLarge(message))
        } else {
            Self::new(Error::Validation(message))
        }
    }
}

/// Machine-readable code for an error.
fn error_code(err: &Error) -> &'static str {
    match err {
        Error::NotFound { .. } => "not_found",
        Error::Unauthorized(_) => "unauthorized",
        Error::Validation(_) | Error::InvalidFields(_) => "validation_error",
        Error::Conflict(_) => "conflict",
        Error::PayloadTooLarge(_) => "payload_too_large",
        Error::Database { .. } => "database_error",
        Error::Io { .. } => "io_error",
        Error::Internal(_) => "internal_error",
    }
}

/// Client-facing message. Auth and validation errors carry their own text
/// without the variant prefix.
fn error_message(err: &Error) -> String {
    match err {
        Error::Unauthorized(msg)
        | Error::Validation(msg)
        | Error::Conflict(msg)
        | Error::PayloadTooLarge(msg) => msg.clone(),
        Error::InvalidFields(fields) => fields.to_string(),
        other => other.to_string(),
    }
}

/// Build the JSON error body shared by every failing response. The request
/// id is taken from the request being served, if any.
pub fn error_response(
    status: StatusCode,
    code: &str,
    message: String,
    fields: Option<&FieldErrors>,
) -> Response {
    let mut body = json!({
        "error": message,
        "code": code,
        "request_id": current_request_id(),
    });
    if let Some(fields) = fields {
        body["fields"] = json!(fields);
    }
    (status, axum::Json(body)).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in API handler"
            );
        }

        let fields = match &self.inner {
            Error::InvalidFields(fields) => Some(fields),
            _ => None,
        };

        let mut response = error_response(
            status,
            error_code(&self.inner),
            error_message(&self.inner),
            fields,
        );

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}

/// JSON body extractor whose rejections use the standard error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);
