//! Uniform response envelope and error mapping.
//!
//! # Responsibilities
//! - Serialize `{code, errorMsg?, data}` for every envelope endpoint
//! - Map relay errors to HTTP status codes
//!
//! # Design Decisions
//! - The envelope is a sum type; the JSON shape exists only at the boundary
//! - Upstream failures are 502, cancellation is 503, bad input is 400/405
//! - Failures carry the raw upstream body in `data` when there is one

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Serialize, Serializer};

use crate::relay::RelayError;

pub const CODE_OK: i32 = 0;
pub const CODE_ERROR: i32 = -1;

/// Result of an envelope endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope<T> {
    Success(T),
    Failure {
        message: String,
        detail: Option<String>,
    },
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Envelope::Success(data)
    }

    pub fn failure(message: impl Into<String>, detail: Option<String>) -> Self {
        Envelope::Failure {
            message: message.into(),
            detail,
        }
    }
}

#[derive(Serialize)]
struct EnvelopeBody<'a, D> {
    code: i32,
    #[serde(rename = "errorMsg", skip_serializing_if = "Option::is_none")]
    error_msg: Option<&'a str>,
    data: D,
}

impl<T: Serialize> Serialize for Envelope<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Envelope::Success(data) => EnvelopeBody {
                code: CODE_OK,
                error_msg: None,
                data,
            }
            .serialize(serializer),
            Envelope::Failure { message, detail } => EnvelopeBody {
                code: CODE_ERROR,
                error_msg: Some(message.as_str()),
                data: detail.as_deref(),
            }
            .serialize(serializer),
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RelayError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            RelayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            RelayError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match status.as_u16() {
            400..=499 => tracing::warn!(status = status.as_u16(), error = %self, "Client error"),
            _ => tracing::error!(status = status.as_u16(), error = %self, "Relay error"),
        }

        let detail = match &self {
            RelayError::Upstream(e) => e.body().map(str::to_string),
            _ => None,
        };
        (status, Envelope::<()>::failure(self.to_string(), detail)).into_response()
    }
}
