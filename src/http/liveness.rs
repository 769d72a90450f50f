use axum::response::{IntoResponse, Response};

use crate::http::response::Envelope;
use crate::relay::RelayError;

pub async fn hello() -> Envelope<&'static str> {
    Envelope::success("helloworld")
}

pub async fn unsupported() -> Response {
    RelayError::MethodNotAllowed("request method not supported").into_response()
}
