//! Pass-through endpoints: tag list and mass broadcast.
//!
//! Upstream bodies are relayed byte for byte with status 200; only a failed
//! upstream call turns into a plain-text 500.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::http::request::RequestIdExt;
use crate::http::server::AppState;
use crate::upstream::{BroadcastRequest, RawResponse, UpstreamError};

const JSON: &str = "application/json";
const JSON_UTF8: &str = "application/json;charset=utf-8";

pub async fn list_tags(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let context = state.context();
    tracing::debug!(request_id = %headers.request_id(), "Listing tags");

    match context.upstream.list_tags().await {
        Ok(raw) => relay_body(raw, JSON),
        Err(e) => upstream_failure(headers.request_id(), e),
    }
}

pub async fn mass_send(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let request: BroadcastRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(request_id = %headers.request_id(), error = %e, "Malformed broadcast request");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    tracing::info!(
        request_id = %headers.request_id(),
        tag_id = request.filter.tag_id,
        is_to_all = request.filter.is_to_all,
        msgtype = %request.msgtype,
        "Submitting mass broadcast"
    );

    let context = state.context();
    match context.upstream.mass_send(&request).await {
        Ok(raw) => relay_body(raw, JSON_UTF8),
        Err(e) => upstream_failure(headers.request_id(), e),
    }
}

fn relay_body(raw: RawResponse, content_type: &'static str) -> Response {
    if !raw.status.is_success() {
        tracing::warn!(status = %raw.status, "Relaying non-success upstream reply");
    }
    (
        [(header::CONTENT_TYPE, HeaderValue::from_static(content_type))],
        Body::from(raw.body),
    )
        .into_response()
}

fn upstream_failure(request_id: &str, error: UpstreamError) -> Response {
    tracing::error!(request_id = %request_id, error = %error, "Upstream call failed");
    (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
}
