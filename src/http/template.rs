use axum::{
    body::Body,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
};

use crate::http::request::RequestIdExt;
use crate::http::response::Envelope;
use crate::http::server::AppState;
use crate::relay::{push_template, RelayError, TemplatePushRequest, TemplatePushResult};

/// Push one template message to each listed recipient.
///
/// The body is read under the template size limit before any decoding.
/// Once validated, the reply is always a success envelope; per-recipient
/// failures are reported inside it.
pub async fn send_template(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Envelope<TemplatePushResult>, RelayError> {
    let context = state.context();
    let limit = context.config.limits.template_body_bytes;

    let bytes = axum::body::to_bytes(body, limit)
        .await
        .map_err(|e| RelayError::invalid(format!("failed to read request body (limit {} bytes): {}", limit, e)))?;
    let request: TemplatePushRequest = serde_json::from_slice(&bytes)
        .map_err(|e| RelayError::invalid(format!("invalid JSON: {}", e)))?;
    let push = request.validate()?;

    tracing::info!(
        request_id = %headers.request_id(),
        template_id = %push.template_id,
        recipients = push.openids.len(),
        "Pushing template message"
    );

    let cancel = state.shutdown.child_token();
    let result = push_template(&context.upstream, &context.pacer, &push, &cancel).await;
    Ok(Envelope::success(result))
}

pub async fn unsupported() -> Response {
    RelayError::MethodNotAllowed("only POST is supported").into_response()
}
