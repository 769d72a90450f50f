use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::http::request::RequestIdExt;
use crate::http::response::Envelope;
use crate::http::server::AppState;
use crate::relay::{fetch_tag_members, RelayError, TagId, TagMembers};

#[derive(Debug, Deserialize)]
pub struct TagUsersParams {
    tag_id: Option<String>,
}

/// List every member of a tag, following pagination to the end.
pub async fn tag_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<TagUsersParams>,
) -> Result<Envelope<TagMembers>, RelayError> {
    let tag_id = TagId::parse(params.tag_id.as_deref())?;
    let context = state.context();
    let cancel = state.shutdown.child_token();

    tracing::info!(request_id = %headers.request_id(), tag_id = tag_id.get(), "Fetching tag members");

    let members = fetch_tag_members(&context.upstream, &context.pacer, tag_id, &cancel).await?;
    Ok(Envelope::success(members))
}

pub async fn unsupported() -> Response {
    RelayError::MethodNotAllowed("only GET is supported").into_response()
}
