//! Full member listing of a tag, following the upstream cursor.

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::relay::RelayError;
use crate::resilience::Pacer;
use crate::upstream::UpstreamClient;

/// A validated, strictly positive tag identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagId(u64);

impl TagId {
    /// Parse the raw `tag_id` query value. Surrounding whitespace is not
    /// accepted.
    pub fn parse(raw: Option<&str>) -> Result<Self, RelayError> {
        let raw = raw.unwrap_or_default();
        if raw.is_empty() {
            return Err(RelayError::invalid("tag_id is required"));
        }

        match raw.parse::<u64>() {
            Ok(id) if id > 0 => Ok(TagId(id)),
            _ => Err(RelayError::invalid("tag_id must be a positive integer")),
        }
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Every member of a tag in upstream order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagMembers {
    pub openids: Vec<String>,
    pub count: usize,
}

impl From<Vec<String>> for TagMembers {
    fn from(openids: Vec<String>) -> Self {
        Self {
            count: openids.len(),
            openids,
        }
    }
}

/// Collect all members of `tag_id`.
///
/// Pages are requested one at a time with a pause between them. The loop
/// ends on an empty cursor or an empty page, whichever comes first; an empty
/// page with a non-empty cursor would otherwise repeat forever. Any upstream
/// failure aborts the whole listing and discards what was collected.
pub async fn fetch_tag_members(
    client: &UpstreamClient,
    pacer: &Pacer,
    tag_id: TagId,
    cancel: &CancellationToken,
) -> Result<TagMembers, RelayError> {
    let mut openids = Vec::new();
    let mut cursor = String::new();
    let mut pages = 0usize;

    loop {
        if pages > 0 {
            pacer.pause(cancel).await?;
        } else if cancel.is_cancelled() {
            return Err(RelayError::Cancelled);
        }

        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RelayError::Cancelled),
            page = client.tag_users_page(tag_id.get(), &cursor) => page,
        };
        let page = match page {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(tag_id = tag_id.get(), page = pages + 1, error = %e, "Tag member fetch aborted");
                return Err(e.into());
            }
        };
        pages += 1;

        let batch = page.data.openid.len();
        openids.extend(page.data.openid);

        tracing::debug!(
            tag_id = tag_id.get(),
            page = pages,
            batch,
            total = openids.len(),
            "Fetched tag member page"
        );

        if page.next_openid.is_empty() || batch == 0 {
            break;
        }
        cursor = page.next_openid;
    }

    tracing::info!(tag_id = tag_id.get(), pages, count = openids.len(), "Tag members collected");
    Ok(TagMembers::from(openids))
}
