//! Batch template push with per-recipient failure isolation.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::relay::RelayError;
use crate::resilience::Pacer;
use crate::upstream::types::TemplateMessage;
use crate::upstream::{TemplateData, UpstreamClient};

const CANCELLED_DETAIL: &str = "cancelled before delivery";

/// Template push request as sent by the frontend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplatePushRequest {
    #[serde(default)]
    pub openids: Vec<String>,
    #[serde(default)]
    pub template_id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub data: Option<TemplateData>,
}

/// A template push that passed presence checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePush {
    pub openids: Vec<String>,
    pub template_id: String,
    pub url: Option<String>,
    pub data: TemplateData,
}

impl TemplatePushRequest {
    /// Presence checks only: recipients, template and data must be given.
    pub fn validate(self) -> Result<TemplatePush, RelayError> {
        let data = match self.data {
            Some(data) if !self.openids.is_empty() && !self.template_id.is_empty() => data,
            _ => return Err(RelayError::invalid("openids, template_id and data are required")),
        };

        Ok(TemplatePush {
            openids: self.openids,
            template_id: self.template_id,
            url: self.url.filter(|url| !url.is_empty()),
            data,
        })
    }
}

/// A recipient the message could not be delivered to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDelivery {
    pub openid: String,
    pub err: String,
}

/// Outcome of a batch push. Every requested recipient appears exactly once,
/// in one of the two lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemplatePushResult {
    pub success_list: Vec<String>,
    pub fail_list: Vec<FailedDelivery>,
}

impl TemplatePushResult {
    fn fail(&mut self, openid: &str, err: impl Into<String>) {
        self.fail_list.push(FailedDelivery {
            openid: openid.to_string(),
            err: err.into(),
        });
    }

    pub fn total(&self) -> usize {
        self.success_list.len() + self.fail_list.len()
    }
}

/// Deliver `push` to each recipient in turn.
///
/// A failed delivery is recorded and the loop moves on; this never fails as
/// a whole. On cancellation the recipients not yet attempted are recorded as
/// failures so the accounting stays complete.
pub async fn push_template(
    client: &UpstreamClient,
    pacer: &Pacer,
    push: &TemplatePush,
    cancel: &CancellationToken,
) -> TemplatePushResult {
    let mut result = TemplatePushResult::default();

    for (index, openid) in push.openids.iter().enumerate() {
        let paced = if index > 0 {
            pacer.pause(cancel).await.is_ok()
        } else {
            !cancel.is_cancelled()
        };
        if !paced {
            cancel_remaining(&mut result, &push.openids[index..]);
            break;
        }

        let message = TemplateMessage {
            touser: openid,
            template_id: &push.template_id,
            url: push.url.as_deref(),
            data: &push.data,
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            outcome = client.send_template(&message) => Some(outcome),
        };

        match outcome {
            Some(Ok(_)) => result.success_list.push(openid.clone()),
            Some(Err(e)) => {
                tracing::warn!(openid = %openid, error = %e, "Template delivery failed");
                result.fail(openid, e.delivery_detail());
            }
            None => {
                cancel_remaining(&mut result, &push.openids[index..]);
                break;
            }
        }
    }

    tracing::info!(
        template_id = %push.template_id,
        recipients = push.openids.len(),
        delivered = result.success_list.len(),
        failed = result.fail_list.len(),
        "Template push finished"
    );
    result
}

fn cancel_remaining(result: &mut TemplatePushResult, remaining: &[String]) {
    tracing::warn!(remaining = remaining.len(), "Template push cancelled");
    for openid in remaining {
        result.fail(openid, CANCELLED_DETAIL);
    }
}
