//! Platform wire types and error definitions.

use std::collections::BTreeMap;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TAGS_GET: &str = "/cgi-bin/tags/get";
pub const MASS_SEND_ALL: &str = "/cgi-bin/message/mass/sendall";
pub const TAG_USERS_GET: &str = "/cgi-bin/user/tag/get";
pub const TEMPLATE_SEND: &str = "/cgi-bin/message/template/send";

/// Template keyword data: keyword name → field map (usually `{"value": ..}`).
pub type TemplateData = BTreeMap<String, BTreeMap<String, String>>;

/// Audience selector of a mass broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    pub is_to_all: bool,
    pub tag_id: i64,
}

/// Handle of pre-uploaded rich content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaReference {
    pub media_id: String,
}

/// Mass broadcast by tag. Decoded from the frontend and re-encoded unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastRequest {
    pub filter: TagFilter,
    pub mpnews: MediaReference,
    pub msgtype: String,
}

/// One page request of the tag member listing.
#[derive(Debug, Serialize)]
pub struct TagUsersQuery<'a> {
    pub tagid: u64,
    pub next_openid: &'a str,
}

/// One page of tag members. Empty pages omit `data` entirely.
#[derive(Debug, Default, Deserialize)]
pub struct TagUsersPage {
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub data: TagUsersData,
    #[serde(default)]
    pub next_openid: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct TagUsersData {
    #[serde(default)]
    pub openid: Vec<String>,
}

/// Template message addressed to a single recipient.
#[derive(Debug, Serialize)]
pub struct TemplateMessage<'a> {
    pub touser: &'a str,
    pub template_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<&'a str>,
    pub data: &'a TemplateData,
}

#[derive(Debug, Default, Deserialize)]
pub struct TemplateReceipt {
    #[serde(default)]
    pub msgid: Option<u64>,
}

/// Application-level status embedded in every platform reply.
#[derive(Debug, Deserialize)]
pub struct ApiReply<T> {
    #[serde(default)]
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
    #[serde(flatten)]
    pub body: T,
}

/// Status and capped body of an upstream reply.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Errors that can occur while talking to the platform.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("upstream call failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("upstream returned status {status}")]
    Status { status: u16, body: String },

    #[error("upstream error: {code} {message}")]
    Api {
        code: i64,
        message: String,
        body: String,
    },

    #[error("upstream response exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("malformed upstream response: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },
}

impl UpstreamError {
    /// Raw upstream body worth showing to the caller, if any.
    pub fn body(&self) -> Option<&str> {
        match self {
            UpstreamError::Status { body, .. }
            | UpstreamError::Api { body, .. }
            | UpstreamError::Decode { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Short description recorded against a single failed delivery.
    pub fn delivery_detail(&self) -> String {
        match self {
            UpstreamError::Api { code, message, .. } => format!("{}:{}", code, message),
            UpstreamError::Transport(e) => e.to_string(),
            UpstreamError::Status { status, .. } => format!("http status {}", status),
            other => other.to_string(),
        }
    }
}

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_without_data() {
        let reply: ApiReply<TagUsersPage> =
            serde_json::from_value(json!({"count": 0, "next_openid": ""})).unwrap();
        assert_eq!(reply.errcode, 0);
        assert!(reply.body.data.openid.is_empty());
    }

    #[test]
    fn test_error_reply_without_body_fields() {
        let reply: ApiReply<TagUsersPage> =
            serde_json::from_value(json!({"errcode": 40003, "errmsg": "invalid openid"})).unwrap();
        assert_eq!(reply.errcode, 40003);
        assert_eq!(reply.errmsg, "invalid openid");
        assert!(reply.body.next_openid.is_empty());
    }

    #[test]
    fn test_template_message_omits_missing_url() {
        let data = TemplateData::from([(
            "first".to_string(),
            BTreeMap::from([("value".to_string(), "hi".to_string())]),
        )]);
        let message = TemplateMessage {
            touser: "u1",
            template_id: "tpl",
            url: None,
            data: &data,
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({"touser": "u1", "template_id": "tpl", "data": {"first": {"value": "hi"}}})
        );
    }

    #[test]
    fn test_delivery_detail() {
        let err = UpstreamError::Api {
            code: 40003,
            message: "invalid openid".into(),
            body: String::new(),
        };
        assert_eq!(err.delivery_detail(), "40003:invalid openid");

        let err = UpstreamError::Status {
            status: 503,
            body: "busy".into(),
        };
        assert_eq!(err.delivery_detail(), "http status 503");
        assert_eq!(err.body(), Some("busy"));
    }
}
