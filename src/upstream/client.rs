//! Platform API client with timeout and response size limits.
//!
//! # Responsibilities
//! - Build endpoint URLs from the configured base
//! - Enforce the per-call timeout and the response body cap
//! - Map status codes and embedded `errcode` values to typed errors

use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::config::UpstreamConfig;
use crate::upstream::types::{
    ApiReply, BroadcastRequest, RawResponse, TagUsersPage, TagUsersQuery, TemplateMessage,
    TemplateReceipt, UpstreamError, UpstreamResult, MASS_SEND_ALL, TAGS_GET, TAG_USERS_GET,
    TEMPLATE_SEND,
};

/// Client for the platform's open API.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    max_response_bytes: usize,
}

impl UpstreamClient {
    /// Create a new client from configuration.
    pub fn new(config: &UpstreamConfig) -> UpstreamResult<Self> {
        // Reject bad base URLs here rather than on the first call.
        Url::parse(&config.base_url)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(UpstreamError::Client)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// Absolute URL of an API path, keeping any path prefix of the base URL.
    pub fn endpoint(&self, path: &str) -> UpstreamResult<Url> {
        Ok(Url::parse(&format!("{}{}", self.base_url, path))?)
    }

    /// Fetch the tag list. The body is returned as-is, whatever the status.
    pub async fn list_tags(&self) -> UpstreamResult<RawResponse> {
        self.get_raw(TAGS_GET).await
    }

    /// Submit a mass broadcast. The body is returned as-is, whatever the status.
    pub async fn mass_send(&self, request: &BroadcastRequest) -> UpstreamResult<RawResponse> {
        self.post_raw(MASS_SEND_ALL, request).await
    }

    /// Fetch one page of members of `tag_id`, starting after `cursor`.
    pub async fn tag_users_page(&self, tag_id: u64, cursor: &str) -> UpstreamResult<TagUsersPage> {
        let query = TagUsersQuery {
            tagid: tag_id,
            next_openid: cursor,
        };
        self.call(TAG_USERS_GET, &query).await
    }

    /// Deliver a template message to one recipient.
    pub async fn send_template(&self, message: &TemplateMessage<'_>) -> UpstreamResult<TemplateReceipt> {
        self.call(TEMPLATE_SEND, message).await
    }

    /// POST `body` to `path` and decode a successful platform reply.
    pub async fn call<B, T>(&self, path: &str, body: &B) -> UpstreamResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let raw = self.post_raw(path, body).await?;

        if !raw.status.is_success() {
            return Err(UpstreamError::Status {
                status: raw.status.as_u16(),
                body: raw.text(),
            });
        }

        let reply: ApiReply<T> = serde_json::from_slice(&raw.body).map_err(|source| {
            UpstreamError::Decode {
                source,
                body: raw.text(),
            }
        })?;

        if reply.errcode != 0 {
            return Err(UpstreamError::Api {
                code: reply.errcode,
                message: reply.errmsg,
                body: raw.text(),
            });
        }

        Ok(reply.body)
    }

    pub async fn get_raw(&self, path: &str) -> UpstreamResult<RawResponse> {
        let url = self.endpoint(path)?;
        let start = Instant::now();
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(UpstreamError::Transport)?;
        self.read_capped(path, response, start).await
    }

    pub async fn post_raw<B>(&self, path: &str, body: &B) -> UpstreamResult<RawResponse>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path)?;
        let start = Instant::now();
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(UpstreamError::Transport)?;
        self.read_capped(path, response, start).await
    }

    async fn read_capped(
        &self,
        path: &str,
        mut response: reqwest::Response,
        start: Instant,
    ) -> UpstreamResult<RawResponse> {
        let limit = self.max_response_bytes;
        let status = response.status();

        if response.content_length().is_some_and(|len| len > limit as u64) {
            tracing::warn!(path, %status, limit, "Upstream response too large");
            return Err(UpstreamError::BodyTooLarge { limit });
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(UpstreamError::Transport)? {
            if body.len() + chunk.len() > limit {
                tracing::warn!(path, %status, limit, "Upstream response too large");
                return Err(UpstreamError::BodyTooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(
            path,
            %status,
            bytes = body.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Upstream call completed"
        );

        Ok(RawResponse { status, body })
    }
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("base_url", &self.base_url)
            .field("max_response_bytes", &self.max_response_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Router};
    use serde_json::{json, Value};
    use std::net::SocketAddr;

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        addr
    }

    fn client_for(addr: SocketAddr, max_response_bytes: usize) -> UpstreamClient {
        UpstreamClient::new(&UpstreamConfig {
            base_url: format!("http://{}", addr),
            timeout_secs: 2,
            max_response_bytes,
            ..UpstreamConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = UpstreamClient::new(&UpstreamConfig {
            base_url: "http://mock.local/openapi/".into(),
            ..UpstreamConfig::default()
        })
        .unwrap();

        assert_eq!(
            client.endpoint(TAGS_GET).unwrap().as_str(),
            "http://mock.local/openapi/cgi-bin/tags/get"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = UpstreamClient::new(&UpstreamConfig {
            base_url: "not a url".into(),
            ..UpstreamConfig::default()
        });
        assert!(matches!(result, Err(UpstreamError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_page_decoded() {
        let router = Router::new().route(
            TAG_USERS_GET,
            post(|axum::Json(query): axum::Json<Value>| async move {
                assert_eq!(query, json!({"tagid": 7, "next_openid": "c1"}));
                axum::Json(json!({"count": 1, "data": {"openid": ["x"]}, "next_openid": ""}))
            }),
        );
        let client = client_for(serve(router).await, 1024);

        let page = client.tag_users_page(7, "c1").await.unwrap();
        assert_eq!(page.data.openid, vec!["x".to_string()]);
        assert!(page.next_openid.is_empty());
    }

    #[tokio::test]
    async fn test_errcode_mapped() {
        let router = Router::new().route(
            TAG_USERS_GET,
            post(|| async { axum::Json(json!({"errcode": 40013, "errmsg": "invalid tagid"})) }),
        );
        let client = client_for(serve(router).await, 1024);

        match client.tag_users_page(1, "").await {
            Err(UpstreamError::Api { code, message, body }) => {
                assert_eq!(code, 40013);
                assert_eq!(message, "invalid tagid");
                assert!(body.contains("40013"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_status_mapped() {
        let router = Router::new().route(
            TAG_USERS_GET,
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
        );
        let client = client_for(serve(router).await, 1024);

        match client.tag_users_page(1, "").await {
            Err(UpstreamError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "busy");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let router = Router::new().route(TAG_USERS_GET, post(|| async { "<html>oops</html>" }));
        let client = client_for(serve(router).await, 1024);

        let err = client.tag_users_page(1, "").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Decode { .. }));
        assert_eq!(err.body(), Some("<html>oops</html>"));
    }

    #[tokio::test]
    async fn test_response_cap() {
        let router = Router::new().route(TAGS_GET, axum::routing::get(|| async { "x".repeat(4096) }));
        let client = client_for(serve(router).await, 1024);

        let err = client.list_tags().await.unwrap_err();
        assert!(matches!(err, UpstreamError::BodyTooLarge { limit: 1024 }));
    }

    #[tokio::test]
    async fn test_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = client_for(addr, 1024);

        let err = client.list_tags().await.unwrap_err();
        assert!(matches!(err, UpstreamError::Transport(_)));
    }
}
