//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, body limit, request ID)
//! - Swap in reloaded configuration without restarting
//! - Serve until the shutdown token fires, then drain

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::RelayConfig;
use crate::http::request::MakeRelayRequestId;
use crate::http::{liveness, members, tags, template};
use crate::resilience::Pacer;
use crate::upstream::{UpstreamClient, UpstreamResult};

pub const HELLO_PATH: &str = "/api/hello";
pub const TAGS_PATH: &str = "/api/tags";
pub const MASS_SEND_PATH: &str = "/api/mass/send";
pub const TAG_USERS_PATH: &str = "/api/tag/users";
pub const TEMPLATE_SEND_PATH: &str = "/api/template/send";

/// Everything a handler needs, rebuilt as a unit on config reload.
#[derive(Debug)]
pub struct RelayContext {
    pub config: RelayConfig,
    pub upstream: UpstreamClient,
    pub pacer: Pacer,
}

impl RelayContext {
    pub fn from_config(config: RelayConfig) -> UpstreamResult<Self> {
        let upstream = UpstreamClient::new(&config.upstream)?;
        let pacer = Pacer::from_millis(config.upstream.pacing_ms);
        Ok(Self {
            config,
            upstream,
            pacer,
        })
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<RelayContext>>,
    /// Fires when the server shuts down; long loops watch child tokens.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Snapshot of the current context. Holding it keeps one request on one
    /// configuration even if a reload lands mid-request.
    pub fn context(&self) -> Arc<RelayContext> {
        self.inner.load_full()
    }
}

/// HTTP server for the platform relay.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RelayConfig) -> UpstreamResult<Self> {
        let router_config = config.clone();
        let state = AppState {
            inner: Arc::new(ArcSwap::from_pointee(RelayContext::from_config(config)?)),
            shutdown: CancellationToken::new(),
        };

        let router = Self::build_router(&router_config, state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// axum answers HEAD with the GET handler unless a HEAD handler is set,
    /// so the GET-only envelope routes reject it explicitly.
    #[allow(deprecated)]
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        Router::new()
            .route(
                HELLO_PATH,
                get(liveness::hello)
                    .head(liveness::unsupported)
                    .fallback(liveness::unsupported),
            )
            .route(TAGS_PATH, get(tags::list_tags))
            .route(MASS_SEND_PATH, post(tags::mass_send))
            .route(
                TAG_USERS_PATH,
                get(members::tag_users)
                    .head(members::unsupported)
                    .fallback(members::unsupported),
            )
            .route(
                TEMPLATE_SEND_PATH,
                post(template::send_template).fallback(template::unsupported),
            )
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.limits.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRelayRequestId))
    }

    /// Shared state, for callers that need to inspect the live context.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configurations received on `config_updates` replace the relay context
    /// for subsequent requests. Listener and router settings are fixed at
    /// startup.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<RelayConfig>,
        shutdown: CancellationToken,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let inner = self.state.inner.clone();
        let reloader = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                apply_config(&inner, config);
            }
        });

        let handlers_token = self.state.shutdown.clone();
        let result = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("Shutdown signal received, draining requests");
                handlers_token.cancel();
            })
            .await;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        result
    }
}

fn apply_config(inner: &ArcSwap<RelayContext>, config: RelayConfig) {
    let current = inner.load();
    if current.config == config {
        return;
    }
    if current.config.listener != config.listener
        || current.config.limits != config.limits
        || current.config.timeouts != config.timeouts
    {
        tracing::warn!("Listener, limit and timeout changes take effect after restart");
    }
    drop(current);

    match RelayContext::from_config(config) {
        Ok(context) => {
            tracing::info!(
                upstream = %context.config.upstream.base_url,
                pacing_ms = context.config.upstream.pacing_ms,
                "Relay configuration reloaded"
            );
            inner.store(Arc::new(context));
        }
        Err(e) => {
            tracing::error!(error = %e, "Rejected reloaded configuration, keeping current one");
        }
    }
}
