//! Relay logic: the looping operations behind the envelope endpoints.
//!
//! # Data Flow
//! ```text
//! validated input
//!     → members.rs  (cursor loop, fatal on first upstream error)
//!     → template.rs (per-recipient loop, failures recorded per item)
//!     → payload for the success envelope, or RelayError
//! ```
//!
//! # Design Decisions
//! - Upstream calls inside one operation are strictly sequential
//! - Successive calls are spaced by the shared Pacer
//! - Both loops stop between calls when the cancellation token fires

pub mod members;
pub mod template;

use thiserror::Error;

use crate::resilience::Cancelled;
use crate::upstream::UpstreamError;

pub use members::{fetch_tag_members, TagId, TagMembers};
pub use template::{push_template, FailedDelivery, TemplatePush, TemplatePushRequest, TemplatePushResult};

/// Errors surfaced by relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Missing or malformed client input.
    #[error("{0}")]
    InvalidInput(String),

    /// Wrong HTTP method for the endpoint.
    #[error("{0}")]
    MethodNotAllowed(&'static str),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("request cancelled")]
    Cancelled,
}

impl From<Cancelled> for RelayError {
    fn from(_: Cancelled) -> Self {
        RelayError::Cancelled
    }
}

impl RelayError {
    pub fn invalid(message: impl Into<String>) -> Self {
        RelayError::InvalidInput(message.into())
    }
}
