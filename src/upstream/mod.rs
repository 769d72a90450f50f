//! Upstream platform API subsystem.
//!
//! # Data Flow
//! ```text
//! handler / relay loop
//!     → client.rs (build URL, POST JSON, cap body, map errors)
//!     → types.rs (wire payloads, ApiReply<T> with embedded errcode)
//!     → typed page / receipt, or UpstreamError
//! ```
//!
//! # Design Decisions
//! - No access token is attached; the hosting environment authorizes calls
//! - Every call has a total deadline and a body size cap
//! - A non-zero `errcode` is an error even when the HTTP status is 200

pub mod client;
pub mod types;

pub use client::UpstreamClient;
pub use types::{
    BroadcastRequest, MediaReference, RawResponse, TagFilter, TemplateData, UpstreamError,
    UpstreamResult,
};
