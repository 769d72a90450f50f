//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, route table)
//!     → request.rs (request ID assigned / propagated)
//!     → liveness.rs | tags.rs | members.rs | template.rs
//!     → relay loops / upstream client
//!     → response.rs (envelope, status mapping)
//!     → Send to client
//! ```

pub mod liveness;
pub mod members;
pub mod request;
pub mod response;
pub mod server;
pub mod tags;
pub mod template;

pub use request::{MakeRelayRequestId, RequestIdExt, X_REQUEST_ID};
pub use response::Envelope;
pub use server::{AppState, HttpServer, RelayContext};
