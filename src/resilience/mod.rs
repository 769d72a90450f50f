//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Looping handler:
//!     → upstream call (deadline enforced by the client)
//!     → pacing.rs (fixed pause before the next call, cancellable)
//!     → next upstream call
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries: a failed call is either fatal or recorded per item
//! - Pauses are scheduled sleeps that give way to cancellation

pub mod pacing;

pub use pacing::{Cancelled, Pacer};
