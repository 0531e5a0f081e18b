//! Core domain models for the webhook delivery pipeline.
//!
//! Provides the wire-format payload types, the queued envelope wrapper with
//! its retry bookkeeping, and the clock abstraction used for deterministic
//! testing. All other crates depend on these foundational types.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod time;

pub use error::{CoreError, Result};
pub use models::{EventKind, MessageContent, QueuedEnvelope, SessionId, WebhookPayload};
pub use time::{Clock, RealClock, TestClock};
