//! Shared types for the booking engine
//!
//! Domain records, domain events, error codes and time helpers used by
//! the engine and by anything that talks to it.

pub mod error;
pub mod event;
pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::ErrorCode;
pub use event::{DomainEvent, DomainEventType, EventPayload};
