//! Data models
//!
//! Records persisted by the booking engine and returned to callers.
//! All IDs are UUID v4 strings, all timestamps Unix milliseconds (UTC),
//! all money values integer cents.

pub mod booking;
pub mod payment;
pub mod resource;
pub mod service;
pub mod tenant;

// Re-exports
pub use booking::*;
pub use payment::*;
pub use resource::*;
pub use service::*;
pub use tenant::*;
