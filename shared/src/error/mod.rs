//! Unified error codes shared by the engine and its callers
//!
//! - [`ErrorCode`]: Standardized numeric codes for every engine error
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 3xxx: Tenant / catalog errors
//! - 4xxx: Booking errors
//! - 5xxx: Payment errors
//! - 9xxx: System errors

mod codes;

pub use codes::{ErrorCode, InvalidErrorCode};
