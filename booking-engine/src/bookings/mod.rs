//! Booking State Machine
//!
//! ```text
//! pending ──► confirmed ──► completed
//!    │            ├───────► no_show
//!    └──► cancelled ◄──┘
//! ```
//!
//! Only [`BookingsManager`] changes a booking's status.

mod manager;

pub use manager::BookingsManager;

use crate::slots::TimeRange;
use shared::models::Booking;

/// Create booking input
#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub tenant_id: String,
    pub customer_id: String,
    pub service_id: String,
    pub resource_id: String,
    pub range: TimeRange,
    /// Idempotency key, unique per tenant
    pub client_generated_id: String,
}

/// Result of [`BookingsManager::create`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    pub booking: Booking,
    /// true when the key was seen before and the original booking is returned
    pub replayed: bool,
}
