//! Time & Slot Model
//!
//! Pure value types and functions: half-open time ranges, candidate slot
//! generation and working-hours expansion. Nothing here touches storage.

mod range;
mod windows;

pub use range::{TimeRange, ranges_overlap};
pub use windows::{SlotWindows, working_windows};

use serde::{Deserialize, Serialize};

/// Derived, never persisted candidate booking window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub resource_id: String,
    pub service_id: String,
    pub start_at: i64,
    pub end_at: i64,
    pub is_available: bool,
}
