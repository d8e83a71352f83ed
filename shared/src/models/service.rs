//! Service Model

use serde::{Deserialize, Serialize};

/// Bookable service offered by a tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub tenant_id: String,
    /// Unique within the tenant
    pub slug: String,
    pub name: String,
    /// Always > 0
    pub duration_minutes: u32,
    /// Always >= 0
    pub price_cents: i64,
    /// Gates new bookings only
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Service {
    /// Paid services need a captured payment before a booking can be confirmed
    pub fn requires_payment(&self) -> bool {
        self.price_cents > 0
    }
}

/// Create service payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCreate {
    pub slug: String,
    pub name: String,
    pub duration_minutes: u32,
    pub price_cents: i64,
}
