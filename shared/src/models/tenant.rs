//! Tenant Model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tenant entity (租户) - root of data isolation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    /// Unique across the system, frozen once bookings reference the tenant
    pub slug: String,
    pub name: String,
    /// IANA timezone name, e.g. "Europe/Madrid"
    pub timezone: String,
    /// Opaque key-value payload, never interpreted by the engine
    #[serde(default)]
    pub settings: Map<String, Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create tenant payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantCreate {
    pub slug: String,
    pub name: String,
    pub timezone: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
}
