//! Resource Model

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Bookable capacity unit (staff member, room, equipment)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub tenant_id: String,
    /// Unique within the tenant
    pub slug: String,
    pub name: String,
    /// Weekly schedule in the tenant's local time. Empty = bookable all day.
    #[serde(default)]
    pub working_hours: Vec<WorkingHours>,
    /// Gates new bookings only
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One working interval on a weekday, `[open, close)` in local time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub weekday: Weekday,
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl WorkingHours {
    pub fn new(weekday: Weekday, open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            weekday,
            open,
            close,
        }
    }

    /// Same hours on every day of the week
    pub fn every_day(open: NaiveTime, close: NaiveTime) -> Vec<Self> {
        [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]
        .into_iter()
        .map(|weekday| Self::new(weekday, open, close))
        .collect()
    }
}

/// Create resource payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceCreate {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub working_hours: Vec<WorkingHours>,
}
