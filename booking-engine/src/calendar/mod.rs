//! Resource Calendar
//!
//! Per-resource occupancy queries and availability listing. Occupancy lives
//! in the redb `occupancy` index, which only holds pending and confirmed
//! bookings; writes to it happen in [`crate::bookings`] under the resource
//! lock.

use crate::core::{BookingError, BookingResult};
use crate::registry::Registry;
use crate::slots::{AvailabilitySlot, SlotWindows, TimeRange, working_windows};
use crate::storage::{BookingStorage, OccupancyEntry};
use std::sync::Arc;

pub struct ResourceCalendar {
    storage: BookingStorage,
    registry: Arc<Registry>,
    granularity_minutes: Option<u32>,
}

impl std::fmt::Debug for ResourceCalendar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCalendar")
            .field("granularity_minutes", &self.granularity_minutes)
            .finish_non_exhaustive()
    }
}

impl ResourceCalendar {
    pub fn new(
        storage: BookingStorage,
        registry: Arc<Registry>,
        granularity_minutes: Option<u32>,
    ) -> Self {
        Self {
            storage,
            registry,
            granularity_minutes,
        }
    }

    /// Whether no active booking overlaps `range`
    ///
    /// `excluding` ignores one booking, so a booking can be checked against
    /// its own new time.
    pub fn is_free(
        &self,
        resource_id: &str,
        range: TimeRange,
        excluding: Option<&str>,
    ) -> BookingResult<bool> {
        self.registry.resource(resource_id)?;
        let busy = self
            .storage
            .overlapping(resource_id, range.start(), range.end())?;
        Ok(busy
            .iter()
            .all(|entry| Some(entry.booking_id.as_str()) == excluding))
    }

    /// Active bookings overlapping `range`
    pub fn occupied(&self, resource_id: &str, range: TimeRange) -> BookingResult<Vec<OccupancyEntry>> {
        self.registry.resource(resource_id)?;
        Ok(self
            .storage
            .overlapping(resource_id, range.start(), range.end())?)
    }

    /// Candidate slots for a service on a resource within `day_range`
    ///
    /// Occupancy is read once, here; the returned value never touches
    /// storage again.
    pub fn list_availability(
        &self,
        resource_id: &str,
        service_id: &str,
        day_range: TimeRange,
    ) -> BookingResult<Availability> {
        let resource = self.registry.resource(resource_id)?;
        let service = self.registry.service(service_id)?;
        if service.tenant_id != resource.tenant_id {
            return Err(BookingError::not_found("service", service_id));
        }
        let tz = self.registry.tenant_timezone(&resource.tenant_id)?;

        let generators = working_windows(day_range, &resource.working_hours, tz)
            .into_iter()
            .map(|window| SlotWindows::new(window, service.duration_minutes, self.granularity_minutes))
            .collect::<BookingResult<Vec<_>>>()?;

        let busy = self
            .storage
            .overlapping(resource_id, day_range.start(), day_range.end())?
            .into_iter()
            .map(|entry| TimeRange::new(entry.start_at, entry.end_at))
            .collect::<BookingResult<Vec<_>>>()?;

        tracing::debug!(
            resource_id = %resource_id,
            service_id = %service_id,
            windows = generators.len(),
            busy = busy.len(),
            "Listing availability"
        );
        Ok(Availability {
            range: day_range,
            resource_id: resource.id,
            service_id: service.id,
            bookable: resource.is_active && service.is_active,
            generators,
            busy,
        })
    }
}

/// Finite, restartable slot sequence
///
/// Every call to [`Availability::iter`] yields the same slots.
#[derive(Debug, Clone)]
pub struct Availability {
    /// Only slots fully inside the queried range are listed
    range: TimeRange,
    resource_id: String,
    service_id: String,
    /// Inactive resources or services offer no available slot
    bookable: bool,
    generators: Vec<SlotWindows>,
    busy: Vec<TimeRange>,
}

impl Availability {
    pub fn iter(&self) -> impl Iterator<Item = AvailabilitySlot> + '_ {
        self.generators
            .iter()
            .cloned()
            .flatten()
            .filter(move |slot| self.range.contains(slot))
            .map(move |slot| AvailabilitySlot {
                resource_id: self.resource_id.clone(),
                service_id: self.service_id.clone(),
                start_at: slot.start(),
                end_at: slot.end(),
                is_available: self.bookable && !self.busy.iter().any(|b| b.overlaps(&slot)),
            })
    }

    /// Only the slots that can be booked
    pub fn available(&self) -> impl Iterator<Item = AvailabilitySlot> + '_ {
        self.iter().filter(|slot| slot.is_available)
    }
}

impl<'a> IntoIterator for &'a Availability {
    type Item = AvailabilitySlot;
    type IntoIter = Box<dyn Iterator<Item = AvailabilitySlot> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
