//! BookingsManager - booking lifecycle and calendar writes
//!
//! # Create Flow
//!
//! ```text
//! create(input)
//!     ├─ 1. Validate input
//!     ├─ 2. Idempotency fast path (tenant_id, client_generated_id)
//!     ├─ 3. Load tenant / resource / service, check ownership and activity
//!     ├─ 4. Acquire resource lock
//!     ├─ 5. Begin write transaction
//!     ├─ 6. Re-check idempotency key
//!     ├─ 7. Overlap scan on the occupancy index
//!     ├─ 8. Insert booking + occupancy + idempotency key
//!     ├─ 9. Commit transaction
//!     └─ 10. Enqueue BookingCreated
//! ```
//!
//! Every mutation runs under the booking's resource lock. No `.await`
//! happens while a redb write transaction is open.

use super::{CreateBooking, CreateOutcome};
use crate::core::{BookingError, BookingResult};
use crate::notify::EventQueue;
use crate::payments::PaymentOrchestrator;
use crate::registry::Registry;
use crate::slots::TimeRange;
use crate::storage::BookingStorage;
use crate::utils::KeyedLocks;
use crate::utils::validation::{
    MAX_ID_LEN, MAX_IDEMPOTENCY_KEY_LEN, MAX_REASON_LEN, validate_optional_text,
    validate_required_text,
};
use shared::event::{DomainEvent, DomainEventType, EventPayload};
use shared::models::{Booking, BookingStatus, PaymentStatus};
use shared::util::{new_id, now_millis};
use std::sync::Arc;

pub struct BookingsManager {
    storage: BookingStorage,
    registry: Arc<Registry>,
    payments: Arc<PaymentOrchestrator>,
    events: EventQueue,
    resource_locks: Arc<KeyedLocks>,
    payment_locks: Arc<KeyedLocks>,
}

impl std::fmt::Debug for BookingsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingsManager")
            .field("storage", &"<BookingStorage>")
            .field("resource_locks", &self.resource_locks.len())
            .finish_non_exhaustive()
    }
}

impl BookingsManager {
    pub fn new(
        storage: BookingStorage,
        registry: Arc<Registry>,
        payments: Arc<PaymentOrchestrator>,
        events: EventQueue,
        resource_locks: Arc<KeyedLocks>,
        payment_locks: Arc<KeyedLocks>,
    ) -> Self {
        Self {
            storage,
            registry,
            payments,
            events,
            resource_locks,
            payment_locks,
        }
    }

    // ========== Reads ==========

    pub fn get(&self, booking_id: &str) -> BookingResult<Booking> {
        self.storage
            .get_booking(booking_id)?
            .ok_or_else(|| BookingError::not_found("booking", booking_id))
    }

    pub fn find_by_client_id(
        &self,
        tenant_id: &str,
        client_generated_id: &str,
    ) -> BookingResult<Option<Booking>> {
        match self
            .storage
            .booking_id_for_client_key(tenant_id, client_generated_id)?
        {
            Some(booking_id) => Ok(Some(self.get(&booking_id)?)),
            None => Ok(None),
        }
    }

    /// Every booking of a resource, any status, ordered by start
    pub fn list_for_resource(&self, resource_id: &str) -> BookingResult<Vec<Booking>> {
        self.registry.resource(resource_id)?;
        Ok(self.storage.bookings_for_resource(resource_id)?)
    }

    // ========== Create ==========

    pub async fn create(&self, input: CreateBooking) -> BookingResult<CreateOutcome> {
        validate_required_text(&input.tenant_id, "tenant_id", MAX_ID_LEN)?;
        validate_required_text(&input.customer_id, "customer_id", MAX_ID_LEN)?;
        validate_required_text(&input.service_id, "service_id", MAX_ID_LEN)?;
        validate_required_text(&input.resource_id, "resource_id", MAX_ID_LEN)?;
        validate_required_text(
            &input.client_generated_id,
            "client_generated_id",
            MAX_IDEMPOTENCY_KEY_LEN,
        )?;

        self.registry.tenant(&input.tenant_id)?;

        // Replays skip every availability check
        if let Some(booking) = self.find_by_client_id(&input.tenant_id, &input.client_generated_id)? {
            tracing::debug!(booking_id = %booking.id, "Duplicate create, returning original booking");
            return Ok(CreateOutcome {
                booking,
                replayed: true,
            });
        }

        let resource = self.registry.resource(&input.resource_id)?;
        if resource.tenant_id != input.tenant_id {
            return Err(BookingError::ResourceNotFound(input.resource_id));
        }
        let service = self.registry.service(&input.service_id)?;
        if service.tenant_id != input.tenant_id {
            return Err(BookingError::not_found("service", input.service_id));
        }
        if !service.is_active {
            return Err(BookingError::ServiceInactive(service.id));
        }
        if !resource.is_active {
            return Err(BookingError::ResourceInactive(resource.id));
        }

        let _resource_guard = self.resource_locks.lock(&resource.id).await;

        let txn = self.storage.begin_write()?;
        if let Some(booking_id) = self.storage.booking_id_for_client_key_txn(
            &txn,
            &input.tenant_id,
            &input.client_generated_id,
        )? {
            let booking = self
                .storage
                .get_booking_txn(&txn, &booking_id)?
                .ok_or_else(|| BookingError::not_found("booking", &booking_id))?;
            return Ok(CreateOutcome {
                booking,
                replayed: true,
            });
        }

        let range = input.range;
        if let Some(conflict) = self
            .storage
            .overlapping_txn(&txn, &resource.id, range.start(), range.end())?
            .into_iter()
            .next()
        {
            tracing::info!(
                resource_id = %resource.id,
                conflicting_booking_id = %conflict.booking_id,
                range = %range,
                "Slot conflict"
            );
            return Err(BookingError::SlotConflict {
                resource_id: resource.id,
                conflicting_booking_id: conflict.booking_id,
            });
        }

        let now = now_millis();
        let booking = Booking {
            id: new_id(),
            tenant_id: input.tenant_id,
            customer_id: input.customer_id,
            service_id: service.id.clone(),
            resource_id: resource.id.clone(),
            start_at: range.start(),
            end_at: range.end(),
            status: BookingStatus::Pending,
            client_generated_id: input.client_generated_id,
            payment_required: service.requires_payment(),
            payment_id: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };
        self.storage.put_booking(&txn, &booking)?;
        self.storage.occupy(&txn, &booking)?;
        self.storage.bind_client_key(
            &txn,
            &booking.tenant_id,
            &booking.client_generated_id,
            &booking.id,
        )?;
        self.storage.commit(txn)?;

        tracing::info!(
            booking_id = %booking.id,
            resource_id = %booking.resource_id,
            start_at = booking.start_at,
            end_at = booking.end_at,
            "Booking created"
        );
        self.events.publish(DomainEvent::new(
            &booking.tenant_id,
            DomainEventType::BookingCreated,
            EventPayload::BookingCreated {
                booking_id: booking.id.clone(),
                customer_id: booking.customer_id.clone(),
                service_id: booking.service_id.clone(),
                resource_id: booking.resource_id.clone(),
                start_at: booking.start_at,
                end_at: booking.end_at,
            },
        ));

        Ok(CreateOutcome {
            booking,
            replayed: false,
        })
    }

    // ========== Transitions ==========

    /// pending → confirmed; paid services need a succeeded payment
    pub async fn confirm(&self, booking_id: &str) -> BookingResult<Booking> {
        let resource_id = self.get(booking_id)?.resource_id;
        let _resource_guard = self.resource_locks.lock(&resource_id).await;

        let mut booking = self.get(booking_id)?;
        if booking.status != BookingStatus::Pending {
            return Err(BookingError::invalid_transition(
                "booking",
                booking_id,
                booking.status,
                BookingStatus::Confirmed,
            ));
        }

        // Keeps the payment from being refunded between check and write
        let _payment_guard = match &booking.payment_id {
            Some(payment_id) => Some(self.payment_locks.lock(payment_id).await),
            None => None,
        };

        if booking.payment_required {
            let payment = match &booking.payment_id {
                Some(payment_id) => self.storage.get_payment(payment_id)?,
                None => None,
            };
            match payment {
                Some(payment) if payment.status == PaymentStatus::Succeeded => {}
                Some(payment) => {
                    return Err(BookingError::PaymentNotReady {
                        booking_id: booking_id.to_string(),
                        reason: format!("payment {} is {}", payment.id, payment.status),
                    });
                }
                None => {
                    return Err(BookingError::PaymentNotReady {
                        booking_id: booking_id.to_string(),
                        reason: "no payment authorized".to_string(),
                    });
                }
            }
        }

        booking.status = BookingStatus::Confirmed;
        booking.updated_at = now_millis();
        let txn = self.storage.begin_write()?;
        self.storage.put_booking(&txn, &booking)?;
        self.storage.commit(txn)?;

        tracing::info!(booking_id = %booking_id, "Booking confirmed");
        self.publish_status_change(
            &booking,
            BookingStatus::Pending,
            DomainEventType::BookingConfirmed,
        );
        Ok(booking)
    }

    /// pending | confirmed → cancelled
    ///
    /// A live payment is voided or refunded first. If that fails the booking
    /// is left exactly as it was and the payment error is returned.
    pub async fn cancel(&self, booking_id: &str, reason: Option<String>) -> BookingResult<Booking> {
        validate_optional_text(reason.as_deref(), "reason", MAX_REASON_LEN)?;

        let resource_id = self.get(booking_id)?.resource_id;
        let _resource_guard = self.resource_locks.lock(&resource_id).await;

        let mut booking = self.get(booking_id)?;
        let previous_status = booking.status;
        if !previous_status.occupies_calendar() {
            return Err(BookingError::invalid_transition(
                "booking",
                booking_id,
                previous_status,
                BookingStatus::Cancelled,
            ));
        }

        let payment_status = match &booking.payment_id {
            Some(payment_id) => {
                let payment = self
                    .payments
                    .release_for_cancellation(payment_id)
                    .await
                    .inspect_err(|e| {
                        tracing::warn!(booking_id = %booking_id, error = %e, "Cancel aborted, payment not released");
                    })?;
                Some(payment.status)
            }
            None => None,
        };

        booking.status = BookingStatus::Cancelled;
        booking.cancel_reason = reason.clone();
        booking.updated_at = now_millis();
        let txn = self.storage.begin_write()?;
        self.storage.put_booking(&txn, &booking)?;
        self.storage.release(&txn, &booking)?;
        self.storage.commit(txn)?;

        tracing::info!(booking_id = %booking_id, from = %previous_status, "Booking cancelled");
        self.events.publish(DomainEvent::new(
            &booking.tenant_id,
            DomainEventType::BookingCancelled,
            EventPayload::BookingCancelled {
                booking_id: booking.id.clone(),
                previous_status,
                reason,
                payment_status,
            },
        ));
        Ok(booking)
    }

    /// confirmed → completed, once the booking has ended
    pub async fn complete(&self, booking_id: &str, now: i64) -> BookingResult<Booking> {
        self.finish(booking_id, now, BookingStatus::Completed).await
    }

    /// confirmed → no_show, once the booking has ended
    pub async fn mark_no_show(&self, booking_id: &str, now: i64) -> BookingResult<Booking> {
        self.finish(booking_id, now, BookingStatus::NoShow).await
    }

    async fn finish(&self, booking_id: &str, now: i64, target: BookingStatus) -> BookingResult<Booking> {
        let resource_id = self.get(booking_id)?.resource_id;
        let _resource_guard = self.resource_locks.lock(&resource_id).await;

        let mut booking = self.get(booking_id)?;
        if booking.status == target {
            return Ok(booking);
        }
        if booking.status != BookingStatus::Confirmed {
            return Err(BookingError::invalid_transition(
                "booking",
                booking_id,
                booking.status,
                target,
            ));
        }
        if now < booking.end_at {
            return Err(BookingError::invalid_transition(
                "booking",
                booking_id,
                format!("confirmed (ends at {})", booking.end_at),
                target,
            ));
        }

        booking.status = target;
        booking.updated_at = now_millis();
        let txn = self.storage.begin_write()?;
        self.storage.put_booking(&txn, &booking)?;
        self.storage.release(&txn, &booking)?;
        self.storage.commit(txn)?;

        tracing::info!(booking_id = %booking_id, to = %target, "Booking finished");
        let event_type = match target {
            BookingStatus::NoShow => DomainEventType::BookingNoShow,
            _ => DomainEventType::BookingCompleted,
        };
        self.publish_status_change(&booking, BookingStatus::Confirmed, event_type);
        Ok(booking)
    }

    /// Move a pending or confirmed booking to a new range on the same resource
    pub async fn reschedule(&self, booking_id: &str, new_range: TimeRange) -> BookingResult<Booking> {
        let resource_id = self.get(booking_id)?.resource_id;
        let _resource_guard = self.resource_locks.lock(&resource_id).await;

        let mut booking = self.get(booking_id)?;
        if !booking.status.occupies_calendar() {
            return Err(BookingError::invalid_transition(
                "booking",
                booking_id,
                booking.status,
                "rescheduled",
            ));
        }
        if booking.start_at == new_range.start() && booking.end_at == new_range.end() {
            return Ok(booking);
        }

        let txn = self.storage.begin_write()?;
        if let Some(conflict) = self
            .storage
            .overlapping_txn(&txn, &resource_id, new_range.start(), new_range.end())?
            .into_iter()
            .find(|entry| entry.booking_id != booking.id)
        {
            return Err(BookingError::SlotConflict {
                resource_id,
                conflicting_booking_id: conflict.booking_id,
            });
        }

        let (previous_start_at, previous_end_at) = (booking.start_at, booking.end_at);
        self.storage.release(&txn, &booking)?;
        booking.start_at = new_range.start();
        booking.end_at = new_range.end();
        booking.updated_at = now_millis();
        self.storage.occupy(&txn, &booking)?;
        self.storage.put_booking(&txn, &booking)?;
        self.storage.commit(txn)?;

        tracing::info!(booking_id = %booking_id, range = %new_range, "Booking rescheduled");
        self.events.publish(DomainEvent::new(
            &booking.tenant_id,
            DomainEventType::BookingRescheduled,
            EventPayload::BookingRescheduled {
                booking_id: booking.id.clone(),
                previous_start_at,
                previous_end_at,
                start_at: booking.start_at,
                end_at: booking.end_at,
            },
        ));
        Ok(booking)
    }

    fn publish_status_change(&self, booking: &Booking, from: BookingStatus, event_type: DomainEventType) {
        self.events.publish(DomainEvent::new(
            &booking.tenant_id,
            event_type,
            EventPayload::BookingStatusChanged {
                booking_id: booking.id.clone(),
                from,
                to: booking.status,
            },
        ));
    }
}
