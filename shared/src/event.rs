//! Domain events - immutable facts emitted after a successful state change
//!
//! Consumed asynchronously by the notification collaborator. The engine
//! only enqueues them; delivery and ordering are the consumer's concern.

use crate::models::{BookingStatus, PaymentStatus};
use serde::{Deserialize, Serialize};

/// Domain event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Event unique ID
    pub event_id: String,
    /// Tenant the event belongs to
    pub tenant_id: String,
    /// Server timestamp (Unix milliseconds)
    pub timestamp: i64,
    /// Event type
    pub event_type: DomainEventType,
    /// Event payload
    pub payload: EventPayload,
}

/// Event type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEventType {
    // Booking lifecycle
    BookingCreated,
    BookingConfirmed,
    BookingCancelled,
    BookingCompleted,
    BookingNoShow,
    BookingRescheduled,

    // Payments
    PaymentSucceeded,
    PaymentFailed,
    PaymentCancelled,
}

impl std::fmt::Display for DomainEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DomainEventType::BookingCreated => write!(f, "BOOKING_CREATED"),
            DomainEventType::BookingConfirmed => write!(f, "BOOKING_CONFIRMED"),
            DomainEventType::BookingCancelled => write!(f, "BOOKING_CANCELLED"),
            DomainEventType::BookingCompleted => write!(f, "BOOKING_COMPLETED"),
            DomainEventType::BookingNoShow => write!(f, "BOOKING_NO_SHOW"),
            DomainEventType::BookingRescheduled => write!(f, "BOOKING_RESCHEDULED"),
            DomainEventType::PaymentSucceeded => write!(f, "PAYMENT_SUCCEEDED"),
            DomainEventType::PaymentFailed => write!(f, "PAYMENT_FAILED"),
            DomainEventType::PaymentCancelled => write!(f, "PAYMENT_CANCELLED"),
        }
    }
}

/// Event payload variants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventPayload {
    // ========== Booking ==========
    BookingCreated {
        booking_id: String,
        customer_id: String,
        service_id: String,
        resource_id: String,
        start_at: i64,
        end_at: i64,
    },

    /// Confirm / complete / no-show
    BookingStatusChanged {
        booking_id: String,
        from: BookingStatus,
        to: BookingStatus,
    },

    BookingCancelled {
        booking_id: String,
        previous_status: BookingStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        /// Status of the payment after void/refund, if one existed
        #[serde(skip_serializing_if = "Option::is_none")]
        payment_status: Option<PaymentStatus>,
    },

    BookingRescheduled {
        booking_id: String,
        previous_start_at: i64,
        previous_end_at: i64,
        start_at: i64,
        end_at: i64,
    },

    // ========== Payment ==========
    PaymentSucceeded {
        payment_id: String,
        booking_id: String,
        amount_cents: i64,
        platform_fee_cents: i64,
    },

    PaymentFailed {
        payment_id: String,
        booking_id: String,
        reason: String,
    },

    PaymentCancelled {
        payment_id: String,
        booking_id: String,
        /// true when captured funds were refunded, false for a voided authorization
        refunded: bool,
    },
}

impl DomainEvent {
    /// Create a new event stamped with the server clock
    pub fn new(
        tenant_id: impl Into<String>,
        event_type: DomainEventType,
        payload: EventPayload,
    ) -> Self {
        Self {
            event_id: crate::util::new_id(),
            tenant_id: tenant_id.into(),
            timestamp: crate::util::now_millis(),
            event_type,
            payload,
        }
    }
}
