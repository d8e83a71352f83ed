use crate::payments::GatewayError;
use crate::storage::StorageError;
use shared::error::ErrorCode;
use thiserror::Error;

/// Engine errors
///
/// Validation and conflict variants are always raised before any state is
/// written. Gateway variants carry the provider's failure verbatim.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Invalid time range: start={start}, end={end}")]
    InvalidRange { start: i64, end: i64 },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Service is inactive: {0}")]
    ServiceInactive(String),

    #[error("Resource is inactive: {0}")]
    ResourceInactive(String),

    #[error("Slot conflict on resource {resource_id}: overlaps booking {conflicting_booking_id}")]
    SlotConflict {
        resource_id: String,
        conflicting_booking_id: String,
    },

    #[error("Payment not ready for booking {booking_id}: {reason}")]
    PaymentNotReady { booking_id: String, reason: String },

    #[error("Invalid transition for {entity} {id}: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        from: String,
        to: String,
    },

    #[error("Refund window expired for payment {payment_id}: {message}")]
    RefundWindowExpired { payment_id: String, message: String },

    #[error("Payment gateway timed out after {timeout_ms}ms during {operation}")]
    GatewayTimeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("{entity} already exists: {key}")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("Tenant slug is locked by existing bookings: {0}")]
    SlugLocked(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl BookingError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        BookingError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        BookingError::Validation(message.into())
    }

    pub fn invalid_transition(
        entity: &'static str,
        id: impl Into<String>,
        from: impl std::fmt::Display,
        to: impl std::fmt::Display,
    ) -> Self {
        BookingError::InvalidTransition {
            entity,
            id: id.into(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// 错误码（跨边界传递，调用方负责本地化）
    pub fn code(&self) -> ErrorCode {
        match self {
            BookingError::InvalidRange { .. } => ErrorCode::InvalidRange,
            BookingError::NotFound { .. } => ErrorCode::NotFound,
            BookingError::ResourceNotFound(_) => ErrorCode::ResourceNotFound,
            BookingError::ServiceInactive(_) => ErrorCode::ServiceInactive,
            BookingError::ResourceInactive(_) => ErrorCode::ResourceInactive,
            BookingError::SlotConflict { .. } => ErrorCode::SlotConflict,
            BookingError::PaymentNotReady { .. } => ErrorCode::PaymentNotReady,
            BookingError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            BookingError::RefundWindowExpired { .. } => ErrorCode::RefundWindowExpired,
            BookingError::GatewayTimeout { .. } => ErrorCode::GatewayTimeout,
            BookingError::Gateway(_) => ErrorCode::GatewayError,
            BookingError::Validation(_) => ErrorCode::ValidationFailed,
            BookingError::InvalidAmount(_) => ErrorCode::InvalidAmount,
            BookingError::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            BookingError::SlugLocked(_) => ErrorCode::SlugLocked,
            BookingError::Storage(e) => {
                tracing::error!(error = %e, "Storage error occurred");
                ErrorCode::StorageError
            }
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
