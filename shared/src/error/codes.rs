//! Unified error codes for the booking engine
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 3xxx: Tenant / catalog errors
//! - 4xxx: Booking errors
//! - 5xxx: Payment errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Entity not found
    NotFound = 3,
    /// Entity already exists
    AlreadyExists = 4,
    /// Time range is empty or inverted
    InvalidRange = 5,

    // ==================== 3xxx: Tenant / catalog ====================
    /// Resource not found
    ResourceNotFound = 3001,
    /// Service is deactivated
    ServiceInactive = 3002,
    /// Resource is deactivated
    ResourceInactive = 3003,
    /// Tenant slug can no longer change
    SlugLocked = 3004,

    // ==================== 4xxx: Booking ====================
    /// Requested range overlaps an active booking
    SlotConflict = 4001,
    /// Booking status does not allow the transition
    InvalidTransition = 4002,
    /// Booking needs a captured payment first
    PaymentNotReady = 4003,

    // ==================== 5xxx: Payment ====================
    /// Amount is negative or overflows
    InvalidAmount = 5001,
    /// Gateway refused the refund for timing reasons
    RefundWindowExpired = 5002,
    /// Gateway did not answer in time
    GatewayTimeout = 5003,
    /// Gateway reported a failure
    GatewayError = 5004,

    // ==================== 9xxx: System ====================
    /// Internal error
    InternalError = 9001,
    /// Storage error (redb / serialization)
    StorageError = 9401,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Whether a caller may retry the same request unchanged
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::GatewayTimeout | ErrorCode::GatewayError | ErrorCode::StorageError
        )
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Entity not found",
            ErrorCode::AlreadyExists => "Entity already exists",
            ErrorCode::InvalidRange => "Time range end must be after start",

            ErrorCode::ResourceNotFound => "Resource not found",
            ErrorCode::ServiceInactive => "Service is not active",
            ErrorCode::ResourceInactive => "Resource is not active",
            ErrorCode::SlugLocked => "Tenant slug is referenced by bookings",

            ErrorCode::SlotConflict => "Time slot is already booked",
            ErrorCode::InvalidTransition => "Booking status does not allow this operation",
            ErrorCode::PaymentNotReady => "Payment has not been captured",

            ErrorCode::InvalidAmount => "Invalid amount",
            ErrorCode::RefundWindowExpired => "Refund window has expired",
            ErrorCode::GatewayTimeout => "Payment gateway timed out",
            ErrorCode::GatewayError => "Payment gateway error",

            ErrorCode::InternalError => "Internal server error",
            ErrorCode::StorageError => "Storage error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRange),

            3001 => Ok(ErrorCode::ResourceNotFound),
            3002 => Ok(ErrorCode::ServiceInactive),
            3003 => Ok(ErrorCode::ResourceInactive),
            3004 => Ok(ErrorCode::SlugLocked),

            4001 => Ok(ErrorCode::SlotConflict),
            4002 => Ok(ErrorCode::InvalidTransition),
            4003 => Ok(ErrorCode::PaymentNotReady),

            5001 => Ok(ErrorCode::InvalidAmount),
            5002 => Ok(ErrorCode::RefundWindowExpired),
            5003 => Ok(ErrorCode::GatewayTimeout),
            5004 => Ok(ErrorCode::GatewayError),

            9001 => Ok(ErrorCode::InternalError),
            9401 => Ok(ErrorCode::StorageError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::InvalidRange.code(), 5);
        assert_eq!(ErrorCode::ResourceNotFound.code(), 3001);
        assert_eq!(ErrorCode::SlotConflict.code(), 4001);
        assert_eq!(ErrorCode::RefundWindowExpired.code(), 5002);
        assert_eq!(ErrorCode::StorageError.code(), 9401);
    }

    #[test]
    fn test_try_from_valid() {
        assert_eq!(ErrorCode::try_from(0), Ok(ErrorCode::Success));
        assert_eq!(ErrorCode::try_from(4002), Ok(ErrorCode::InvalidTransition));
        assert_eq!(ErrorCode::try_from(5003), Ok(ErrorCode::GatewayTimeout));
    }

    #[test]
    fn test_try_from_invalid() {
        assert_eq!(ErrorCode::try_from(999), Err(InvalidErrorCode(999)));
        assert_eq!(ErrorCode::try_from(4999), Err(InvalidErrorCode(4999)));
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&ErrorCode::SlotConflict).unwrap();
        assert_eq!(json, "4001");

        let code: ErrorCode = serde_json::from_str("5002").unwrap();
        assert_eq!(code, ErrorCode::RefundWindowExpired);

        let result: Result<ErrorCode, _> = serde_json::from_str("10000");
        assert!(result.is_err());
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorCode::GatewayTimeout.is_retryable());
        assert!(!ErrorCode::SlotConflict.is_retryable());
        assert!(!ErrorCode::RefundWindowExpired.is_retryable());
    }

    #[test]
    fn test_display_and_message() {
        assert_eq!(format!("{}", ErrorCode::PaymentNotReady), "4003");
        assert_eq!(ErrorCode::SlotConflict.message(), "Time slot is already booked");
        assert_eq!(
            format!("{}", InvalidErrorCode(7)),
            "invalid error code: 7"
        );
    }
}
