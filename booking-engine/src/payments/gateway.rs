//! Payment gateway capability
//!
//! The engine treats the provider as an opaque, possibly slow, possibly
//! failing remote service. Retries are the provider's business; every call
//! made by the engine is bounded by the configured gateway timeout.

use async_trait::async_trait;
use shared::models::PaymentMethod;
use thiserror::Error;

/// Gateway failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// Provider refused the charge (insufficient funds, fraud checks, ...)
    Declined,
    /// Refund or void requested outside the provider's allowed window
    RefundWindowExpired,
    /// Provider temporarily unreachable
    Unavailable,
    Other,
}

impl std::fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayErrorKind::Declined => write!(f, "declined"),
            GatewayErrorKind::RefundWindowExpired => write!(f, "refund window expired"),
            GatewayErrorKind::Unavailable => write!(f, "unavailable"),
            GatewayErrorKind::Other => write!(f, "error"),
        }
    }
}

/// Error reported by a payment gateway
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    pub message: String,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn declined(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Declined, message)
    }
}

/// Who the charge is for, forwarded to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: String,
    pub tenant_slug: String,
    pub booking_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeRequest {
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub tenant: TenantContext,
    /// Automatic capture: the provider captures funds at authorize time
    pub capture_immediately: bool,
    /// Stable per payment so provider-side retries do not double charge
    pub idempotency_key: String,
}

/// External payment provider
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Returns the provider's payment reference
    async fn authorize(&self, request: &AuthorizeRequest) -> Result<String, GatewayError>;

    async fn capture(&self, provider_payment_id: &str) -> Result<(), GatewayError>;

    async fn refund(&self, provider_payment_id: &str) -> Result<(), GatewayError>;

    /// Release an uncaptured authorization
    ///
    /// Providers without a dedicated void call fall back to a refund.
    async fn void(&self, provider_payment_id: &str) -> Result<(), GatewayError> {
        self.refund(provider_payment_id).await
    }
}
