//! Payment Model

use serde::{Deserialize, Serialize};

/// Payment status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Authorized (or being authorized), not captured yet
    #[default]
    RequiresAction,
    Succeeded,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    /// Payment still holds (or may hold) customer funds
    pub fn is_live(&self) -> bool {
        matches!(self, PaymentStatus::RequiresAction | PaymentStatus::Succeeded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::RequiresAction => "requires_action",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment method
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Cash,
    BankTransfer,
    Wallet,
}

/// How funds are captured after authorization
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMethod {
    /// Gateway captures at authorize time
    #[default]
    Automatic,
    /// Capture is an explicit caller action
    Manual,
}

/// Payment entity - 1:1 with its booking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub booking_id: String,
    pub tenant_id: String,
    pub customer_id: String,
    /// Gross amount charged to the customer
    pub amount_cents: i64,
    /// Platform cut, metadata only (not deducted from `amount_cents`)
    pub platform_fee_cents: i64,
    /// Basis points used to compute `platform_fee_cents`
    pub fee_bps: u32,
    pub method: PaymentMethod,
    pub capture_method: CaptureMethod,
    pub status: PaymentStatus,
    /// External gateway reference, opaque to the engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// An authorize call got no answer; the provider may hold a charge
    /// under this payment's idempotency key
    #[serde(default)]
    pub authorization_unconfirmed: bool,
    pub created_at: i64,
    pub updated_at: i64,
}
