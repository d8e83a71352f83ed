//! Payment Capture Orchestrator
//!
//! - [`PaymentOrchestrator`] - authorize / capture / void-or-refund
//! - [`PaymentGateway`] - external provider capability
//! - [`compute_fee`] - platform fee in integer basis points

mod fee;
mod gateway;
mod orchestrator;
mod simulated;

pub use fee::compute_fee;
pub use gateway::{AuthorizeRequest, GatewayError, GatewayErrorKind, PaymentGateway, TenantContext};
pub use orchestrator::PaymentOrchestrator;
pub use simulated::{GatewayOperation, SimulatedGateway};
