//! PaymentOrchestrator - authorize → capture → settle / refund
//!
//! # Flow
//!
//! ```text
//! authorize(booking)
//!     ├─ 1. resource lock: booking must be pending, reuse a live payment
//!     ├─ 2. persist Payment(requires_action) + link to booking
//!     ├─ 3. payment lock: gateway.authorize (bounded by timeout)
//!     └─ 4. store provider reference, mark failed on rejection,
//!           or keep it live as unconfirmed on timeout
//!
//! capture(payment)        requires_action ─► succeeded | failed
//! void_or_refund(payment) requires_action | succeeded ─► cancelled
//! ```
//!
//! Every call on one payment runs under that payment's lock. Callers that
//! also hold a resource lock take it first.

use super::fee::compute_fee;
use super::gateway::{AuthorizeRequest, GatewayError, GatewayErrorKind, PaymentGateway, TenantContext};
use crate::core::{BookingError, BookingResult, EngineConfig};
use crate::notify::EventQueue;
use crate::registry::Registry;
use crate::storage::BookingStorage;
use crate::utils::KeyedLocks;
use shared::event::{DomainEvent, DomainEventType, EventPayload};
use shared::models::{BookingStatus, CaptureMethod, Payment, PaymentMethod, PaymentStatus, Tenant};
use shared::util::{new_id, now_millis};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub struct PaymentOrchestrator {
    storage: BookingStorage,
    registry: Arc<Registry>,
    gateway: Arc<dyn PaymentGateway>,
    events: EventQueue,
    resource_locks: Arc<KeyedLocks>,
    payment_locks: Arc<KeyedLocks>,
    fee_bps: u32,
    capture_method: CaptureMethod,
    gateway_timeout: Duration,
}

impl std::fmt::Debug for PaymentOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentOrchestrator")
            .field("fee_bps", &self.fee_bps)
            .field("capture_method", &self.capture_method)
            .field("gateway_timeout", &self.gateway_timeout)
            .finish_non_exhaustive()
    }
}

impl PaymentOrchestrator {
    pub fn new(
        storage: BookingStorage,
        registry: Arc<Registry>,
        gateway: Arc<dyn PaymentGateway>,
        events: EventQueue,
        resource_locks: Arc<KeyedLocks>,
        payment_locks: Arc<KeyedLocks>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            storage,
            registry,
            gateway,
            events,
            resource_locks,
            payment_locks,
            fee_bps: config.platform_fee_bps,
            capture_method: config.capture_method(),
            gateway_timeout: config.gateway_timeout(),
        }
    }

    pub fn get(&self, payment_id: &str) -> BookingResult<Payment> {
        self.storage
            .get_payment(payment_id)?
            .ok_or_else(|| BookingError::not_found("payment", payment_id))
    }

    /// The payment currently linked to a booking, if any
    pub fn get_for_booking(&self, booking_id: &str) -> BookingResult<Option<Payment>> {
        let booking = self
            .storage
            .get_booking(booking_id)?
            .ok_or_else(|| BookingError::not_found("booking", booking_id))?;
        match booking.payment_id {
            Some(payment_id) => Ok(self.storage.get_payment(&payment_id)?),
            None => Ok(None),
        }
    }

    /// Authorize a payment for a pending booking
    ///
    /// A booking has at most one live payment: if one already exists and
    /// the provider confirmed it, it is returned and the gateway is not
    /// called again. A live payment whose authorization timed out is sent
    /// again under the same idempotency key, so the provider can never
    /// charge twice for one booking.
    pub async fn authorize(
        &self,
        booking_id: &str,
        amount_cents: i64,
        method: PaymentMethod,
    ) -> BookingResult<Payment> {
        if amount_cents < 0 {
            return Err(BookingError::InvalidAmount(format!(
                "amount must be >= 0, got {amount_cents}"
            )));
        }

        let booking = self
            .storage
            .get_booking(booking_id)?
            .ok_or_else(|| BookingError::not_found("booking", booking_id))?;
        let tenant = self.registry.tenant(&booking.tenant_id)?;

        // 1-2. Create (or pick up) the payment under the resource lock
        let payment_id = {
            let _resource_guard = self.resource_locks.lock(&booking.resource_id).await;

            let txn = self.storage.begin_write()?;
            let mut booking = self
                .storage
                .get_booking_txn(&txn, booking_id)?
                .ok_or_else(|| BookingError::not_found("booking", booking_id))?;
            if booking.status != BookingStatus::Pending {
                return Err(BookingError::invalid_transition(
                    "booking",
                    booking_id,
                    booking.status,
                    "payment_authorized",
                ));
            }
            let existing = match &booking.payment_id {
                Some(existing_id) => self.storage.get_payment_txn(&txn, existing_id)?,
                None => None,
            };
            match existing {
                Some(existing)
                    if existing.status == PaymentStatus::RequiresAction
                        && existing.provider_payment_id.is_none() =>
                {
                    tracing::info!(booking_id = %booking_id, payment_id = %existing.id, "Retrying unconfirmed authorization");
                    existing.id
                }
                Some(existing) if existing.status.is_live() => {
                    tracing::debug!(booking_id = %booking_id, payment_id = %existing.id, "Booking already has a live payment");
                    return Ok(existing);
                }
                _ => {
                    let now = now_millis();
                    let payment = Payment {
                        id: new_id(),
                        booking_id: booking.id.clone(),
                        tenant_id: booking.tenant_id.clone(),
                        customer_id: booking.customer_id.clone(),
                        amount_cents,
                        platform_fee_cents: compute_fee(amount_cents, self.fee_bps),
                        fee_bps: self.fee_bps,
                        method,
                        capture_method: self.capture_method,
                        status: PaymentStatus::RequiresAction,
                        provider_payment_id: None,
                        failure_reason: None,
                        authorization_unconfirmed: false,
                        created_at: now,
                        updated_at: now,
                    };
                    booking.payment_id = Some(payment.id.clone());
                    booking.updated_at = now;
                    self.storage.put_payment(&txn, &payment)?;
                    self.storage.put_booking(&txn, &booking)?;
                    self.storage.commit(txn)?;
                    payment.id
                }
            }
        };

        // 3-4. Talk to the gateway under the payment lock only
        let _payment_guard = self.payment_locks.lock(&payment_id).await;
        let mut payment = self.get(&payment_id)?;
        if payment.status != PaymentStatus::RequiresAction {
            // Voided or failed while we were waiting for the lock
            return Err(BookingError::invalid_transition(
                "payment",
                &payment.id,
                payment.status,
                "authorized",
            ));
        }
        if payment.provider_payment_id.is_some() {
            // A concurrent caller got the answer first
            return Ok(payment);
        }

        let request = authorize_request(&payment, &tenant);
        tracing::info!(
            payment_id = %payment.id,
            booking_id = %booking_id,
            amount_cents = payment.amount_cents,
            platform_fee_cents = payment.platform_fee_cents,
            retry = payment.authorization_unconfirmed,
            "Authorizing payment"
        );
        match self.call_gateway("authorize", self.gateway.authorize(&request)).await {
            Ok(Ok(provider_payment_id)) => {
                payment.provider_payment_id = Some(provider_payment_id);
                payment.authorization_unconfirmed = false;
                payment.updated_at = now_millis();
                self.storage.save_payment(&payment)?;
                tracing::info!(payment_id = %payment.id, "Payment authorized");
                Ok(payment)
            }
            Ok(Err(error)) => {
                self.mark_failed(&mut payment, &error.message)?;
                Err(BookingError::Gateway(error))
            }
            Err(timeout) => {
                // The provider may have accepted it: stay live, retry with the same key
                payment.authorization_unconfirmed = true;
                payment.updated_at = now_millis();
                self.storage.save_payment(&payment)?;
                Err(timeout)
            }
        }
    }

    /// Capture an authorized payment
    ///
    /// Idempotent: a succeeded payment is returned without calling the
    /// gateway. With automatic capture the funds were taken at authorize
    /// time and this only records the success.
    pub async fn capture(&self, payment_id: &str) -> BookingResult<Payment> {
        let _payment_guard = self.payment_locks.lock(payment_id).await;
        let mut payment = self.get(payment_id)?;

        match payment.status {
            PaymentStatus::Succeeded => return Ok(payment),
            PaymentStatus::Failed | PaymentStatus::Cancelled => {
                return Err(BookingError::invalid_transition(
                    "payment",
                    payment_id,
                    payment.status,
                    PaymentStatus::Succeeded,
                ));
            }
            PaymentStatus::RequiresAction => {}
        }

        let Some(provider_payment_id) = payment.provider_payment_id.clone() else {
            return Err(BookingError::invalid_transition(
                "payment",
                payment_id,
                "unauthorized",
                PaymentStatus::Succeeded,
            ));
        };

        if payment.capture_method == CaptureMethod::Manual {
            match self
                .call_gateway("capture", self.gateway.capture(&provider_payment_id))
                .await?
            {
                Ok(()) => {}
                Err(error) => {
                    self.mark_failed(&mut payment, &error.message)?;
                    return Err(BookingError::Gateway(error));
                }
            }
        }

        payment.status = PaymentStatus::Succeeded;
        payment.updated_at = now_millis();
        self.storage.save_payment(&payment)?;

        tracing::info!(payment_id = %payment_id, capture_method = ?payment.capture_method, "Payment captured");
        self.events.publish(DomainEvent::new(
            &payment.tenant_id,
            DomainEventType::PaymentSucceeded,
            EventPayload::PaymentSucceeded {
                payment_id: payment.id.clone(),
                booking_id: payment.booking_id.clone(),
                amount_cents: payment.amount_cents,
                platform_fee_cents: payment.platform_fee_cents,
            },
        ));
        Ok(payment)
    }

    /// Release an authorization or refund captured funds
    ///
    /// The payment is left untouched when the gateway refuses or times out.
    pub async fn void_or_refund(&self, payment_id: &str) -> BookingResult<Payment> {
        self.release(payment_id, false).await
    }

    /// Settle a booking's payment before the booking is cancelled
    ///
    /// Same as [`Self::void_or_refund`], except that a payment which already
    /// failed is returned as is: there is nothing left to release.
    pub(crate) async fn release_for_cancellation(&self, payment_id: &str) -> BookingResult<Payment> {
        self.release(payment_id, true).await
    }

    async fn release(&self, payment_id: &str, failed_is_settled: bool) -> BookingResult<Payment> {
        let _payment_guard = self.payment_locks.lock(payment_id).await;
        let mut payment = self.get(payment_id)?;

        match payment.status {
            PaymentStatus::Cancelled => return Ok(payment),
            PaymentStatus::Failed if failed_is_settled => return Ok(payment),
            PaymentStatus::Failed => {
                return Err(BookingError::invalid_transition(
                    "payment",
                    payment_id,
                    payment.status,
                    PaymentStatus::Cancelled,
                ));
            }
            PaymentStatus::RequiresAction | PaymentStatus::Succeeded => {}
        }

        let reference = match payment.provider_payment_id.clone() {
            Some(reference) => Some(reference),
            None if payment.authorization_unconfirmed => self.confirm_reference(&mut payment).await?,
            // Never reached the provider: nothing to release
            None => None,
        };

        let refunded = match reference {
            None => false,
            Some(reference)
                if payment.status == PaymentStatus::RequiresAction
                    && payment.capture_method == CaptureMethod::Manual =>
            {
                let result = self.call_gateway("void", self.gateway.void(&reference)).await?;
                self.settlement_result(payment_id, result)?;
                false
            }
            Some(reference) => {
                let result = self
                    .call_gateway("refund", self.gateway.refund(&reference))
                    .await?;
                self.settlement_result(payment_id, result)?;
                true
            }
        };

        payment.status = PaymentStatus::Cancelled;
        payment.updated_at = now_millis();
        self.storage.save_payment(&payment)?;

        tracing::info!(payment_id = %payment_id, refunded, "Payment cancelled");
        self.events.publish(DomainEvent::new(
            &payment.tenant_id,
            DomainEventType::PaymentCancelled,
            EventPayload::PaymentCancelled {
                payment_id: payment.id.clone(),
                booking_id: payment.booking_id.clone(),
                refunded,
            },
        ));
        Ok(payment)
    }

    /// Ask the provider for the reference of a timed-out authorization
    ///
    /// Re-sends the original request under the same idempotency key. A
    /// decline means the provider holds nothing; any other failure leaves
    /// the payment untouched.
    async fn confirm_reference(&self, payment: &mut Payment) -> BookingResult<Option<String>> {
        let tenant = self.registry.tenant(&payment.tenant_id)?;
        let request = authorize_request(payment, &tenant);
        tracing::info!(payment_id = %payment.id, "Confirming unconfirmed authorization before release");

        match self.call_gateway("authorize", self.gateway.authorize(&request)).await? {
            Ok(reference) => {
                payment.provider_payment_id = Some(reference.clone());
                payment.authorization_unconfirmed = false;
                payment.updated_at = now_millis();
                self.storage.save_payment(payment)?;
                Ok(Some(reference))
            }
            Err(error) if error.kind == GatewayErrorKind::Declined => {
                tracing::info!(payment_id = %payment.id, error = %error, "Provider holds no authorization");
                Ok(None)
            }
            Err(error) => {
                tracing::warn!(payment_id = %payment.id, error = %error, "Could not confirm authorization");
                Err(BookingError::Gateway(error))
            }
        }
    }

    fn settlement_result(
        &self,
        payment_id: &str,
        result: Result<(), GatewayError>,
    ) -> BookingResult<()> {
        match result {
            Ok(()) => Ok(()),
            Err(error) if error.kind == GatewayErrorKind::RefundWindowExpired => {
                tracing::warn!(payment_id = %payment_id, error = %error, "Refund window expired");
                Err(BookingError::RefundWindowExpired {
                    payment_id: payment_id.to_string(),
                    message: error.message,
                })
            }
            Err(error) => {
                tracing::warn!(payment_id = %payment_id, error = %error, "Gateway rejected void/refund");
                Err(BookingError::Gateway(error))
            }
        }
    }

    fn mark_failed(&self, payment: &mut Payment, reason: &str) -> BookingResult<()> {
        payment.status = PaymentStatus::Failed;
        payment.failure_reason = Some(reason.to_string());
        payment.authorization_unconfirmed = false;
        payment.updated_at = now_millis();
        self.storage.save_payment(payment)?;

        tracing::warn!(payment_id = %payment.id, reason = %reason, "Payment failed");
        self.events.publish(DomainEvent::new(
            &payment.tenant_id,
            DomainEventType::PaymentFailed,
            EventPayload::PaymentFailed {
                payment_id: payment.id.clone(),
                booking_id: payment.booking_id.clone(),
                reason: reason.to_string(),
            },
        ));
        Ok(())
    }

    /// Bound a gateway call by the configured timeout
    ///
    /// Outer error: timeout. Inner result: the gateway's own answer.
    async fn call_gateway<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, GatewayError>>,
    ) -> BookingResult<Result<T, GatewayError>> {
        match tokio::time::timeout(self.gateway_timeout, call).await {
            Ok(result) => Ok(result),
            Err(_) => {
                let timeout_ms = u64::try_from(self.gateway_timeout.as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(operation, timeout_ms, "Payment gateway timed out");
                Err(BookingError::GatewayTimeout {
                    operation,
                    timeout_ms,
                })
            }
        }
    }
}

/// The request for a payment's authorization, identical on every retry
fn authorize_request(payment: &Payment, tenant: &Tenant) -> AuthorizeRequest {
    AuthorizeRequest {
        amount_cents: payment.amount_cents,
        method: payment.method,
        tenant: TenantContext {
            tenant_id: tenant.id.clone(),
            tenant_slug: tenant.slug.clone(),
            booking_id: payment.booking_id.clone(),
        },
        capture_immediately: payment.capture_method == CaptureMethod::Automatic,
        idempotency_key: payment.id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::EventReceiver;
    use crate::payments::{GatewayOperation, SimulatedGateway};
    use serde_json::Map;
    use shared::models::{Booking, ServiceCreate, TenantCreate};

    struct Fixture {
        storage: BookingStorage,
        gateway: Arc<SimulatedGateway>,
        orchestrator: PaymentOrchestrator,
        events: EventReceiver,
        tenant_id: String,
    }

    fn fixture(config: EngineConfig) -> Fixture {
        let storage = BookingStorage::open_in_memory().unwrap();
        let registry = Arc::new(Registry::new(storage.clone()));
        let tenant = registry
            .create_tenant(TenantCreate {
                slug: "barber".to_string(),
                name: "Barber".to_string(),
                timezone: "UTC".to_string(),
                settings: Map::new(),
            })
            .unwrap();
        registry
            .create_service(
                &tenant.id,
                ServiceCreate {
                    slug: "cut".to_string(),
                    name: "Cut".to_string(),
                    duration_minutes: 30,
                    price_cents: 10_000,
                },
            )
            .unwrap();

        let gateway = Arc::new(SimulatedGateway::new());
        let (events, rx) = EventQueue::new(64);
        let orchestrator = PaymentOrchestrator::new(
            storage.clone(),
            registry,
            gateway.clone(),
            events,
            Arc::new(KeyedLocks::new()),
            Arc::new(KeyedLocks::new()),
            &config,
        );
        Fixture {
            storage,
            gateway,
            orchestrator,
            events: rx,
            tenant_id: tenant.id,
        }
    }

    fn insert_booking(fx: &Fixture, id: &str, status: BookingStatus) {
        let booking = Booking {
            id: id.to_string(),
            tenant_id: fx.tenant_id.clone(),
            customer_id: "customer-1".to_string(),
            service_id: "svc-1".to_string(),
            resource_id: "res-1".to_string(),
            start_at: 0,
            end_at: 1_800_000,
            status,
            client_generated_id: format!("key-{id}"),
            payment_required: true,
            payment_id: None,
            cancel_reason: None,
            created_at: 0,
            updated_at: 0,
        };
        let txn = fx.storage.begin_write().unwrap();
        fx.storage.put_booking(&txn, &booking).unwrap();
        txn.commit().unwrap();
    }

    #[tokio::test]
    async fn test_authorize_records_fee_and_links_booking() {
        let fx = fixture(EngineConfig::defaults().with_platform_fee_bps(100));
        insert_booking(&fx, "bk-1", BookingStatus::Pending);

        let payment = fx
            .orchestrator
            .authorize("bk-1", 10_000, PaymentMethod::Card)
            .await
            .unwrap();
        assert_eq!(payment.status, PaymentStatus::RequiresAction);
        assert_eq!(payment.amount_cents, 10_000);
        assert_eq!(payment.platform_fee_cents, 100);
        assert_eq!(payment.fee_bps, 100);
        assert!(payment.provider_payment_id.is_some());

        let linked = fx.orchestrator.get_for_booking("bk-1").unwrap().unwrap();
        assert_eq!(linked.id, payment.id);

        // Second authorize reuses the live payment
        let again = fx
            .orchestrator
            .authorize("bk-1", 10_000, PaymentMethod::Card)
            .await
            .unwrap();
        assert_eq!(again.id, payment.id);
        assert_eq!(fx.gateway.calls(GatewayOperation::Authorize), 1);

        let request = &fx.gateway.authorize_requests()[0];
        assert!(request.capture_immediately);
        assert_eq!(request.tenant.tenant_slug, "barber");
        assert_eq!(request.idempotency_key, payment.id);
    }

    #[tokio::test]
    async fn test_authorize_rejects_negative_amount_and_non_pending() {
        let fx = fixture(EngineConfig::defaults());
        insert_booking(&fx, "bk-1", BookingStatus::Pending);
        insert_booking(&fx, "bk-2", BookingStatus::Cancelled);

        assert!(matches!(
            fx.orchestrator.authorize("bk-1", -1, PaymentMethod::Card).await,
            Err(BookingError::InvalidAmount(_))
        ));
        assert!(matches!(
            fx.orchestrator.authorize("bk-2", 100, PaymentMethod::Card).await,
            Err(BookingError::InvalidTransition { .. })
        ));
        assert!(matches!(
            fx.orchestrator.authorize("missing", 100, PaymentMethod::Card).await,
            Err(BookingError::NotFound { entity: "booking", .. })
        ));
        assert_eq!(fx.gateway.calls(GatewayOperation::Authorize), 0);
    }

    #[tokio::test]
    async fn test_declined_authorize_marks_failed() {
        let mut fx = fixture(EngineConfig::defaults());
        insert_booking(&fx, "bk-1", BookingStatus::Pending);
        fx.gateway.fail(
            GatewayOperation::Authorize,
            GatewayError::declined("insufficient funds"),
        );

        let err = fx
            .orchestrator
            .authorize("bk-1", 500, PaymentMethod::Card)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Gateway(ref e) if e.kind == GatewayErrorKind::Declined));

        let payment = fx.orchestrator.get_for_booking("bk-1").unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.failure_reason.as_deref(), Some("insufficient funds"));

        let event = fx.events.recv().await.unwrap();
        assert_eq!(event.event_type, DomainEventType::PaymentFailed);

        // A failed payment is not live: a new attempt creates a fresh one
        fx.gateway.clear_failure(GatewayOperation::Authorize);
        let retry = fx
            .orchestrator
            .authorize("bk-1", 500, PaymentMethod::Card)
            .await
            .unwrap();
        assert_ne!(retry.id, payment.id);
    }

    #[tokio::test]
    async fn test_manual_capture_is_idempotent() {
        let fx = fixture(EngineConfig::defaults().with_manual_capture(true));
        insert_booking(&fx, "bk-1", BookingStatus::Pending);
        let payment = fx
            .orchestrator
            .authorize("bk-1", 2_000, PaymentMethod::Card)
            .await
            .unwrap();
        assert_eq!(payment.capture_method, CaptureMethod::Manual);
        assert!(!fx.gateway.authorize_requests()[0].capture_immediately);

        let captured = fx.orchestrator.capture(&payment.id).await.unwrap();
        assert_eq!(captured.status, PaymentStatus::Succeeded);
        let again = fx.orchestrator.capture(&payment.id).await.unwrap();
        assert_eq!(again.status, PaymentStatus::Succeeded);
        assert_eq!(fx.gateway.calls(GatewayOperation::Capture), 1);
    }

    #[tokio::test]
    async fn test_automatic_capture_skips_gateway() {
        let fx = fixture(EngineConfig::defaults());
        insert_booking(&fx, "bk-1", BookingStatus::Pending);
        let payment = fx
            .orchestrator
            .authorize("bk-1", 2_000, PaymentMethod::Wallet)
            .await
            .unwrap();

        let captured = fx.orchestrator.capture(&payment.id).await.unwrap();
        assert_eq!(captured.status, PaymentStatus::Succeeded);
        assert_eq!(fx.gateway.calls(GatewayOperation::Capture), 0);
    }

    #[tokio::test]
    async fn test_failed_capture_and_invalid_transitions() {
        let fx = fixture(EngineConfig::defaults().with_manual_capture(true));
        insert_booking(&fx, "bk-1", BookingStatus::Pending);
        let payment = fx
            .orchestrator
            .authorize("bk-1", 2_000, PaymentMethod::Card)
            .await
            .unwrap();

        fx.gateway
            .fail(GatewayOperation::Capture, GatewayError::declined("expired card"));
        assert!(matches!(
            fx.orchestrator.capture(&payment.id).await,
            Err(BookingError::Gateway(_))
        ));
        assert_eq!(
            fx.orchestrator.get(&payment.id).unwrap().status,
            PaymentStatus::Failed
        );

        assert!(matches!(
            fx.orchestrator.capture(&payment.id).await,
            Err(BookingError::InvalidTransition { .. })
        ));
        assert!(matches!(
            fx.orchestrator.void_or_refund(&payment.id).await,
            Err(BookingError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_void_manual_authorization() {
        let fx = fixture(EngineConfig::defaults().with_manual_capture(true));
        insert_booking(&fx, "bk-1", BookingStatus::Pending);
        let payment = fx
            .orchestrator
            .authorize("bk-1", 2_000, PaymentMethod::Card)
            .await
            .unwrap();

        let voided = fx.orchestrator.void_or_refund(&payment.id).await.unwrap();
        assert_eq!(voided.status, PaymentStatus::Cancelled);
        assert_eq!(fx.gateway.calls(GatewayOperation::Void), 1);
        assert_eq!(fx.gateway.calls(GatewayOperation::Refund), 0);

        // Already cancelled: unchanged, no gateway call
        fx.orchestrator.void_or_refund(&payment.id).await.unwrap();
        assert_eq!(fx.gateway.calls(GatewayOperation::Void), 1);
    }

    #[tokio::test]
    async fn test_refund_window_expired_leaves_payment_unchanged() {
        let fx = fixture(EngineConfig::defaults());
        insert_booking(&fx, "bk-1", BookingStatus::Pending);
        let payment = fx
            .orchestrator
            .authorize("bk-1", 2_000, PaymentMethod::Card)
            .await
            .unwrap();
        fx.orchestrator.capture(&payment.id).await.unwrap();

        fx.gateway.fail(
            GatewayOperation::Refund,
            GatewayError::new(GatewayErrorKind::RefundWindowExpired, "older than 180 days"),
        );
        assert!(matches!(
            fx.orchestrator.void_or_refund(&payment.id).await,
            Err(BookingError::RefundWindowExpired { .. })
        ));
        assert_eq!(
            fx.orchestrator.get(&payment.id).unwrap().status,
            PaymentStatus::Succeeded
        );

        fx.gateway.clear_failure(GatewayOperation::Refund);
        let refunded = fx.orchestrator.void_or_refund(&payment.id).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_gateway_timeout() {
        let fx = fixture(
            EngineConfig::defaults()
                .with_manual_capture(true)
                .with_gateway_timeout_ms(20),
        );
        insert_booking(&fx, "bk-1", BookingStatus::Pending);
        let payment = fx
            .orchestrator
            .authorize("bk-1", 2_000, PaymentMethod::Card)
            .await
            .unwrap();

        fx.gateway.set_delay(Some(Duration::from_millis(200)));
        assert!(matches!(
            fx.orchestrator.capture(&payment.id).await,
            Err(BookingError::GatewayTimeout { operation: "capture", .. })
        ));
        // Capture timeout leaves the payment as it was
        assert_eq!(
            fx.orchestrator.get(&payment.id).unwrap().status,
            PaymentStatus::RequiresAction
        );
    }

    #[tokio::test]
    async fn test_authorize_timeout_keeps_payment_live_for_retry() {
        let mut fx = fixture(EngineConfig::defaults().with_gateway_timeout_ms(20));
        insert_booking(&fx, "bk-1", BookingStatus::Pending);

        fx.gateway.set_delay(Some(Duration::from_millis(200)));
        assert!(matches!(
            fx.orchestrator.authorize("bk-1", 2_000, PaymentMethod::Card).await,
            Err(BookingError::GatewayTimeout { operation: "authorize", .. })
        ));
        let pending = fx.orchestrator.get_for_booking("bk-1").unwrap().unwrap();
        assert_eq!(pending.status, PaymentStatus::RequiresAction);
        assert!(pending.authorization_unconfirmed);
        assert_eq!(pending.provider_payment_id, None);
        assert!(fx.events.try_recv().is_err());

        fx.gateway.set_delay(None);
        let retried = fx
            .orchestrator
            .authorize("bk-1", 2_000, PaymentMethod::Card)
            .await
            .unwrap();
        assert_eq!(retried.id, pending.id);
        assert!(!retried.authorization_unconfirmed);
        assert_eq!(retried.provider_payment_id, fx.gateway.reference_for(&pending.id));

        let keys: Vec<String> = fx
            .gateway
            .authorize_requests()
            .into_iter()
            .map(|r| r.idempotency_key)
            .collect();
        assert_eq!(keys, vec![pending.id.clone(), pending.id.clone()]);

        // Confirmed now: no further gateway traffic
        fx.orchestrator
            .authorize("bk-1", 2_000, PaymentMethod::Card)
            .await
            .unwrap();
        assert_eq!(fx.gateway.calls(GatewayOperation::Authorize), 2);
    }

    #[tokio::test]
    async fn test_release_confirms_unconfirmed_authorization_first() {
        let fx = fixture(
            EngineConfig::defaults()
                .with_manual_capture(true)
                .with_gateway_timeout_ms(20),
        );
        insert_booking(&fx, "bk-1", BookingStatus::Pending);

        fx.gateway.set_delay(Some(Duration::from_millis(200)));
        assert!(
            fx.orchestrator
                .authorize("bk-1", 2_000, PaymentMethod::Card)
                .await
                .is_err()
        );
        let pending = fx.orchestrator.get_for_booking("bk-1").unwrap().unwrap();

        // Still unreachable: the release fails and changes nothing
        assert!(matches!(
            fx.orchestrator.void_or_refund(&pending.id).await,
            Err(BookingError::GatewayTimeout { operation: "authorize", .. })
        ));
        assert_eq!(fx.orchestrator.get(&pending.id).unwrap(), pending);

        fx.gateway.set_delay(None);
        let voided = fx.orchestrator.void_or_refund(&pending.id).await.unwrap();
        assert_eq!(voided.status, PaymentStatus::Cancelled);
        assert_eq!(voided.provider_payment_id, fx.gateway.reference_for(&pending.id));
        assert_eq!(fx.gateway.calls(GatewayOperation::Void), 1);
        assert_eq!(fx.gateway.calls(GatewayOperation::Refund), 0);
    }

    #[tokio::test]
    async fn test_release_of_declined_unconfirmed_authorization_is_local() {
        let fx = fixture(EngineConfig::defaults().with_gateway_timeout_ms(20));
        insert_booking(&fx, "bk-1", BookingStatus::Pending);

        fx.gateway.set_delay(Some(Duration::from_millis(200)));
        fx.gateway
            .fail(GatewayOperation::Authorize, GatewayError::declined("card blocked"));
        assert!(
            fx.orchestrator
                .authorize("bk-1", 2_000, PaymentMethod::Card)
                .await
                .is_err()
        );
        let pending = fx.orchestrator.get_for_booking("bk-1").unwrap().unwrap();
        assert!(pending.authorization_unconfirmed);

        fx.gateway.set_delay(None);
        let cancelled = fx.orchestrator.void_or_refund(&pending.id).await.unwrap();
        assert_eq!(cancelled.status, PaymentStatus::Cancelled);
        assert_eq!(cancelled.provider_payment_id, None);
        assert_eq!(fx.gateway.calls(GatewayOperation::Refund), 0);
        assert_eq!(fx.gateway.calls(GatewayOperation::Void), 0);
    }
}
