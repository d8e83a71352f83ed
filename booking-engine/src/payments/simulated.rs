//! In-process payment gateway
//!
//! Accepts every call unless a failure is scripted for the operation.
//! Records how many times each operation reached the "provider", which is
//! what idempotency checks care about. Authorizations are deduplicated by
//! idempotency key, and a reference is issued before the (optional) delay,
//! so a caller that times out leaves an authorization behind just like a
//! real provider would. Useful for local runs and tests.

use super::gateway::{AuthorizeRequest, GatewayError, PaymentGateway};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOperation {
    Authorize,
    Capture,
    Refund,
    Void,
}

#[derive(Debug, Default)]
pub struct SimulatedGateway {
    next_reference: AtomicU64,
    calls: Mutex<HashMap<GatewayOperation, usize>>,
    failures: Mutex<HashMap<GatewayOperation, GatewayError>>,
    delay: Mutex<Option<Duration>>,
    authorized: Mutex<Vec<AuthorizeRequest>>,
    /// idempotency_key -> provider reference
    references: Mutex<HashMap<String, String>>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every following call of `operation` fails with `error` until cleared
    pub fn fail(&self, operation: GatewayOperation, error: GatewayError) {
        self.failures.lock().insert(operation, error);
    }

    pub fn clear_failure(&self, operation: GatewayOperation) {
        self.failures.lock().remove(&operation);
    }

    /// Delay every call, e.g. to exceed the engine's gateway timeout
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    /// Number of calls of `operation` that reached the gateway
    pub fn calls(&self, operation: GatewayOperation) -> usize {
        self.calls.lock().get(&operation).copied().unwrap_or(0)
    }

    /// Authorization requests received, in order
    pub fn authorize_requests(&self) -> Vec<AuthorizeRequest> {
        self.authorized.lock().clone()
    }

    /// Reference issued for an idempotency key, if the provider holds one
    pub fn reference_for(&self, idempotency_key: &str) -> Option<String> {
        self.references.lock().get(idempotency_key).cloned()
    }

    async fn invoke(&self, operation: GatewayOperation) -> Result<(), GatewayError> {
        *self.calls.lock().entry(operation).or_insert(0) += 1;

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.failures.lock().get(&operation).cloned();
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn authorize(&self, request: &AuthorizeRequest) -> Result<String, GatewayError> {
        self.authorized.lock().push(request.clone());

        let reference = self
            .references
            .lock()
            .entry(request.idempotency_key.clone())
            .or_insert_with(|| {
                let n = self.next_reference.fetch_add(1, Ordering::Relaxed) + 1;
                format!("sim_pi_{n}")
            })
            .clone();

        // A rejected authorization leaves nothing held at the provider
        if let Err(error) = self.invoke(GatewayOperation::Authorize).await {
            self.references.lock().remove(&request.idempotency_key);
            return Err(error);
        }
        Ok(reference)
    }

    async fn capture(&self, _provider_payment_id: &str) -> Result<(), GatewayError> {
        self.invoke(GatewayOperation::Capture).await
    }

    async fn refund(&self, _provider_payment_id: &str) -> Result<(), GatewayError> {
        self.invoke(GatewayOperation::Refund).await
    }

    async fn void(&self, _provider_payment_id: &str) -> Result<(), GatewayError> {
        self.invoke(GatewayOperation::Void).await
    }
}
