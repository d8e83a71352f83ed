//! Event Queue - 领域事件出站队列
//!
//! 引擎不负责通知投递，只把领域事件放进有界队列，由外部消费者处理。
//!
//! ```text
//! BookingsManager ─┐
//!                  ├── EventQueue (mpsc, bounded) ──► EventReceiver (notification collaborator)
//! PaymentOrchestrator ┘
//! ```
//!
//! ## 策略
//!
//! Best-effort：`try_send`，满则丢弃并告警，绝不阻塞或使业务操作失败。

use shared::event::DomainEvent;
use std::sync::Arc;
use tokio::sync::mpsc;

/// 事件消费端
pub type EventReceiver = mpsc::Receiver<Arc<DomainEvent>>;

/// 事件生产端 (可克隆，各组件共享)
#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::Sender<Arc<DomainEvent>>,
}

impl EventQueue {
    /// 创建队列和消费端
    pub fn new(capacity: usize) -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// 入队事件 (best-effort)
    pub fn publish(&self, event: DomainEvent) {
        match self.tx.try_send(Arc::new(event)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    tenant_id = %event.tenant_id,
                    event_type = %event.event_type,
                    "Event queue full, event dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::debug!(event_type = %event.event_type, "Event queue closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::event::{DomainEventType, EventPayload};

    fn payment_failed(id: &str) -> DomainEvent {
        DomainEvent::new(
            "tenant-1",
            DomainEventType::PaymentFailed,
            EventPayload::PaymentFailed {
                payment_id: id.to_string(),
                booking_id: "bk-1".to_string(),
                reason: "declined".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_publish_and_receive() {
        let (queue, mut rx) = EventQueue::new(4);
        queue.publish(payment_failed("pay-1"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, DomainEventType::PaymentFailed);
        assert_eq!(event.tenant_id, "tenant-1");
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let (queue, mut rx) = EventQueue::new(1);
        queue.publish(payment_failed("pay-1"));
        queue.publish(payment_failed("pay-2"));

        let first = rx.recv().await.unwrap();
        match &first.payload {
            EventPayload::PaymentFailed { payment_id, .. } => assert_eq!(payment_id, "pay-1"),
            other => panic!("unexpected payload: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_queue_is_ignored() {
        let (queue, rx) = EventQueue::new(1);
        drop(rx);
        queue.publish(payment_failed("pay-1"));
    }
}
