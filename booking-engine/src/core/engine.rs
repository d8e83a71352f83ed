use crate::bookings::BookingsManager;
use crate::calendar::ResourceCalendar;
use crate::core::{BookingResult, EngineConfig};
use crate::notify::{EventQueue, EventReceiver};
use crate::payments::{PaymentGateway, PaymentOrchestrator};
use crate::registry::Registry;
use crate::storage::{BookingStorage, StorageError, StorageStats};
use crate::utils::KeyedLocks;
use std::sync::Arc;

/// 引擎 - 持有所有组件的共享引用
///
/// 使用 Arc 实现浅拷贝，可在任意任务间克隆共享。
///
/// # 组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | registry | Arc<Registry> | 租户 / 服务 / 资源 |
/// | calendar | Arc<ResourceCalendar> | 占用查询、可用时段 |
/// | bookings | Arc<BookingsManager> | 预约状态机 |
/// | payments | Arc<PaymentOrchestrator> | 支付编排 |
///
/// 资源锁和支付锁在 bookings 与 payments 之间共享，保证锁顺序一致。
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    storage: BookingStorage,
    registry: Arc<Registry>,
    calendar: Arc<ResourceCalendar>,
    bookings: Arc<BookingsManager>,
    payments: Arc<PaymentOrchestrator>,
    resource_locks: Arc<KeyedLocks>,
    payment_locks: Arc<KeyedLocks>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("storage", &"<BookingStorage>")
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// 装配所有组件，返回引擎和领域事件消费端
    pub fn new(
        storage: BookingStorage,
        gateway: Arc<dyn PaymentGateway>,
        config: EngineConfig,
    ) -> (Self, EventReceiver) {
        let (events, receiver) = EventQueue::new(config.event_queue_capacity);
        let resource_locks = Arc::new(KeyedLocks::new());
        let payment_locks = Arc::new(KeyedLocks::new());

        let registry = Arc::new(Registry::new(storage.clone()));
        let calendar = Arc::new(ResourceCalendar::new(
            storage.clone(),
            registry.clone(),
            config.slot_granularity_minutes,
        ));
        let payments = Arc::new(PaymentOrchestrator::new(
            storage.clone(),
            registry.clone(),
            gateway,
            events.clone(),
            resource_locks.clone(),
            payment_locks.clone(),
            &config,
        ));
        let bookings = Arc::new(BookingsManager::new(
            storage.clone(),
            registry.clone(),
            payments.clone(),
            events,
            resource_locks.clone(),
            payment_locks.clone(),
        ));

        tracing::info!(
            platform_fee_bps = config.platform_fee_bps,
            manual_capture = config.manual_capture_enabled,
            slot_granularity_minutes = ?config.slot_granularity_minutes,
            gateway_timeout_ms = config.gateway_timeout_ms,
            "Booking engine ready"
        );

        let engine = Self {
            config,
            storage,
            registry,
            calendar,
            bookings,
            payments,
            resource_locks,
            payment_locks,
        };
        (engine, receiver)
    }

    /// 打开 `data_dir` 下的数据库并装配引擎
    pub fn open(
        config: EngineConfig,
        gateway: Arc<dyn PaymentGateway>,
    ) -> BookingResult<(Self, EventReceiver)> {
        std::fs::create_dir_all(&config.data_dir).map_err(StorageError::from)?;
        let path = config.database_path();
        tracing::info!(path = %path.display(), "Opening booking database");
        let storage = BookingStorage::open(&path)?;
        Ok(Self::new(storage, gateway, config))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn calendar(&self) -> &ResourceCalendar {
        &self.calendar
    }

    pub fn bookings(&self) -> &BookingsManager {
        &self.bookings
    }

    pub fn payments(&self) -> &PaymentOrchestrator {
        &self.payments
    }

    pub fn stats(&self) -> BookingResult<StorageStats> {
        Ok(self.storage.get_stats()?)
    }

    /// Resource and payment keys currently locked or waited on
    pub fn active_locks(&self) -> usize {
        self.resource_locks.len() + self.payment_locks.len()
    }
}
