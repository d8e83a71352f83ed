//! 集成测试公共夹具
//!
//! 内存数据库 + 模拟网关，一个 UTC 租户，一个 09:00-10:00 营业的资源，
//! 一个免费服务和一个收费服务 (均 30 分钟)。

#![allow(dead_code)]

use booking_engine::payments::SimulatedGateway;
use booking_engine::{BookingStorage, CreateBooking, Engine, EngineConfig, EventReceiver, TimeRange};
use chrono::{NaiveTime, TimeZone, Utc};
use serde_json::Map;
use shared::models::{ResourceCreate, ServiceCreate, TenantCreate, WorkingHours};
use std::sync::Arc;

pub const MINUTE: i64 = 60_000;
pub const HOUR: i64 = 60 * MINUTE;

pub struct TestEngine {
    pub engine: Engine,
    pub gateway: Arc<SimulatedGateway>,
    pub events: EventReceiver,
    pub tenant_id: String,
    pub resource_id: String,
    pub free_service_id: String,
    pub paid_service_id: String,
}

/// 2030-01-07 00:00 UTC (Monday)
pub fn day_start() -> i64 {
    Utc.with_ymd_and_hms(2030, 1, 7, 0, 0, 0)
        .unwrap()
        .timestamp_millis()
}

pub fn day_range() -> TimeRange {
    TimeRange::new(day_start(), day_start() + 24 * HOUR).unwrap()
}

pub fn setup(config: EngineConfig) -> TestEngine {
    let gateway = Arc::new(SimulatedGateway::new());
    let storage = BookingStorage::open_in_memory().unwrap();
    let (engine, events) = Engine::new(storage, gateway.clone(), config);

    let registry = engine.registry();
    let tenant = registry
        .create_tenant(TenantCreate {
            slug: "studio".to_string(),
            name: "Studio".to_string(),
            timezone: "UTC".to_string(),
            settings: Map::new(),
        })
        .unwrap();
    let resource = registry
        .create_resource(
            &tenant.id,
            ResourceCreate {
                slug: "room-a".to_string(),
                name: "Room A".to_string(),
                working_hours: WorkingHours::every_day(
                    NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                    NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                ),
            },
        )
        .unwrap();
    let free = registry
        .create_service(
            &tenant.id,
            ServiceCreate {
                slug: "intro".to_string(),
                name: "Intro call".to_string(),
                duration_minutes: 30,
                price_cents: 0,
            },
        )
        .unwrap();
    let paid = registry
        .create_service(
            &tenant.id,
            ServiceCreate {
                slug: "session".to_string(),
                name: "Session".to_string(),
                duration_minutes: 30,
                price_cents: 4_000,
            },
        )
        .unwrap();

    TestEngine {
        engine,
        gateway,
        events,
        tenant_id: tenant.id,
        resource_id: resource.id,
        free_service_id: free.id,
        paid_service_id: paid.id,
    }
}

impl TestEngine {
    /// Booking request on the fixture resource, `offset` from the start of the test day
    pub fn request(&self, service_id: &str, offset: i64, length: i64, key: &str) -> CreateBooking {
        CreateBooking {
            tenant_id: self.tenant_id.clone(),
            customer_id: "customer-1".to_string(),
            service_id: service_id.to_string(),
            resource_id: self.resource_id.clone(),
            range: TimeRange::new(day_start() + offset, day_start() + offset + length).unwrap(),
            client_generated_id: key.to_string(),
        }
    }

    /// (start offset from the day start, is_available) for every slot of the day
    pub fn slots(&self, service_id: &str) -> Vec<(i64, bool)> {
        self.engine
            .calendar()
            .list_availability(&self.resource_id, service_id, day_range())
            .unwrap()
            .iter()
            .map(|slot| (slot.start_at - day_start(), slot.is_available))
            .collect()
    }

    pub fn drain_events(&mut self) -> Vec<shared::DomainEventType> {
        let mut types = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            types.push(event.event_type);
        }
        types
    }
}
