//! Booking Engine - 多租户预约与支付编排引擎
//!
//! # 架构概述
//!
//! 租户拥有服务和资源；预约在资源上占用 `[start, end)` 时间段；
//! 可用时段由预约和营业时间推导；支付经历 授权 → 捕获 → 结算/退款。
//!
//! - **时间模型** (`slots`): 半开区间、候选时段生成、营业时间换算
//! - **注册表** (`registry`): 租户 / 服务 / 资源
//! - **资源日历** (`calendar`): 占用查询、可用时段
//! - **预约状态机** (`bookings`): 创建、确认、取消、完成、爽约、改期
//! - **支付编排** (`payments`): 授权、捕获、作废/退款、平台费
//! - **事件队列** (`notify`): 领域事件出站 (best-effort)
//! - **存储** (`storage`): 嵌入式 redb
//!
//! # 模块结构
//!
//! ```text
//! booking-engine/src/
//! ├── core/          # 配置、错误、引擎装配
//! ├── utils/         # 日志、校验、按 key 锁
//! ├── slots/         # 时间与时段模型
//! ├── registry/      # 租户/服务/资源
//! ├── calendar/      # 资源日历
//! ├── bookings/      # 预约状态机
//! ├── payments/      # 支付编排
//! ├── notify/        # 事件队列
//! └── storage.rs     # redb 持久化
//! ```

pub mod bookings;
pub mod calendar;
pub mod core;
pub mod notify;
pub mod payments;
pub mod registry;
pub mod slots;
pub mod storage;
pub mod utils;

// Re-export 公共类型
pub use bookings::{BookingsManager, CreateBooking, CreateOutcome};
pub use calendar::{Availability, ResourceCalendar};
pub use core::{BookingError, BookingResult, Engine, EngineConfig};
pub use notify::{EventQueue, EventReceiver};
pub use payments::{
    AuthorizeRequest, GatewayError, GatewayErrorKind, PaymentGateway, PaymentOrchestrator,
    SimulatedGateway, TenantContext, compute_fee,
};
pub use registry::Registry;
pub use slots::{AvailabilitySlot, SlotWindows, TimeRange, ranges_overlap, working_windows};
pub use storage::{BookingStorage, StorageError};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_from_config, init_logger_with_file};
