use shared::models::CaptureMethod;
use std::path::PathBuf;
use std::time::Duration;

/// 平台费率上限 (100%)
const MAX_FEE_BPS: u32 = 10_000;

/// 引擎配置 - 预约与支付编排的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | PLATFORM_FEE_BPS | 100 | 平台费率 (基点, 100 = 1%) |
/// | MANUAL_CAPTURE_ENABLED | false | 是否手动扣款 (先授权后捕获) |
/// | SLOT_GRANULARITY_MINUTES | (未设置) | 时段步长，未设置或 0 表示使用服务时长 |
/// | GATEWAY_TIMEOUT_MS | 10000 | 支付网关调用超时(毫秒) |
/// | EVENT_QUEUE_CAPACITY | 1024 | 领域事件队列容量 |
/// | DATA_DIR | ./data | redb 数据目录 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (未设置) | 日志文件目录，未设置则只输出到终端 |
///
/// # 示例
///
/// ```ignore
/// PLATFORM_FEE_BPS=250 MANUAL_CAPTURE_ENABLED=true cargo run
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 平台费率 (基点)，仅作为元数据记录在支付上
    pub platform_fee_bps: u32,
    /// true: 授权后需显式 capture；false: 网关在授权时直接扣款
    pub manual_capture_enabled: bool,
    /// 可用时段步长 (分钟)，None 表示按服务时长步进
    pub slot_granularity_minutes: Option<u32>,
    /// 支付网关调用超时 (毫秒)
    pub gateway_timeout_ms: u64,
    /// 领域事件队列容量 (满则丢弃)
    pub event_queue_capacity: usize,
    /// 数据目录
    pub data_dir: String,
    pub log_level: String,
    pub log_dir: Option<String>,
}

impl EngineConfig {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置或无法解析，使用默认值
    pub fn from_env() -> Self {
        let defaults = Self::defaults();
        Self {
            platform_fee_bps: std::env::var("PLATFORM_FEE_BPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|bps| {
                    let ok = *bps <= MAX_FEE_BPS;
                    if !ok {
                        tracing::warn!(bps, "PLATFORM_FEE_BPS exceeds 10000, using default");
                    }
                    ok
                })
                .unwrap_or(defaults.platform_fee_bps),
            manual_capture_enabled: std::env::var("MANUAL_CAPTURE_ENABLED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.manual_capture_enabled),
            slot_granularity_minutes: std::env::var("SLOT_GRANULARITY_MINUTES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|m| *m > 0),
            gateway_timeout_ms: std::env::var("GATEWAY_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.gateway_timeout_ms),
            event_queue_capacity: std::env::var("EVENT_QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|c| *c > 0)
                .unwrap_or(defaults.event_queue_capacity),
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_dir: std::env::var("LOG_DIR").ok(),
        }
    }

    /// 先加载 `.env` (如果存在)，再读取环境变量
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        Self::from_env()
    }

    /// 不读取环境变量的默认配置
    ///
    /// 常用于测试场景
    pub fn defaults() -> Self {
        Self {
            platform_fee_bps: 100,
            manual_capture_enabled: false,
            slot_granularity_minutes: None,
            gateway_timeout_ms: 10_000,
            event_queue_capacity: 1024,
            data_dir: "./data".into(),
            log_level: "info".into(),
            log_dir: None,
        }
    }

    pub fn with_platform_fee_bps(mut self, bps: u32) -> Self {
        self.platform_fee_bps = bps.min(MAX_FEE_BPS);
        self
    }

    pub fn with_manual_capture(mut self, enabled: bool) -> Self {
        self.manual_capture_enabled = enabled;
        self
    }

    pub fn with_slot_granularity(mut self, minutes: Option<u32>) -> Self {
        self.slot_granularity_minutes = minutes.filter(|m| *m > 0);
        self
    }

    pub fn with_gateway_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.gateway_timeout_ms = timeout_ms;
        self
    }

    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity.max(1);
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<String>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }

    /// 新建支付使用的扣款方式
    pub fn capture_method(&self) -> CaptureMethod {
        if self.manual_capture_enabled {
            CaptureMethod::Manual
        } else {
            CaptureMethod::Automatic
        }
    }

    /// redb 数据库文件路径
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("bookings.redb")
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
