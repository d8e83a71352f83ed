/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a new entity id (UUID v4, hyphenated)
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Milliseconds in one minute
pub const MINUTE_MILLIS: i64 = 60_000;

/// Convert a minute count to milliseconds
pub const fn minutes_to_millis(minutes: u32) -> i64 {
    minutes as i64 * MINUTE_MILLIS
}
