//! 工具模块 - 通用工具函数和类型
//!
//! # 内容
//!
//! - [`KeyedLocks`] - 按 key 串行化的异步锁
//! - 日志初始化、输入校验

pub mod locks;
pub mod logger;
pub mod validation;

pub use locks::KeyedLocks;
