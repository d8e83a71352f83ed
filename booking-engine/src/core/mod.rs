//! 核心模块 - 引擎配置、错误定义和组件装配
//!
//! # 模块结构
//!
//! - [`EngineConfig`] - 引擎配置
//! - [`BookingError`] - 引擎错误
//! - [`Engine`] - 组件装配入口

pub mod config;
pub mod engine;
pub mod error;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{BookingError, BookingResult};
