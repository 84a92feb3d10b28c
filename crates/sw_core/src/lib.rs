//! # sw_core - StepWeave Core Primitives
//!
//! 核心原语层，定义续体键 (StepKey)、事件键提取特征、全局错误处理机制与配置。
//! 此 crate 是整个项目的基础依赖，不依赖其他业务 crate。

pub mod config;
pub mod error;
pub mod event;
pub mod key;

pub use config::StepsConfig;
pub use error::{Result, StepError};
pub use event::StepEvent;
pub use key::StepKey;
