//! 续体注册表配置

use std::time::Duration;

use crate::error::{Result, StepError};

/// 存储容量环境变量
pub const ENV_STORE_CAPACITY: &str = "STEPWEAVE_STORE_CAPACITY";
/// 默认等待超时环境变量 (秒)
pub const ENV_WAIT_TIMEOUT_SECS: &str = "STEPWEAVE_WAIT_TIMEOUT_SECS";

/// 续体注册表配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepsConfig {
    /// 内存存储容量 (0 表示不限)
    pub store_capacity: usize,
    /// `wait_for` 未指定超时时使用的默认超时 (None 表示一直等待)
    pub default_wait_timeout: Option<Duration>,
}

impl Default for StepsConfig {
    fn default() -> Self {
        Self {
            store_capacity: 0,
            default_wait_timeout: None,
        }
    }
}

impl StepsConfig {
    /// 从环境变量读取配置，未设置的项使用默认值
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 从任意键值来源读取配置
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_STORE_CAPACITY) {
            config.store_capacity = raw.trim().parse().map_err(|_| {
                StepError::InvalidArgument(format!("{ENV_STORE_CAPACITY} must be an integer, got {raw:?}"))
            })?;
        }

        if let Some(raw) = lookup(ENV_WAIT_TIMEOUT_SECS) {
            let secs: f64 = raw.trim().parse().map_err(|_| {
                StepError::InvalidArgument(format!("{ENV_WAIT_TIMEOUT_SECS} must be a number, got {raw:?}"))
            })?;
            let timeout = Duration::try_from_secs_f64(secs).map_err(|_| {
                StepError::InvalidArgument(format!(
                    "{ENV_WAIT_TIMEOUT_SECS} must be a non-negative number of seconds in range, got {raw:?}"
                ))
            })?;
            config.default_wait_timeout = Some(timeout);
        }

        tracing::debug!(?config, "Steps config loaded");
        Ok(config)
    }

    /// 设置存储容量
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.store_capacity = capacity;
        self
    }

    /// 设置默认等待超时
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_wait_timeout = Some(timeout);
        self
    }
}
