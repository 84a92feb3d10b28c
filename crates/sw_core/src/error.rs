//! 全局错误处理机制

use std::time::Duration;

use thiserror::Error;

/// StepWeave 统一错误类型
///
/// "未找到续体" 不是错误：注册表边界上用 `Option::None` 表达。
#[derive(Error, Debug)]
pub enum StepError {
    /// `wait_for` 在截止时间前没有等到匹配的更新
    #[error("Timed out after {0:?} waiting for the next update")]
    TimedOut(Duration),

    /// 等待中的挂起点被注销或清空
    #[error("Pending wait was cancelled")]
    Cancelled,

    /// 挂起点的值已被唯一的等待方取走，再次等待属于调用方违约
    #[error("Suspension value was already consumed")]
    AlreadyConsumed,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Step store is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },

    /// 回调或下游处理器返回的错误，原样透传
    #[error(transparent)]
    Handler(#[from] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StepError {
    /// 是否为超时
    pub fn is_timeout(&self) -> bool {
        matches!(self, StepError::TimedOut(_))
    }

    /// 是否为取消
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StepError::Cancelled)
    }
}

/// 统一 Result 类型别名
pub type Result<T> = std::result::Result<T, StepError>;
