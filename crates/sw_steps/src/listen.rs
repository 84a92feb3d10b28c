//! 拦截阶段 - 在常规处理链之前运行关联分发

use std::future::Future;

use async_trait::async_trait;

use sw_core::{Result, StepError, StepEvent};

use crate::registry::StepRegistry;
use crate::root;

/// 常规 (下游) 更新处理器
#[async_trait]
pub trait UpdateHandler<E>: Send + Sync {
    /// 处理一条未被续体消费的更新
    async fn handle(&self, event: E) -> anyhow::Result<()>;
}

#[async_trait]
impl<E, F, Fut> UpdateHandler<E> for F
where
    E: Send + 'static,
    F: Fn(E) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, event: E) -> anyhow::Result<()> {
        (self)(event).await
    }
}

/// 拦截阶段
///
/// 每条更新先经过 [`StepRegistry::intercept`]，未被续体消费时才交给下游处理器。
pub struct Listen<E, H> {
    registry: StepRegistry<E>,
    handler: H,
}

impl<E, H> Listen<E, H>
where
    E: StepEvent + Clone,
    H: UpdateHandler<E>,
{
    /// 在给定注册表上创建拦截阶段
    pub fn new(registry: StepRegistry<E>, handler: H) -> Self {
        Self { registry, handler }
    }

    /// 使用进程级根注册表创建拦截阶段
    pub fn with_root(handler: H) -> Self {
        Self::new(root::root(), handler)
    }

    /// 获取注册表
    pub fn registry(&self) -> &StepRegistry<E> {
        &self.registry
    }

    /// 分发一条更新，返回是否被续体消费
    pub async fn dispatch(&self, event: E) -> Result<bool> {
        if self.registry.intercept(&event).await? {
            return Ok(true);
        }

        self.handler
            .handle(event)
            .await
            .map_err(StepError::Handler)?;
        Ok(false)
    }
}
