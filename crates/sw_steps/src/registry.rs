//! 注册 API 与关联分发器

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sw_core::{Result, StepError, StepEvent, StepKey, StepsConfig};

use crate::continuation::{Continuation, StepCallback};
use crate::store::{MemoryStepStore, StepStore};
use crate::suspension::Suspension;

/// 续体注册表
///
/// 持有一个可替换的 [`StepStore`]，所有注册函数与分发都经由它完成。
/// 克隆共享同一个存储。
pub struct StepRegistry<E> {
    store: Arc<dyn StepStore<E>>,
    config: StepsConfig,
}

impl<E> Clone for StepRegistry<E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<E: Send + 'static> Default for StepRegistry<E> {
    fn default() -> Self {
        Self::in_memory(StepsConfig::default())
    }
}

impl<E: Send + 'static> StepRegistry<E> {
    /// 基于给定存储创建注册表
    pub fn new(store: Arc<dyn StepStore<E>>, config: StepsConfig) -> Self {
        Self { store, config }
    }

    /// 创建内存注册表
    pub fn in_memory(config: StepsConfig) -> Self {
        let store = Arc::new(MemoryStepStore::from_config(&config));
        Self::new(store, config)
    }

    /// 获取底层存储
    pub fn store(&self) -> &Arc<dyn StepStore<E>> {
        &self.store
    }

    /// 获取配置
    pub fn config(&self) -> &StepsConfig {
        &self.config
    }

    /// 直接登记续体，覆盖键上已有的续体
    pub fn register(&self, key: impl Into<StepKey>, step: Continuation<E>) -> Result<()> {
        self.store.set(key.into(), step)
    }

    /// 为用户/会话登记下一步回调
    pub fn register_next_step<F, Fut>(&self, key: impl Into<StepKey>, next: F) -> Result<()>
    where
        F: FnOnce(E) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(key, StepCallback::new(next).into())
    }

    /// 登记带绑定参数的下一步回调
    pub fn register_next_step_with<A, F, Fut>(
        &self,
        key: impl Into<StepKey>,
        args: A,
        next: F,
    ) -> Result<()>
    where
        A: Send + 'static,
        F: FnOnce(E, A) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register(key, StepCallback::with_args(args, next).into())
    }

    /// 注销键上的续体
    ///
    /// 挂起点被取消，回调直接丢弃。键上没有续体不是错误，返回 `false`。
    pub fn unregister(&self, key: impl Into<StepKey>) -> bool {
        let key = key.into();
        match self.store.pop(&key) {
            Some(step) => {
                tracing::debug!(%key, kind = step.kind(), "Continuation unregistered");
                step.discard();
                true
            }
            None => false,
        }
    }

    /// 等待来自 `key` 的下一条更新
    ///
    /// `timeout` 为 `None` 时使用配置中的默认超时。无论解析、取消、超时，
    /// 还是调用方的 future 被丢弃，返回前都会移除自己登记的挂起点。
    pub async fn wait_for(&self, key: impl Into<StepKey>, timeout: Option<Duration>) -> Result<E> {
        let key = key.into();
        let timeout = timeout.or(self.config.default_wait_timeout);
        let suspension = Suspension::new();

        self.store
            .set(key.clone(), Continuation::Suspension(suspension.clone()))?;
        tracing::debug!(%key, suspension = %suspension.id(), ?timeout, "Waiting for next update");

        let _slot = WaitSlot {
            store: self.store.as_ref(),
            key: &key,
            suspension: &suspension,
        };

        let outcome = suspension.wait(timeout).await;
        if let Err(StepError::TimedOut(after)) = &outcome {
            tracing::warn!(%key, suspension = %suspension.id(), ?after, "Wait timed out");
        }
        outcome
    }

    /// 清空全部续体：挂起点被取消，回调不会被调用
    pub fn clear_all(&self) -> usize {
        let mut cleared = 0;
        for step in self.store.drain() {
            step.discard();
            cleared += 1;
        }
        tracing::debug!(cleared, "Continuations cleared");
        cleared
    }

    /// 关联分发：在常规处理链之前拦截一条更新
    ///
    /// 先按发送者 ID 查找，未命中再按会话 ID 查找。命中的挂起点被解析，
    /// 命中的回调被调用，返回 `true` 表示更新已被消费、不应再继续路由。
    /// 回调的错误以 [`StepError::Handler`] 原样返回。
    pub async fn intercept(&self, event: &E) -> Result<bool>
    where
        E: StepEvent + Clone,
    {
        let primary = event.actor_key();
        let fallback = event.chat_key().filter(|chat| primary.as_ref() != Some(chat));

        for key in [primary, fallback].into_iter().flatten() {
            let Some(step) = self.store.pop(&key) else {
                continue;
            };

            match step {
                Continuation::Suspension(suspension) => {
                    if suspension.resolve(event.clone()) {
                        tracing::debug!(%key, suspension = %suspension.id(), "Suspension resolved");
                        return Ok(true);
                    }
                    // 等待方已超时或被取消，视为该键未命中
                    tracing::warn!(
                        %key,
                        suspension = %suspension.id(),
                        state = ?suspension.state(),
                        "Dropped stale suspension"
                    );
                }
                Continuation::Callback(callback) => {
                    tracing::debug!(%key, "Invoking next step");
                    callback.invoke(event.clone()).await?;
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }
}

/// `wait_for` 持有的键槽位，离开作用域时移除自己的挂起点
struct WaitSlot<'a, E: Send + 'static> {
    store: &'a dyn StepStore<E>,
    key: &'a StepKey,
    suspension: &'a Suspension<E>,
}

impl<E: Send + 'static> Drop for WaitSlot<'_, E> {
    fn drop(&mut self) {
        let suspension = self.suspension;
        // 键已被分发器取走或被新的续体覆盖时不做移除
        if self
            .store
            .pop_if(self.key, &|step| step.holds(suspension))
            .is_some()
        {
            tracing::debug!(key = %self.key, suspension = %suspension.id(), "Wait slot released");
        }
        suspension.cancel();
    }
}
