//! 挂起原语 - 一次性可解析的 "下一条更新" 占位符

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use uuid::Uuid;

use sw_core::{Result, StepError};

/// 挂起点 ID
pub type SuspensionId = Uuid;

/// 挂起点状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspensionState {
    /// 等待中
    Pending,
    /// 已解析 (携带匹配的更新)
    Resolved,
    /// 已取消
    Cancelled,
    /// 已超时
    TimedOut,
}

impl SuspensionState {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SuspensionState::Pending)
    }
}

/// 内部槽位，值被等待方取走后仍保持 Resolved
enum Slot<E> {
    Pending,
    Resolved(Option<E>),
    Cancelled,
    TimedOut(Duration),
}

impl<E> Slot<E> {
    fn state(&self) -> SuspensionState {
        match self {
            Slot::Pending => SuspensionState::Pending,
            Slot::Resolved(_) => SuspensionState::Resolved,
            Slot::Cancelled => SuspensionState::Cancelled,
            Slot::TimedOut(_) => SuspensionState::TimedOut,
        }
    }

    /// 终态下的等待结果，Pending 返回 None
    fn outcome(&mut self) -> Option<Result<E>> {
        match self {
            Slot::Pending => None,
            Slot::Resolved(value) => Some(value.take().ok_or(StepError::AlreadyConsumed)),
            Slot::Cancelled => Some(Err(StepError::Cancelled)),
            Slot::TimedOut(after) => Some(Err(StepError::TimedOut(*after))),
        }
    }
}

struct Inner<E> {
    id: SuspensionId,
    slot: Mutex<Slot<E>>,
    notify: Notify,
}

/// 挂起点
///
/// 状态机 Pending -> Resolved | Cancelled | TimedOut，只允许一次终态转换。
/// 对终态再次 `resolve` / `cancel` 是无操作并返回 `false`。
/// 克隆共享同一个状态；只支持一个等待方。
pub struct Suspension<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for Suspension<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E> fmt::Debug for Suspension<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspension")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

impl<E> Default for Suspension<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Suspension<E> {
    /// 创建处于 Pending 状态的挂起点
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                slot: Mutex::new(Slot::Pending),
                notify: Notify::new(),
            }),
        }
    }

    /// 获取挂起点 ID
    pub fn id(&self) -> SuspensionId {
        self.inner.id
    }

    /// 获取当前状态
    pub fn state(&self) -> SuspensionState {
        self.inner.slot.lock().state()
    }

    pub fn is_pending(&self) -> bool {
        self.state() == SuspensionState::Pending
    }

    /// 两个句柄是否指向同一个挂起点
    pub fn same_as(&self, other: &Suspension<E>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// 以匹配的更新解析挂起点
    pub fn resolve(&self, value: E) -> bool {
        self.transition(Slot::Resolved(Some(value)))
    }

    /// 取消挂起点
    pub fn cancel(&self) -> bool {
        self.transition(Slot::Cancelled)
    }

    fn transition(&self, next: Slot<E>) -> bool {
        let mut slot = self.inner.slot.lock();
        if !matches!(*slot, Slot::Pending) {
            return false;
        }
        *slot = next;
        drop(slot);
        // notify_one 在没有等待方时保留许可，之后的 wait 不会丢失唤醒
        self.inner.notify.notify_one();
        true
    }

    /// 等待解析、取消或超时，以先发生者为准
    ///
    /// 超时后挂起点转为 TimedOut 并返回 [`StepError::TimedOut`]；
    /// 取消返回 [`StepError::Cancelled`]。`None` 表示一直等待。
    /// 只支持一个等待方：值被取走后再次等待返回 [`StepError::AlreadyConsumed`]。
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<E> {
        // 超出时钟范围的超时等同于一直等待
        let deadline =
            timeout.and_then(|after| Instant::now().checked_add(after).map(|at| (at, after)));

        loop {
            let outcome = self.inner.slot.lock().outcome();
            if let Some(outcome) = outcome {
                return outcome;
            }

            match deadline {
                Some((at, after)) => {
                    if tokio::time::timeout_at(at, self.inner.notify.notified())
                        .await
                        .is_err()
                    {
                        return self.expire(after);
                    }
                }
                None => self.inner.notify.notified().await,
            }
        }
    }

    fn expire(&self, after: Duration) -> Result<E> {
        let mut slot = self.inner.slot.lock();
        if matches!(*slot, Slot::Pending) {
            *slot = Slot::TimedOut(after);
        }
        // 截止时刻与解析竞争时，已到达的值优先
        slot.outcome().unwrap_or(Err(StepError::TimedOut(after)))
    }
}
