//! 续体 - 每个键上登记的 "下一步"

use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::suspension::Suspension;

/// 回调返回的 future
pub type StepFuture = BoxFuture<'static, anyhow::Result<()>>;

/// 下一步回调
///
/// 只会被调用一次 (或在注销时直接丢弃)，因此绑定参数可以按值移入。
pub struct StepCallback<E> {
    f: Box<dyn FnOnce(E) -> StepFuture + Send>,
}

impl<E> StepCallback<E> {
    /// 包装异步回调
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(E) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            f: Box::new(move |event| f(event).boxed()),
        }
    }

    /// 包装带绑定参数的异步回调
    pub fn with_args<A, F, Fut>(args: A, f: F) -> Self
    where
        A: Send + 'static,
        F: FnOnce(E, A) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::new(move |event| f(event, args))
    }

    /// 以匹配的更新调用回调
    pub fn invoke(self, event: E) -> StepFuture {
        (self.f)(event)
    }
}

impl<E> fmt::Debug for StepCallback<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StepCallback(..)")
    }
}

/// 续体
#[derive(Debug)]
pub enum Continuation<E> {
    /// 挂起点，由下一条更新解析
    Suspension(Suspension<E>),
    /// 回调，由下一条更新调用
    Callback(StepCallback<E>),
}

impl<E> Continuation<E> {
    /// 续体类型名称
    pub fn kind(&self) -> &'static str {
        match self {
            Continuation::Suspension(_) => "suspension",
            Continuation::Callback(_) => "callback",
        }
    }

    /// 是否持有给定的挂起点
    pub fn holds(&self, suspension: &Suspension<E>) -> bool {
        match self {
            Continuation::Suspension(own) => own.same_as(suspension),
            Continuation::Callback(_) => false,
        }
    }

    /// 不经调用地丢弃续体：挂起点被取消，回调直接释放
    pub fn discard(self) {
        match self {
            Continuation::Suspension(suspension) => {
                suspension.cancel();
            }
            Continuation::Callback(_) => {}
        }
    }
}

impl<E> From<Suspension<E>> for Continuation<E> {
    fn from(suspension: Suspension<E>) -> Self {
        Continuation::Suspension(suspension)
    }
}

impl<E> From<StepCallback<E>> for Continuation<E> {
    fn from(callback: StepCallback<E>) -> Self {
        Continuation::Callback(callback)
    }
}
