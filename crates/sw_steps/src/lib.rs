//! # sw_steps - StepWeave Steps
//!
//! 续体注册表：在提问后挂起处理器，在同一用户的下一条更新到达时恢复执行。
//!
//! - [`StepStore`] / [`MemoryStepStore`]: 每个键最多一个续体的并发安全存储
//! - [`Suspension`]: 一次性可解析的挂起点，支持超时与取消
//! - [`StepRegistry`]: 注册 API (`register_next_step` / `unregister` / `wait_for` / `clear_all`)
//!   以及关联分发 (`intercept`)
//! - [`Listen`]: 位于常规处理链之前的拦截阶段
//!
//! ```no_run
//! use std::time::Duration;
//! use sw_steps::StepRegistry;
//! # #[derive(Clone)] struct Update;
//! # impl sw_core::StepEvent for Update {
//! #     fn actor_key(&self) -> Option<sw_core::StepKey> { None }
//! #     fn chat_key(&self) -> Option<sw_core::StepKey> { None }
//! # }
//! # async fn demo(steps: StepRegistry<Update>) -> sw_core::Result<()> {
//! match steps.wait_for(42, Some(Duration::from_secs(25))).await {
//!     Ok(_reply) => { /* 用户回复了 */ }
//!     Err(err) if err.is_timeout() => { /* 回复太慢 */ }
//!     Err(err) => return Err(err),
//! }
//! # Ok(())
//! # }
//! ```

pub mod continuation;
pub mod listen;
pub mod registry;
pub mod root;
pub mod store;
pub mod suspension;

pub use continuation::{Continuation, StepCallback, StepFuture};
pub use listen::{Listen, UpdateHandler};
pub use registry::StepRegistry;
pub use root::{change_root_store, install_root, root};
pub use store::{MemoryStepStore, StepStore};
pub use suspension::{Suspension, SuspensionId, SuspensionState};

pub use sw_core::{Result, StepError, StepEvent, StepKey, StepsConfig};
