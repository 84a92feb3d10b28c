//! # sw_storage - StepWeave State Storage
//!
//! 会话状态存储：为每个用户保存当前状态名、所在会话与自由格式数据。
//! 与续体注册表相互独立，可以持久化。

pub mod base;
pub mod file;
pub mod filter;
pub mod memory;

pub use base::{StateContext, StateStorage};
pub use file::FileStateStorage;
pub use filter::is_state;
pub use memory::MemoryStateStorage;
