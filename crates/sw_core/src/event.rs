//! 入站更新的键提取特征

use crate::key::StepKey;

/// 可被关联分发的入站更新
///
/// 由框架适配层实现，负责从框架特有的更新对象中取出用户 ID 与会话 ID。
/// 取不到时返回 `None`，分发器将其视为该键未命中。
pub trait StepEvent: Send + Sync + 'static {
    /// 主键：发送者 (用户) ID
    fn actor_key(&self) -> Option<StepKey>;

    /// 回退键：会话 (聊天) ID
    fn chat_key(&self) -> Option<StepKey>;
}
