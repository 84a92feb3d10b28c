//! 状态过滤器

use sw_core::{Result, StepEvent};

use crate::base::StateStorage;

/// 判断更新的发送者是否处于给定状态
///
/// 当前状态名相同且保存的会话 ID 与更新所在会话一致时返回 `true`；
/// 没有保存状态或更新缺少发送者时返回 `false`。
pub async fn is_state<S, E>(storage: &S, event: &E, state: &str) -> Result<bool>
where
    S: StateStorage + ?Sized,
    E: StepEvent,
{
    let Some(user) = event.actor_key() else {
        return Ok(false);
    };

    let Some(context) = storage.get_state(&user).await? else {
        return Ok(false);
    };

    Ok(context.current_state == state && Some(&context.chat_id) == event.chat_key().as_ref())
}
