#![allow(dead_code)]

use sw_steps::{StepEvent, StepKey, StepRegistry};

/// 测试用更新：一条来自某用户、某会话的文本消息
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub user: Option<i64>,
    pub chat: Option<i64>,
    pub text: String,
}

impl StepEvent for Update {
    fn actor_key(&self) -> Option<StepKey> {
        self.user.map(StepKey::from)
    }

    fn chat_key(&self) -> Option<StepKey> {
        self.chat.map(StepKey::from)
    }
}

pub fn update(user: i64, chat: i64, text: &str) -> Update {
    Update {
        user: Some(user),
        chat: Some(chat),
        text: text.to_string(),
    }
}

/// 让出执行权直到注册表中至少有 `count` 个续体
pub async fn registered(registry: &StepRegistry<Update>, count: usize) {
    while registry.store().len() < count {
        tokio::task::yield_now().await;
    }
}
