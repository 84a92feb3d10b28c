//! 演示机器人：问名字 (wait_for) 再问年龄 (下一步回调)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use sw_core::{StepEvent, StepKey};
use sw_steps::{StepError, StepRegistry, UpdateHandler};
use sw_storage::{is_state, StateStorage};

pub const ASK_NAME: &str = "ASK_NAME";
pub const ASK_AGE: &str = "ASK_AGE";
pub const DONE: &str = "DONE";

/// 在问答过程中放弃当前会话
const CANCEL: &str = "/cancel";

/// 模拟的聊天消息
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub user: i64,
    pub chat: i64,
    pub text: String,
}

impl StepEvent for Message {
    fn actor_key(&self) -> Option<StepKey> {
        Some(self.user.into())
    }

    fn chat_key(&self) -> Option<StepKey> {
        Some(self.chat.into())
    }
}

/// 解析一行输入：`<user>[@<chat>] <text>`
///
/// 省略会话时会话 ID 等于用户 ID。
pub fn parse_line(line: &str) -> Option<Message> {
    let (sender, text) = line.trim().split_once(char::is_whitespace)?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let (user, chat) = match sender.split_once('@') {
        Some((user, chat)) => (user.parse().ok()?, chat.parse().ok()?),
        None => {
            let user = sender.parse().ok()?;
            (user, user)
        }
    };

    Some(Message {
        user,
        chat,
        text: text.to_string(),
    })
}

/// 机器人回复
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub chat: i64,
    pub text: String,
}

/// 常规处理链
#[derive(Clone)]
pub struct Bot {
    steps: StepRegistry<Message>,
    states: Arc<dyn StateStorage>,
    outbox: mpsc::UnboundedSender<Reply>,
    ask_timeout: Duration,
}

impl Bot {
    pub fn new(
        steps: StepRegistry<Message>,
        states: Arc<dyn StateStorage>,
        outbox: mpsc::UnboundedSender<Reply>,
        ask_timeout: Duration,
    ) -> Self {
        Self {
            steps,
            states,
            outbox,
            ask_timeout,
        }
    }

    fn reply(&self, chat: i64, text: impl Into<String>) {
        let reply = Reply {
            chat,
            text: text.into(),
        };
        if self.outbox.send(reply).is_err() {
            tracing::warn!(chat, "Outbox closed, reply dropped");
        }
    }

    async fn start(&self, message: Message) -> anyhow::Result<()> {
        let user = StepKey::from(message.user);
        let chat = StepKey::from(message.chat);

        self.states
            .set_state(&user, ASK_NAME, None, Some(chat.clone()))
            .await?;
        self.reply(message.chat, "What is your name?");

        let answer = match self.steps.wait_for(message.user, Some(self.ask_timeout)).await {
            Ok(answer) => answer,
            Err(StepError::TimedOut(_)) => {
                self.states.delete_state(&user).await?;
                self.reply(message.chat, "You took too long to answer. Send /start to try again.");
                return Ok(());
            }
            Err(StepError::Cancelled) => {
                self.reply(message.chat, "Cancelled.");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        if answer.text == CANCEL {
            self.states.delete_state(&user).await?;
            self.reply(answer.chat, "Cancelled.");
            return Ok(());
        }

        let name = answer.text.clone();
        self.states
            .update_data(&user, json!({ "name": name }))
            .await?;
        self.states
            .set_state(&user, ASK_AGE, Some("ask_age"), Some(chat))
            .await?;
        self.reply(answer.chat, format!("Nice to meet you, {name}! How old are you?"));

        self.ask_age(message.user)?;
        Ok(())
    }

    fn ask_age(&self, user: i64) -> sw_core::Result<()> {
        self.steps
            .register_next_step_with(user, self.clone(), |message: Message, bot: Bot| async move {
                bot.on_age(message).await
            })
    }

    async fn on_age(&self, message: Message) -> anyhow::Result<()> {
        let user = StepKey::from(message.user);
        if message.text == CANCEL {
            self.states.delete_state(&user).await?;
            self.reply(message.chat, "Cancelled.");
            return Ok(());
        }

        let Ok(age) = message.text.parse::<u32>() else {
            self.reply(message.chat, "Please send your age as a number.");
            self.ask_age(message.user)?;
            return Ok(());
        };

        self.states.update_data(&user, json!({ "age": age })).await?;
        self.states
            .set_state(&user, DONE, None, Some(message.chat.into()))
            .await?;
        self.reply(message.chat, format!("Got it, you are {age}."));
        Ok(())
    }

    async fn reset(&self, message: Message, target: &str) -> anyhow::Result<()> {
        let Ok(target) = target.parse::<i64>() else {
            self.reply(message.chat, "Usage: /reset <user>");
            return Ok(());
        };

        let key = StepKey::from(target);
        let pending = self.steps.unregister(target);
        self.states.delete_state(&key).await?;
        self.states.delete_data(&key).await?;

        let text = if pending {
            format!("User {target} was reset.")
        } else {
            format!("User {target} had nothing pending.")
        };
        self.reply(message.chat, text);
        Ok(())
    }

    async fn whoami(&self, message: Message) -> anyhow::Result<()> {
        let user = StepKey::from(message.user);
        let data = self.states.get_data(&user).await?.unwrap_or_default();
        let state = self
            .states
            .get_state(&user)
            .await?
            .map(|context| context.current_state)
            .unwrap_or_else(|| "-".to_string());

        self.reply(
            message.chat,
            format!("state: {state}, data: {}", serde_json::Value::Object(data)),
        );
        Ok(())
    }
}

#[async_trait]
impl UpdateHandler<Message> for Bot {
    async fn handle(&self, message: Message) -> anyhow::Result<()> {
        let text = message.text.clone();
        match text.as_str() {
            "/start" => self.start(message).await,
            text if text.starts_with("/reset") => {
                let target = text.trim_start_matches("/reset").trim().to_string();
                self.reset(message, &target).await
            }
            "/whoami" => self.whoami(message).await,
            _ => {
                // 状态还在但续体已丢失 (例如进程重启)，重新接上年龄问答
                if is_state(self.states.as_ref(), &message, ASK_AGE).await? {
                    tracing::info!(user = message.user, "Resuming age question from stored state");
                    return self.on_age(message).await;
                }
                self.reply(message.chat, "Send /start to begin.");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use sw_steps::Listen;
    use sw_storage::MemoryStateStorage;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;

    struct Harness {
        listen: Arc<Listen<Message, Bot>>,
        states: Arc<MemoryStateStorage>,
        replies: UnboundedReceiver<Reply>,
    }

    fn harness(ask_timeout: Duration) -> Harness {
        let (outbox, replies) = mpsc::unbounded_channel();
        let states = Arc::new(MemoryStateStorage::new());
        let steps = StepRegistry::<Message>::default();
        let bot = Bot::new(steps.clone(), states.clone(), outbox, ask_timeout);

        Harness {
            listen: Arc::new(Listen::new(steps, bot)),
            states,
            replies,
        }
    }

    fn say(user: i64, text: &str) -> Message {
        Message {
            user,
            chat: user,
            text: text.to_string(),
        }
    }

    async fn pending(listen: &Listen<Message, Bot>, count: usize) {
        while listen.registry().store().len() < count {
            tokio::task::yield_now().await;
        }
    }

    async fn next_reply(replies: &mut UnboundedReceiver<Reply>) -> String {
        replies.recv().await.unwrap().text
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("7 hello there"), Some(say(7, "hello there")));
        assert_eq!(
            parse_line("7@-100 /start"),
            Some(Message {
                user: 7,
                chat: -100,
                text: "/start".to_string(),
            })
        );
        assert_eq!(parse_line("7"), None);
        assert_eq!(parse_line("bob hi"), None);
        assert_eq!(parse_line("7@x hi"), None);
    }

    #[tokio::test]
    async fn test_name_then_age() {
        let mut h = harness(Duration::from_secs(30));

        let start = {
            let listen = h.listen.clone();
            tokio::spawn(async move { listen.dispatch(say(1, "/start")).await })
        };
        assert_eq!(next_reply(&mut h.replies).await, "What is your name?");
        pending(&h.listen, 1).await;

        assert!(h.listen.dispatch(say(1, "Alice")).await.unwrap());
        assert!(!start.await.unwrap().unwrap());
        assert_eq!(
            next_reply(&mut h.replies).await,
            "Nice to meet you, Alice! How old are you?"
        );

        assert!(h.listen.dispatch(say(1, "old enough")).await.unwrap());
        assert_eq!(
            next_reply(&mut h.replies).await,
            "Please send your age as a number."
        );

        assert!(h.listen.dispatch(say(1, "31")).await.unwrap());
        assert_eq!(next_reply(&mut h.replies).await, "Got it, you are 31.");
        assert!(h.listen.registry().store().is_empty());

        let user = StepKey::from(1);
        let data = h.states.get_data(&user).await.unwrap().unwrap();
        assert_eq!(
            serde_json::Value::Object(data),
            json!({"name": "Alice", "age": 31})
        );
        let state = h.states.get_state(&user).await.unwrap().unwrap();
        assert_eq!(state.current_state, DONE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_answer_times_out() {
        let mut h = harness(Duration::from_secs(30));

        assert!(!h.listen.dispatch(say(2, "/start")).await.unwrap());
        assert_eq!(next_reply(&mut h.replies).await, "What is your name?");
        assert_eq!(
            next_reply(&mut h.replies).await,
            "You took too long to answer. Send /start to try again."
        );

        assert!(h.states.get_state(&StepKey::from(2)).await.unwrap().is_none());
        assert!(h.listen.registry().store().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_while_asking_name() {
        let mut h = harness(Duration::from_secs(30));

        let start = {
            let listen = h.listen.clone();
            tokio::spawn(async move { listen.dispatch(say(3, "/start")).await })
        };
        assert_eq!(next_reply(&mut h.replies).await, "What is your name?");
        pending(&h.listen, 1).await;

        assert!(h.listen.dispatch(say(3, "/cancel")).await.unwrap());
        start.await.unwrap().unwrap();
        assert_eq!(next_reply(&mut h.replies).await, "Cancelled.");
        assert!(h.states.get_state(&StepKey::from(3)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reset_cancels_other_users_wait() {
        let mut h = harness(Duration::from_secs(30));

        let start = {
            let listen = h.listen.clone();
            tokio::spawn(async move { listen.dispatch(say(4, "/start")).await })
        };
        assert_eq!(next_reply(&mut h.replies).await, "What is your name?");
        pending(&h.listen, 1).await;

        assert!(!h.listen.dispatch(say(9, "/reset 4")).await.unwrap());
        start.await.unwrap().unwrap();

        let mut replies = vec![
            next_reply(&mut h.replies).await,
            next_reply(&mut h.replies).await,
        ];
        replies.sort();
        assert_eq!(replies, vec!["Cancelled.", "User 4 was reset."]);
        assert!(h.listen.registry().store().is_empty());
    }

    #[tokio::test]
    async fn test_resume_age_from_stored_state() {
        let mut h = harness(Duration::from_secs(30));
        h.states
            .set_state(&StepKey::from(5), ASK_AGE, Some("ask_age"), None)
            .await
            .unwrap();

        assert!(!h.listen.dispatch(say(5, "40")).await.unwrap());
        assert_eq!(next_reply(&mut h.replies).await, "Got it, you are 40.");
    }

    #[tokio::test]
    async fn test_unknown_text() {
        let mut h = harness(Duration::from_secs(30));
        let consumed = tokio_test::assert_ok!(h.listen.dispatch(say(6, "hello")).await);
        assert!(!consumed);
        assert_eq!(next_reply(&mut h.replies).await, "Send /start to begin.");
    }
}
