//! StepWeave Demo - 标准输入驱动的模拟会话
//!
//! 每行输入是一条更新：`<user>[@<chat>] <text>`，例如 `7 /start`、`7 Alice`、`7@-100 31`。

mod bot;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sw_core::StepsConfig;
use sw_steps::{Listen, StepRegistry};
use sw_storage::{FileStateStorage, MemoryStateStorage, StateStorage};

use crate::bot::{parse_line, Bot, Message, Reply};

/// 状态文件环境变量，未设置时使用内存存储
const ENV_STATE_FILE: &str = "STEPWEAVE_STATE_FILE";

/// 问名字的等待时间 (配置未给出默认超时时)
const ASK_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stepweave_demo=info,sw_steps=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = StepsConfig::from_env()?;
    let ask_timeout = config.default_wait_timeout.unwrap_or(ASK_TIMEOUT);
    sw_steps::install_root(StepRegistry::<Message>::in_memory(config));

    let states: Arc<dyn StateStorage> = match std::env::var(ENV_STATE_FILE) {
        Ok(path) => Arc::new(FileStateStorage::open(path).await?),
        Err(_) => Arc::new(MemoryStateStorage::new()),
    };

    let (outbox, mut replies) = mpsc::unbounded_channel::<Reply>();
    tokio::spawn(async move {
        while let Some(reply) = replies.recv().await {
            println!("[bot -> {}] {}", reply.chat, reply.text);
        }
    });

    let bot = Bot::new(sw_steps::root(), states, outbox, ask_timeout);
    let listen = Arc::new(Listen::<Message, Bot>::with_root(bot));

    println!("StepWeave Demo v0.1.0");
    println!("Type 'help' for the input format, 'quit' to exit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input {
            "help" => {
                print_help();
                continue;
            }
            "quit" | "exit" => {
                println!("Goodbye!");
                break;
            }
            _ => {}
        }

        let Some(message) = parse_line(input) else {
            println!("Unrecognized input: {input}");
            continue;
        };

        // 每条更新独立处理，等待中的处理器不会阻塞输入
        let listen = Arc::clone(&listen);
        tokio::spawn(async move {
            let user = message.user;
            match listen.dispatch(message).await {
                Ok(true) => tracing::debug!(user, "Update consumed by a pending step"),
                Ok(false) => {}
                Err(err) => tracing::error!(user, error = %err, "Update handling failed"),
            }
        });
    }

    let cleared = sw_steps::root::<Message>().clear_all();
    tracing::info!(cleared, "Shutting down...");

    Ok(())
}

fn print_help() {
    println!("Input format: <user>[@<chat>] <text>");
    println!("  7 /start        - Ask user 7 for their name, then their age");
    println!("  7 Alice         - Reply as user 7 in their private chat");
    println!("  7@-100 31       - Reply as user 7 from group chat -100");
    println!("  7 /whoami       - Show stored state and data of user 7");
    println!("  9 /reset 7      - Drop the pending step and data of user 7");
    println!("  7 /cancel       - Abandon the current question");
    println!("  quit / exit     - Exit the demo");
}
