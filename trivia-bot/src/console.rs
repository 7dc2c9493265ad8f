//! Console chat adapter.
//!
//! Stands in for the chat platform with a line-oriented protocol on stdin:
//! - `sender: message` is an inbound chat message
//! - `#quit` stops reading
//!
//! Replies are printed to stdout as `[#channel] text`.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use trivia_core::{ChatMessage, ChatSink, EventHandler, TopicSource, TriviaError};

/// Writes replies to stdout.
pub struct ConsoleChat {
    channel: String,
    stdout: Mutex<tokio::io::Stdout>,
}

impl ConsoleChat {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

#[async_trait]
impl ChatSink for ConsoleChat {
    async fn send(&self, text: &str) -> Result<(), TriviaError> {
        let line = format!("[#{}] {}\n", self.channel, text.replace(['\r', '\n'], " "));
        let mut stdout = self.stdout.lock().await;
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}

/// A stream title fixed at startup.
pub struct StaticTopic(pub String);

#[async_trait]
impl TopicSource for StaticTopic {
    async fn current_topic(&self) -> Result<String, TriviaError> {
        Ok(self.0.clone())
    }
}

/// Parse `sender: message`. Lines without a sender are not chat messages.
pub fn parse_line(line: &str) -> Option<ChatMessage> {
    let (sender, content) = line.split_once(':')?;
    let sender = sender.trim();
    if sender.is_empty() || sender.contains(char::is_whitespace) {
        return None;
    }
    Some(ChatMessage::new(sender, content.trim()))
}

/// Feed stdin lines to `handler` until EOF or `#quit`.
///
/// Each message is handled on its own task so a slow command never blocks
/// intake; in-flight commands are awaited before returning.
pub async fn run_console<H>(handler: Arc<H>) -> std::io::Result<()>
where
    H: EventHandler + 'static,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight = JoinSet::new();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "#quit" {
            break;
        }

        let Some(message) = parse_line(line) else {
            warn!(line, "expected `sender: message`");
            continue;
        };

        let handler = Arc::clone(&handler);
        in_flight.spawn(async move {
            handler.on_message(message).await;
        });

        // Reap finished tasks so the set does not grow without bound.
        while let Some(done) = in_flight.try_join_next() {
            if let Err(e) = done {
                warn!(error = %e, "message task panicked");
            }
        }
    }

    debug!(pending = in_flight.len(), "intake closed, draining");
    while let Some(done) = in_flight.join_next().await {
        if let Err(e) = done {
            warn!(error = %e, "message task panicked");
        }
    }
    Ok(())
}
