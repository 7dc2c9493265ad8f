//! Chat command dispatch.
//!
//! The dispatcher filters inbound messages by allow-list, looks the command
//! up in an explicit name→handler map, and runs it. It is the single boundary
//! where handler errors are caught and logged; a failing command never stops
//! the intake loop.

use crate::config::BotConfig;
use crate::generation::{CompletionService, GenerationAdapter};
use crate::queue::QueueManager;
use crate::store::RecordStore;
use crate::TriviaError;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// An inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
        }
    }
}

/// Outbound side of the chat connection.
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Send a single-line reply to the channel.
    async fn send(&self, text: &str) -> Result<(), TriviaError>;
}

/// Provides the current stream title.
#[async_trait]
pub trait TopicSource: Send + Sync {
    async fn current_topic(&self) -> Result<String, TriviaError>;
}

/// Chat events the bot reacts to.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Called once the chat connection is up.
    async fn on_ready(&self);

    /// Called for every inbound message.
    async fn on_message(&self, message: ChatMessage) -> DispatchOutcome;
}

/// Where a delivered question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverySource {
    /// An unanswered question already in today's store.
    Queue,
    /// The first question of a freshly generated batch.
    Generated,
}

/// A question that was sent to chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub question: String,
    pub source: DeliverySource,
}

/// What happened to one inbound message.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Not a command, unknown command, or sender not allowed.
    Ignored,
    Delivered(Delivery),
    Failed(TriviaError),
}

/// Collaborators shared by all command handlers.
pub struct Services {
    pub config: Arc<BotConfig>,
    pub queue: Arc<QueueManager>,
    pub generator: GenerationAdapter,
    pub chat: Arc<dyn ChatSink>,
    pub topic: Arc<dyn TopicSource>,
}

/// A chat command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(
        &self,
        services: &Services,
        message: &ChatMessage,
    ) -> Result<Delivery, TriviaError>;
}

/// Serves the next unanswered question, generating a batch when none is left.
///
/// Whole deliveries are serialized, so two commands in flight can never pick
/// the same record.
#[derive(Default)]
pub struct TriviaCommand {
    delivery: Mutex<()>,
}

impl TriviaCommand {
    pub fn new() -> Self {
        Self::default()
    }

    async fn deliver(
        &self,
        services: &Services,
        date: NaiveDate,
        question: &str,
    ) -> Result<(), TriviaError> {
        info!(question, "sending question");
        services
            .chat
            .send(&services.config.format_reply(question))
            .await?;

        if !services.queue.mark_answered(date, question).await? {
            warn!(%date, question, "delivered question had no unanswered record to mark");
        }
        Ok(())
    }
}

#[async_trait]
impl CommandHandler for TriviaCommand {
    async fn handle(
        &self,
        services: &Services,
        _message: &ChatMessage,
    ) -> Result<Delivery, TriviaError> {
        let _guard = self.delivery.lock().await;
        let date = services.queue.today();

        if let Some(record) = services.queue.get_unanswered(date).await? {
            self.deliver(services, date, &record.question).await?;
            return Ok(Delivery {
                question: record.question,
                source: DeliverySource::Queue,
            });
        }

        let topic = services.topic.current_topic().await?;
        info!(%date, %topic, "queue exhausted, generating questions");

        let prompt = services.generator.build_prompt(&topic);
        let questions = services.generator.generate(&prompt).await?;
        let added = services.queue.append_batch(date, &topic, questions.as_slice()).await?;

        let first = added
            .into_iter()
            .next()
            .ok_or(TriviaError::GenerationEmpty)?;
        self.deliver(services, date, &first.question).await?;

        Ok(Delivery {
            question: first.question,
            source: DeliverySource::Generated,
        })
    }
}

/// Routes allowed chat commands to their handlers.
pub struct Dispatcher {
    services: Services,
    commands: HashMap<String, Arc<dyn CommandHandler>>,
}

impl Dispatcher {
    /// Create a dispatcher with the trivia command registered under the
    /// configured name.
    pub fn new(services: Services) -> Self {
        let mut dispatcher = Self {
            services,
            commands: HashMap::new(),
        };
        let name = dispatcher.services.config.trivia_command.clone();
        dispatcher.register(name, Arc::new(TriviaCommand::new()));
        dispatcher
    }

    /// Wire up a dispatcher from configuration and external collaborators.
    ///
    /// Storage lives under `config.data_dir` and dates follow the system clock.
    pub fn from_config(
        config: BotConfig,
        completion: Arc<dyn CompletionService>,
        chat: Arc<dyn ChatSink>,
        topic: Arc<dyn TopicSource>,
    ) -> Self {
        let queue = QueueManager::new(RecordStore::new(config.data_dir.clone()));
        let generator = GenerationAdapter::new(completion).with_timeout(config.completion_timeout);
        Self::new(Services {
            config: Arc::new(config),
            queue: Arc::new(queue),
            generator,
            chat,
            topic,
        })
    }

    /// Register (or replace) a command handler.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        self.commands.insert(name.into(), handler);
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Extract the command name from a message, if it is one.
    ///
    /// The first whitespace-separated token must be the prefix followed by a
    /// name; anything after it is ignored.
    pub fn parse_command<'a>(&self, content: &'a str) -> Option<&'a str> {
        let token = content.split_whitespace().next()?;
        let name = token.strip_prefix(self.services.config.command_prefix.as_str())?;
        (!name.is_empty()).then_some(name)
    }

    /// Handle one message and report what happened.
    pub async fn dispatch(&self, message: &ChatMessage) -> DispatchOutcome {
        if !self.services.config.is_allowed(&message.sender) {
            return DispatchOutcome::Ignored;
        }

        let Some(name) = self.parse_command(&message.content) else {
            return DispatchOutcome::Ignored;
        };
        let Some(handler) = self.commands.get(name) else {
            debug!(command = name, sender = %message.sender, "unknown command");
            return DispatchOutcome::Ignored;
        };

        match handler.handle(&self.services, message).await {
            Ok(delivery) => DispatchOutcome::Delivered(delivery),
            Err(e) => DispatchOutcome::Failed(e),
        }
    }
}

#[async_trait]
impl EventHandler for Dispatcher {
    async fn on_ready(&self) {
        let config = &self.services.config;
        info!(bot = %config.bot_name, channel = %config.channel, "logged in");

        match self.services.topic.current_topic().await {
            Ok(topic) => info!(%topic, "stream topic"),
            Err(e) => warn!(error = %e, "could not fetch stream topic"),
        }
    }

    async fn on_message(&self, message: ChatMessage) -> DispatchOutcome {
        let outcome = self.dispatch(&message).await;
        match &outcome {
            DispatchOutcome::Ignored => {}
            DispatchOutcome::Delivered(delivery) => {
                debug!(sender = %message.sender, source = ?delivery.source, "command handled");
            }
            DispatchOutcome::Failed(e) => {
                error!(sender = %message.sender, kind = e.kind(), error = %e, "command failed");
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixedTopic, MockCompletion, RecordingChat, TestHarness};
    use tempfile::TempDir;

    #[test]
    fn test_parse_command() {
        let dir = TempDir::new().unwrap();
        let dispatcher = TestHarness::new(dir.path()).dispatcher();

        assert_eq!(dispatcher.parse_command("!pergunta"), Some("pergunta"));
        assert_eq!(dispatcher.parse_command("  !pergunta please"), Some("pergunta"));
        assert_eq!(dispatcher.parse_command("pergunta"), None);
        assert_eq!(dispatcher.parse_command("!"), None);
        assert_eq!(dispatcher.parse_command(""), None);
    }

    #[tokio::test]
    async fn test_unknown_command_is_ignored() {
        let dir = TempDir::new().unwrap();
        let harness = TestHarness::new(dir.path());
        let dispatcher = harness.dispatcher();

        let outcome = dispatcher
            .on_message(ChatMessage::new("alice", "!dance"))
            .await;
        assert!(matches!(outcome, DispatchOutcome::Ignored));
        assert!(harness.chat.sent().is_empty());
    }

    #[tokio::test]
    async fn test_plain_chat_is_ignored() {
        let dir = TempDir::new().unwrap();
        let harness = TestHarness::new(dir.path());
        let dispatcher = harness.dispatcher();

        let outcome = dispatcher
            .on_message(ChatMessage::new("alice", "hello everyone"))
            .await;
        assert!(matches!(outcome, DispatchOutcome::Ignored));
        assert!(harness.completion.calls().is_empty());
    }

    #[tokio::test]
    async fn test_registered_command_is_routed() {
        struct Echo;

        #[async_trait]
        impl CommandHandler for Echo {
            async fn handle(
                &self,
                services: &Services,
                message: &ChatMessage,
            ) -> Result<Delivery, TriviaError> {
                services.chat.send(&message.content).await?;
                Ok(Delivery {
                    question: message.content.clone(),
                    source: DeliverySource::Queue,
                })
            }
        }

        let dir = TempDir::new().unwrap();
        let harness = TestHarness::new(dir.path());
        let mut dispatcher = harness.dispatcher();
        dispatcher.register("echo", Arc::new(Echo));

        let outcome = dispatcher
            .on_message(ChatMessage::new("ALICE", "!echo hi"))
            .await;
        assert!(matches!(outcome, DispatchOutcome::Delivered(_)));
        assert_eq!(harness.chat.sent(), vec!["!echo hi".to_string()]);
    }

    #[tokio::test]
    async fn test_reply_prefix_is_applied() {
        let dir = TempDir::new().unwrap();
        let harness = TestHarness::new(dir.path())
            .with_config(|c| c.with_reply_prefix("[Bot]: "))
            .with_completion(MockCompletion::reply("1. Q1"));
        let dispatcher = harness.dispatcher();

        dispatcher
            .on_message(ChatMessage::new("alice", "!pergunta"))
            .await;
        assert_eq!(harness.chat.sent(), vec!["[Bot]: Q1".to_string()]);
    }

    #[tokio::test]
    async fn test_topic_failure_is_caught() {
        let dir = TempDir::new().unwrap();
        let harness = TestHarness::new(dir.path()).with_topic(FixedTopic::unavailable());
        let dispatcher = harness.dispatcher();

        let outcome = dispatcher
            .on_message(ChatMessage::new("alice", "!pergunta"))
            .await;
        assert!(matches!(outcome, DispatchOutcome::Failed(TriviaError::ExternalService(_))));
        assert!(harness.chat.sent().is_empty());
        assert!(harness.completion.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_send_leaves_question_unanswered() {
        let dir = TempDir::new().unwrap();
        let harness = TestHarness::new(dir.path()).with_chat(RecordingChat::failing());
        harness.seed(&["Q1"]).await;
        let dispatcher = harness.dispatcher();

        let outcome = dispatcher
            .on_message(ChatMessage::new("alice", "!pergunta"))
            .await;
        assert!(matches!(outcome, DispatchOutcome::Failed(TriviaError::ExternalService(_))));

        let next = harness.queue().get_unanswered(harness.date()).await.unwrap();
        assert_eq!(next.map(|r| r.question), Some("Q1".to_string()));
    }
}
