//! Question queue and delivery engine for a live-chat trivia bot.
//!
//! This crate provides:
//! - A day-partitioned, crash-safe flat-file store of trivia questions
//! - A queue with first-unanswered selection and one-way "answered" marking
//! - Question generation through a text-completion service
//! - A command dispatcher with an allow-list and a name→handler map
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use trivia_core::{BotConfig, ChatMessage, Dispatcher, EventHandler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BotConfig::from_env()?;
//!     let client = completions::Client::from_env()?;
//!
//!     let dispatcher = Dispatcher::from_config(config, Arc::new(client), chat, topic);
//!     dispatcher.on_ready().await;
//!     dispatcher.on_message(ChatMessage::new("alice", "!pergunta")).await;
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod generation;
pub mod queue;
pub mod record;
pub mod store;
pub mod testing;

// Primary public API
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::BotConfig;
pub use dispatch::{
    ChatMessage, ChatSink, CommandHandler, Delivery, DeliverySource, DispatchOutcome, Dispatcher,
    EventHandler, Services, TopicSource, TriviaCommand,
};
pub use error::TriviaError;
pub use generation::{CompletionParams, CompletionService, GenerationAdapter};
pub use queue::QueueManager;
pub use record::{QuestionRecord, RecordError, Status, Timestamp};
pub use store::{RecordStore, StoredRow};
