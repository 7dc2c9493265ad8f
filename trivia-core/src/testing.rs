//! Testing utilities for the trivia engine.
//!
//! This module provides deterministic stand-ins for the external services:
//! - `MockCompletion` returns scripted replies without network calls
//! - `RecordingChat` captures outbound chat lines
//! - `FixedTopic` serves a constant stream title
//! - `TestHarness` wires them into a dispatcher over a scratch directory

use crate::clock::FixedClock;
use crate::config::BotConfig;
use crate::dispatch::{ChatSink, Dispatcher, Services, TopicSource};
use crate::generation::{CompletionParams, CompletionService, GenerationAdapter};
use crate::queue::QueueManager;
use crate::store::RecordStore;
use crate::TriviaError;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A completion service that returns scripted replies.
///
/// Replies are consumed in order; the last one repeats once the script runs
/// out.
pub struct MockCompletion {
    replies: Mutex<VecDeque<Result<String, String>>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, CompletionParams)>>,
}

impl MockCompletion {
    /// Always reply with `text`.
    pub fn reply(text: impl Into<String>) -> Self {
        Self::script(vec![Ok(text.into())])
    }

    /// Always fail with an external-service error carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::script(vec![Err(message.into())])
    }

    /// Reply with each entry in turn.
    pub fn script(replies: Vec<Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleep for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every prompt received so far, with its parameters.
    pub fn calls(&self) -> Vec<(String, CompletionParams)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn next_reply(&self) -> Result<String, String> {
        let Ok(mut replies) = self.replies.lock() else {
            return Err("mock poisoned".to_string());
        };
        match replies.len() {
            0 => Ok(String::new()),
            1 => replies[0].clone(),
            _ => replies.pop_front().unwrap_or(Ok(String::new())),
        }
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(
        &self,
        prompt: &str,
        params: CompletionParams,
    ) -> Result<String, TriviaError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((prompt.to_string(), params));
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_reply().map_err(TriviaError::ExternalService)
    }
}

/// A chat sink that records every line it is asked to send.
#[derive(Default)]
pub struct RecordingChat {
    sent: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose sends always fail.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Lines sent so far.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatSink for RecordingChat {
    async fn send(&self, text: &str) -> Result<(), TriviaError> {
        if self.fail {
            return Err(TriviaError::ExternalService("chat unavailable".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(text.to_string());
        }
        Ok(())
    }
}

/// A topic source with a constant answer.
pub struct FixedTopic(Option<String>);

impl FixedTopic {
    pub fn new(topic: impl Into<String>) -> Self {
        Self(Some(topic.into()))
    }

    /// A source that always fails, as if the channel lookup broke.
    pub fn unavailable() -> Self {
        Self(None)
    }
}

#[async_trait]
impl TopicSource for FixedTopic {
    async fn current_topic(&self) -> Result<String, TriviaError> {
        self.0
            .clone()
            .ok_or_else(|| TriviaError::ExternalService("stream topic unavailable".to_string()))
    }
}

/// Wires mocks into a dispatcher over a scratch directory.
pub struct TestHarness {
    pub config: BotConfig,
    pub completion: Arc<MockCompletion>,
    pub chat: Arc<RecordingChat>,
    pub topic: Arc<FixedTopic>,
    pub clock: FixedClock,
    dir: PathBuf,
}

impl TestHarness {
    /// Harness storing files under `dir`, allowing sender `alice`, with topic
    /// `Containers` and a clock fixed on 2024-05-01.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap_or_default();
        let dir = dir.as_ref().to_path_buf();
        Self {
            config: BotConfig::new("test_channel")
                .with_allowed_senders(["alice"])
                .with_data_dir(&dir),
            completion: Arc::new(MockCompletion::reply("1. Q1\n2. Q2\n3. Q3")),
            chat: Arc::new(RecordingChat::new()),
            topic: Arc::new(FixedTopic::new("Containers")),
            clock: FixedClock::at(date, 20, 0, 0),
            dir,
        }
    }

    pub fn with_config(mut self, f: impl FnOnce(BotConfig) -> BotConfig) -> Self {
        self.config = f(self.config);
        self
    }

    pub fn with_completion(mut self, completion: MockCompletion) -> Self {
        self.completion = Arc::new(completion);
        self
    }

    pub fn with_chat(mut self, chat: RecordingChat) -> Self {
        self.chat = Arc::new(chat);
        self
    }

    pub fn with_topic(mut self, topic: FixedTopic) -> Self {
        self.topic = Arc::new(topic);
        self
    }

    /// The harness's "today".
    pub fn date(&self) -> NaiveDate {
        self.clock.0.date()
    }

    /// A queue over the harness directory and clock.
    pub fn queue(&self) -> QueueManager {
        QueueManager::with_clock(RecordStore::new(&self.dir), Arc::new(self.clock))
    }

    /// Append unanswered questions to today's store under theme `seed`.
    ///
    /// Panics if the write fails; meant for test setup only.
    pub async fn seed(&self, questions: &[&str]) {
        if let Err(e) = self.queue().append_batch(self.date(), "seed", questions).await {
            panic!("failed to seed store: {e}");
        }
    }

    /// Build a dispatcher over fresh queue and generator instances.
    pub fn dispatcher(&self) -> Dispatcher {
        let generator = GenerationAdapter::new(self.completion.clone())
            .with_timeout(self.config.completion_timeout);
        Dispatcher::new(Services {
            config: Arc::new(self.config.clone()),
            queue: Arc::new(self.queue()),
            generator,
            chat: self.chat.clone(),
            topic: self.topic.clone(),
        })
    }
}
