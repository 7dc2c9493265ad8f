//! Bot configuration.
//!
//! Built once at startup and handed to the dispatcher as an immutable value.

use crate::generation::DEFAULT_TIMEOUT;
use crate::TriviaError;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a trivia bot instance.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Name the bot logs in as.
    pub bot_name: String,

    /// Channel the bot serves.
    pub channel: String,

    /// Lowercased identities allowed to issue commands.
    pub allowed_senders: BTreeSet<String>,

    /// Prefix that marks a chat message as a command.
    pub command_prefix: String,

    /// Name of the trivia command (without prefix).
    pub trivia_command: String,

    /// Directory holding the per-day question files.
    pub data_dir: PathBuf,

    /// Text prepended to every chat reply.
    pub reply_prefix: Option<String>,

    /// Bound on one completion call.
    pub completion_timeout: Duration,
}

impl BotConfig {
    /// Create a config for `channel` with defaults and an empty allow-list.
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            bot_name: "trivia-bot".to_string(),
            channel: channel.into(),
            allowed_senders: BTreeSet::new(),
            command_prefix: "!".to_string(),
            trivia_command: "pergunta".to_string(),
            data_dir: PathBuf::from("."),
            reply_prefix: None,
            completion_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the bot's login name.
    pub fn with_bot_name(mut self, name: impl Into<String>) -> Self {
        self.bot_name = name.into();
        self
    }

    /// Replace the allow-list. Identities are compared case-insensitively.
    pub fn with_allowed_senders<I, S>(mut self, senders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_senders = senders
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    /// Set the command prefix.
    pub fn with_command_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.command_prefix = prefix.into();
        self
    }

    /// Set the trivia command name.
    pub fn with_trivia_command(mut self, name: impl Into<String>) -> Self {
        self.trivia_command = name.into();
        self
    }

    /// Set the storage directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Prepend `prefix` to every reply.
    pub fn with_reply_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.reply_prefix = Some(prefix.into());
        self
    }

    /// Set the completion timeout.
    pub fn with_completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = timeout;
        self
    }

    /// Whether `sender` may issue commands.
    pub fn is_allowed(&self, sender: &str) -> bool {
        self.allowed_senders.contains(&sender.trim().to_lowercase())
    }

    /// Reply text for a delivered question.
    pub fn format_reply(&self, question: &str) -> String {
        match &self.reply_prefix {
            Some(prefix) => format!("{prefix}{question}"),
            None => question.to_string(),
        }
    }

    /// Build a config from process environment variables.
    pub fn from_env() -> Result<Self, TriviaError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    ///
    /// `CHANNEL_NAME` and `ALLOWED_TO_QUESTION` are required.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, TriviaError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| TriviaError::Config(format!("{key} must be set")))
        };

        let channel = require("CHANNEL_NAME")?;
        let allowed = require("ALLOWED_TO_QUESTION")?;

        let mut config = Self::new(channel.trim()).with_allowed_senders(allowed.split(','));
        if config.allowed_senders.is_empty() {
            return Err(TriviaError::Config(
                "ALLOWED_TO_QUESTION lists no senders".to_string(),
            ));
        }

        if let Some(name) = lookup("TWITCH_USERNAME") {
            config = config.with_bot_name(name);
        }
        if let Some(dir) = lookup("TRIVIA_DATA_DIR") {
            config = config.with_data_dir(dir);
        }
        if let Some(command) = lookup("TRIVIA_COMMAND") {
            config = config.with_trivia_command(command);
        }
        if let Some(prefix) = lookup("TRIVIA_REPLY_PREFIX") {
            config = config.with_reply_prefix(prefix);
        }
        if let Some(secs) = lookup("TRIVIA_COMPLETION_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|e| {
                TriviaError::Config(format!("TRIVIA_COMPLETION_TIMEOUT_SECS: {e}"))
            })?;
            if secs == 0 {
                return Err(TriviaError::Config(
                    "TRIVIA_COMPLETION_TIMEOUT_SECS must be at least 1".to_string(),
                ));
            }
            config = config.with_completion_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }
}
