//! Question generation from a text-completion service.
//!
//! The adapter turns the stream topic into a prompt, asks the service for a
//! batch, and parses the free-text reply into one question per line.

use crate::TriviaError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Questions requested per generated batch.
pub const QUESTIONS_PER_BATCH: usize = 10;

/// Output length cap for a batch.
pub const MAX_TOKENS: usize = 300;

/// Sampling temperature for a batch.
pub const TEMPERATURE: f32 = 1.0;

/// Default bound on a single completion call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Parameters for one completion call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        }
    }
}

/// A text-completion backend.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Send `prompt` as a single user message and return the raw reply text.
    async fn complete(&self, prompt: &str, params: CompletionParams)
        -> Result<String, TriviaError>;
}

#[async_trait]
impl CompletionService for completions::Client {
    async fn complete(
        &self,
        prompt: &str,
        params: CompletionParams,
    ) -> Result<String, TriviaError> {
        let request = completions::Request::new(vec![completions::Message::user(prompt)])
            .with_max_tokens(params.max_tokens)
            .with_temperature(params.temperature);

        let response = completions::Client::complete(self, request).await?;
        if response.truncated() {
            warn!(
                max_tokens = params.max_tokens,
                "completion hit the token limit, last question may be cut off"
            );
        }
        if let Some(usage) = &response.usage {
            debug!(
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion finished"
            );
        }
        Ok(response.text().to_string())
    }
}

/// Builds prompts, calls the completion service, and parses the reply.
#[derive(Clone)]
pub struct GenerationAdapter {
    service: Arc<dyn CompletionService>,
    params: CompletionParams,
    timeout: Duration,
}

impl GenerationAdapter {
    /// Create an adapter with the fixed batch parameters and default timeout.
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self {
            service,
            params: CompletionParams::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound each completion call by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Prompt asking for a batch of questions about `topic`.
    pub fn build_prompt(&self, topic: &str) -> String {
        format!(
            "Write {QUESTIONS_PER_BATCH} trivia questions about the topic of this live stream: {topic}\n\
             Reply with one question per line, numbered like \"1. \", and nothing else."
        )
    }

    /// Ask the service for questions and parse them out of the reply.
    ///
    /// An empty parse is [`TriviaError::GenerationEmpty`]; a failed or
    /// timed-out call is an external-service error.
    pub async fn generate(&self, prompt: &str) -> Result<Vec<String>, TriviaError> {
        info!(timeout = ?self.timeout, "generating questions");

        let reply = tokio::time::timeout(self.timeout, self.service.complete(prompt, self.params))
            .await
            .map_err(|_| TriviaError::CompletionTimeout(self.timeout))??;

        let questions = parse_questions(&reply);
        if questions.is_empty() {
            return Err(TriviaError::GenerationEmpty);
        }

        debug!(count = questions.len(), "parsed generated questions");
        Ok(questions)
    }
}

/// Split a reply into questions: one per non-blank line, marker stripped.
pub fn parse_questions(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(strip_marker)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Remove a leading ordinal (`1. `, `10) `, `3: `) or bullet (`- `, `* `, `• `).
///
/// Lines without a recognizable marker are returned trimmed but otherwise whole.
pub fn strip_marker(line: &str) -> &str {
    let line = line.trim();

    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(after) = rest.strip_prefix(['.', ')', ':']) {
            if after.is_empty() || after.starts_with(char::is_whitespace) {
                return after.trim_start();
            }
        }
        return line;
    }

    if let Some(after) = line.strip_prefix(['-', '*', '•']) {
        if after.starts_with(char::is_whitespace) {
            return after.trim_start();
        }
    }

    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCompletion;

    #[test]
    fn test_prompt_mentions_topic_and_count() {
        let adapter = GenerationAdapter::new(Arc::new(MockCompletion::reply("")));
        let prompt = adapter.build_prompt("Containers");
        assert!(prompt.contains("Containers"));
        assert!(prompt.contains("10 trivia questions"));
        assert_eq!(prompt, adapter.build_prompt("Containers"));
    }

    #[test]
    fn test_strip_marker_variants() {
        assert_eq!(strip_marker("1. What is Rust?"), "What is Rust?");
        assert_eq!(strip_marker("10. What is Cargo?"), "What is Cargo?");
        assert_eq!(strip_marker("  3) What is a crate?  "), "What is a crate?");
        assert_eq!(strip_marker("4: What is a trait?"), "What is a trait?");
        assert_eq!(strip_marker("- What is a lifetime?"), "What is a lifetime?");
        assert_eq!(strip_marker("* What is a macro?"), "What is a macro?");
        assert_eq!(strip_marker("• What is unsafe?"), "What is unsafe?");
        assert_eq!(strip_marker("What is a slice?"), "What is a slice?");
    }

    #[test]
    fn test_strip_marker_keeps_leading_numbers_in_text() {
        assert_eq!(strip_marker("3.14 is which constant?"), "3.14 is which constant?");
        assert_eq!(strip_marker("2024 saw which release?"), "2024 saw which release?");
        assert_eq!(strip_marker("-1 in two's complement?"), "-1 in two's complement?");
    }

    #[test]
    fn test_parse_questions_skips_blank_and_marker_only_lines() {
        let reply = "1. First?\n\n   \n2. Second?\r\n3.\n10. Tenth?\n";
        assert_eq!(parse_questions(reply), vec!["First?", "Second?", "Tenth?"]);
    }

    #[tokio::test]
    async fn test_generate_parses_reply_and_uses_fixed_params() {
        let mock = Arc::new(MockCompletion::reply("1. Q1\n2. Q2\n3. Q3"));
        let adapter = GenerationAdapter::new(mock.clone());

        let questions = adapter.generate("prompt").await.unwrap();
        assert_eq!(questions, vec!["Q1", "Q2", "Q3"]);

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "prompt");
        assert_eq!(calls[0].1, CompletionParams { max_tokens: 300, temperature: 1.0 });
    }

    #[tokio::test]
    async fn test_generate_empty_reply_is_generation_empty() {
        let adapter = GenerationAdapter::new(Arc::new(MockCompletion::reply("\n  \n")));
        let err = adapter.generate("prompt").await.unwrap_err();
        assert!(matches!(err, TriviaError::GenerationEmpty));
    }

    #[tokio::test]
    async fn test_generate_service_failure_is_external() {
        let adapter = GenerationAdapter::new(Arc::new(MockCompletion::failing("quota exceeded")));
        let err = adapter.generate("prompt").await.unwrap_err();
        assert!(matches!(err, TriviaError::ExternalService(ref m) if m == "quota exceeded"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_times_out() {
        let mock = MockCompletion::reply("1. Late").with_delay(Duration::from_secs(60));
        let adapter =
            GenerationAdapter::new(Arc::new(mock)).with_timeout(Duration::from_secs(5));

        let err = adapter.generate("prompt").await.unwrap_err();
        assert!(matches!(err, TriviaError::CompletionTimeout(d) if d == Duration::from_secs(5)));
    }
}
