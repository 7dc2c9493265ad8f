//! Error types for the trivia engine.

use std::time::Duration;
use thiserror::Error;

/// Errors from queue, generation and dispatch operations.
///
/// An absent store and an unmatched `mark_answered` are not errors: the
/// first reads as an empty queue, the second reports `false`.
#[derive(Debug, Error)]
pub enum TriviaError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Completion service returned no questions")]
    GenerationEmpty,

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Completion request timed out after {0:?}")]
    CompletionTimeout(Duration),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<completions::Error> for TriviaError {
    fn from(err: completions::Error) -> Self {
        TriviaError::ExternalService(err.to_string())
    }
}

impl TriviaError {
    /// Short, stable label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            TriviaError::Io(_) | TriviaError::Csv(_) => "storage",
            TriviaError::GenerationEmpty => "generation_empty",
            TriviaError::ExternalService(_) | TriviaError::CompletionTimeout(_) => {
                "external_service"
            }
            TriviaError::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_errors_map_to_external_service() {
        let err: TriviaError = completions::Error::Api {
            status: 429,
            message: "rate limited".to_string(),
        }
        .into();
        assert!(matches!(err, TriviaError::ExternalService(ref m) if m.contains("429")));
        assert_eq!(err.kind(), "external_service");
    }

    #[test]
    fn test_kinds() {
        assert_eq!(TriviaError::GenerationEmpty.kind(), "generation_empty");
        assert_eq!(
            TriviaError::CompletionTimeout(Duration::from_secs(1)).kind(),
            "external_service"
        );
        assert_eq!(TriviaError::Config("x".into()).kind(), "config");
    }
}
