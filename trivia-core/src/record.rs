//! Question records and their row encoding.
//!
//! A row is four fields in fixed order: theme, question, timestamp
//! (`YYYY-MM-DD HH:MM:SS`) and status (`Yes` once delivered, `No` before).
//! Rows written by hand may carry any timestamp text or trailing fields;
//! both are kept as found.

use chrono::NaiveDateTime;
use csv::StringRecord;
use std::fmt;
use thiserror::Error;

/// Timestamp layout used in the persisted rows.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Number of fields in a well-formed row.
pub const ROW_FIELDS: usize = 4;

const THEME: usize = 0;
const QUESTION: usize = 1;
const CREATED_AT: usize = 2;
const STATUS: usize = 3;

/// Why a persisted row could not be read back as a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("expected 4 fields, found {found}")]
    MissingFields { found: usize },

    #[error("unknown status {0:?}")]
    InvalidStatus(String),
}

/// Delivery status of a question. `Delivered` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Unasked,
    Delivered,
}

impl Status {
    /// The literal written to storage.
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Unasked => "No",
            Status::Delivered => "Yes",
        }
    }

    /// Parse the stored literal.
    pub fn parse(raw: &str) -> Result<Self, RecordError> {
        match raw {
            "No" => Ok(Status::Unasked),
            "Yes" => Ok(Status::Delivered),
            other => Err(RecordError::InvalidStatus(other.to_string())),
        }
    }
}

/// Creation time of a record.
///
/// Rows the bot writes always parse; anything else is carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Timestamp {
    Parsed(NaiveDateTime),
    Verbatim(String),
}

impl Timestamp {
    pub fn parse(raw: &str) -> Self {
        NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
            .map(Timestamp::Parsed)
            .unwrap_or_else(|_| Timestamp::Verbatim(raw.to_string()))
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Timestamp::Parsed(at) => Some(*at),
            Timestamp::Verbatim(_) => None,
        }
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(at: NaiveDateTime) -> Self {
        Timestamp::Parsed(at)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timestamp::Parsed(at) => write!(f, "{}", at.format(TIMESTAMP_FORMAT)),
            Timestamp::Verbatim(raw) => f.write_str(raw),
        }
    }
}

/// One trivia question in a day's queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRecord {
    pub theme: String,
    pub question: String,
    pub created_at: Timestamp,
    pub status: Status,
    /// Fields past the fourth, written back untouched.
    pub extra: Vec<String>,
}

impl QuestionRecord {
    /// A fresh, unanswered record.
    pub fn new(
        theme: impl Into<String>,
        question: impl Into<String>,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            theme: theme.into(),
            question: question.into(),
            created_at: created_at.into(),
            status: Status::Unasked,
            extra: Vec::new(),
        }
    }

    pub fn is_answered(&self) -> bool {
        self.status == Status::Delivered
    }

    /// Flip to delivered. Returns `false` if it already was.
    pub fn mark_delivered(&mut self) -> bool {
        if self.is_answered() {
            return false;
        }
        self.status = Status::Delivered;
        true
    }

    /// Encode as a storage row.
    pub fn to_row(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(ROW_FIELDS + self.extra.len());
        row.push(self.theme.clone());
        row.push(self.question.clone());
        row.push(self.created_at.to_string());
        row.push(self.status.as_str().to_string());
        row.extend(self.extra.iter().cloned());
        row
    }

    /// Decode a storage row.
    ///
    /// Only the field count and the status literal are checked; an
    /// unparseable timestamp is kept as text.
    pub fn from_row(row: &StringRecord) -> Result<Self, RecordError> {
        if row.len() < ROW_FIELDS {
            return Err(RecordError::MissingFields { found: row.len() });
        }

        Ok(Self {
            theme: row[THEME].to_string(),
            question: row[QUESTION].to_string(),
            created_at: Timestamp::parse(&row[CREATED_AT]),
            status: Status::parse(&row[STATUS])?,
            extra: row.iter().skip(ROW_FIELDS).map(str::to_string).collect(),
        })
    }
}
