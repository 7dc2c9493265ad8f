//! Question queue on top of the record store.
//!
//! Selection is "first unanswered in insertion order". Mutations are
//! serialized through a single writer lock, so a mark and an append for the
//! same day can never interleave their read-modify-write cycles.

use crate::clock::{Clock, SystemClock};
use crate::record::QuestionRecord;
use crate::store::{RecordStore, StoredRow};
use crate::TriviaError;
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Queue of trivia questions, partitioned by day.
pub struct QueueManager {
    store: RecordStore,
    clock: Arc<dyn Clock>,
    writer: Mutex<()>,
}

impl QueueManager {
    /// Create a queue over `store` using the system clock.
    pub fn new(store: RecordStore) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Create a queue with an explicit clock.
    pub fn with_clock(store: RecordStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            writer: Mutex::new(()),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Today's date according to the queue's clock.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// First unanswered record for the day, if any.
    pub async fn get_unanswered(
        &self,
        date: NaiveDate,
    ) -> Result<Option<QuestionRecord>, TriviaError> {
        let records = self.store.load(date).await?;
        Ok(records.into_iter().find(|r| !r.is_answered()))
    }

    /// Flip the first unanswered record whose question equals `question`.
    ///
    /// Returns `false` and leaves the store untouched when there is no such
    /// record.
    pub async fn mark_answered(
        &self,
        date: NaiveDate,
        question: &str,
    ) -> Result<bool, TriviaError> {
        let _guard = self.writer.lock().await;

        let mut rows = self.store.load_rows(date).await?;
        let Some(record) = rows
            .iter_mut()
            .filter_map(StoredRow::as_record_mut)
            .find(|r| !r.is_answered() && r.question == question)
        else {
            debug!(%date, question, "no unanswered record to mark");
            return Ok(false);
        };

        record.mark_delivered();
        self.store.rewrite_rows(date, &rows).await?;
        debug!(%date, question, "marked answered");
        Ok(true)
    }

    /// Append one unanswered record per question, in the order given.
    ///
    /// Returns the records that were added.
    pub async fn append_batch<S: AsRef<str>>(
        &self,
        date: NaiveDate,
        theme: &str,
        questions: &[S],
    ) -> Result<Vec<QuestionRecord>, TriviaError> {
        let _guard = self.writer.lock().await;

        let created_at = self.clock.now();
        let added: Vec<QuestionRecord> = questions
            .iter()
            .map(|q| QuestionRecord::new(theme, q.as_ref(), created_at))
            .collect();

        let mut rows = self.store.load_rows(date).await?;
        rows.extend(added.iter().cloned().map(StoredRow::Record));
        self.store.rewrite_rows(date, &rows).await?;

        info!(%date, theme, added = added.len(), total = rows.len(), "appended questions");
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use tempfile::TempDir;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn queue(dir: &TempDir) -> QueueManager {
        let clock = FixedClock::at(day(), 21, 0, 0);
        QueueManager::with_clock(RecordStore::new(dir.path()), Arc::new(clock))
    }

    #[tokio::test]
    async fn test_get_unanswered_on_absent_store() {
        let dir = TempDir::new().unwrap();
        let queue = queue(&dir);
        assert!(queue.get_unanswered(day()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_append_batch_keeps_input_order() {
        let dir = TempDir::new().unwrap();
        let queue = queue(&dir);

        let added = queue
            .append_batch(day(), "Rust", &["Q1", "Q2", "Q3"])
            .await
            .unwrap();
        assert_eq!(added.len(), 3);

        let records = queue.store().load(day()).await.unwrap();
        let questions: Vec<_> = records.iter().map(|r| r.question.as_str()).collect();
        assert_eq!(questions, vec!["Q1", "Q2", "Q3"]);
        assert!(records.iter().all(|r| !r.is_answered() && r.theme == "Rust"));
        assert_eq!(
            records[0].created_at.as_datetime(),
            day().and_hms_opt(21, 0, 0)
        );
    }

    #[tokio::test]
    async fn test_get_unanswered_returns_earliest() {
        let dir = TempDir::new().unwrap();
        let queue = queue(&dir);
        queue.append_batch(day(), "Rust", &["Q1", "Q2"]).await.unwrap();

        assert!(queue.mark_answered(day(), "Q1").await.unwrap());
        let next = queue.get_unanswered(day()).await.unwrap().unwrap();
        assert_eq!(next.question, "Q2");

        assert!(queue.mark_answered(day(), "Q2").await.unwrap());
        assert!(queue.get_unanswered(day()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_answered_flips_only_first_match() {
        let dir = TempDir::new().unwrap();
        let queue = queue(&dir);
        queue
            .append_batch(day(), "Rust", &["Dup", "Other", "Dup"])
            .await
            .unwrap();

        assert!(queue.mark_answered(day(), "Dup").await.unwrap());
        let records = queue.store().load(day()).await.unwrap();
        let flags: Vec<_> = records.iter().map(|r| r.is_answered()).collect();
        assert_eq!(flags, vec![true, false, false]);

        assert!(queue.mark_answered(day(), "Dup").await.unwrap());
        let records = queue.store().load(day()).await.unwrap();
        let flags: Vec<_> = records.iter().map(|r| r.is_answered()).collect();
        assert_eq!(flags, vec![true, false, true]);
    }

    #[tokio::test]
    async fn test_mark_answered_without_match_is_noop() {
        let dir = TempDir::new().unwrap();
        let queue = queue(&dir);

        // Absent store: nothing to flip, nothing created.
        assert!(!queue.mark_answered(day(), "Q1").await.unwrap());
        assert!(!queue.store().path_for(day()).exists());

        queue.append_batch(day(), "Rust", &["Q1"]).await.unwrap();
        assert!(queue.mark_answered(day(), "Q1").await.unwrap());
        let before = std::fs::read(queue.store().path_for(day())).unwrap();

        assert!(!queue.mark_answered(day(), "Q1").await.unwrap());
        assert!(!queue.mark_answered(day(), "unknown").await.unwrap());
        let after = std::fs::read(queue.store().path_for(day())).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_append_does_not_touch_existing_records() {
        let dir = TempDir::new().unwrap();
        let queue = queue(&dir);
        queue.append_batch(day(), "Rust", &["Q1"]).await.unwrap();
        queue.mark_answered(day(), "Q1").await.unwrap();

        queue.append_batch(day(), "Go", &["Q2", "Q3"]).await.unwrap();
        let records = queue.store().load(day()).await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[0].is_answered());
        assert_eq!(records[0].theme, "Rust");
        assert!(!records[1].is_answered() && !records[2].is_answered());
    }

    #[tokio::test]
    async fn test_mutations_keep_undecodable_rows() {
        let dir = TempDir::new().unwrap();
        let queue = queue(&dir);
        let path = queue.store().path_for(day());
        std::fs::write(
            &path,
            "seed,Manual Q,2024-05-01T10:00:00,No\r\n\
             seed,Q2,2024-05-01 10:00:01,No\r\n\
             short,row\r\n\
             seed,Q3,2024-05-01 10:00:02,Skipped\r\n",
        )
        .unwrap();

        // A hand-written timestamp does not stop a row from being served.
        let next = queue.get_unanswered(day()).await.unwrap().unwrap();
        assert_eq!(next.question, "Manual Q");

        assert!(queue.mark_answered(day(), "Q2").await.unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "seed,Manual Q,2024-05-01T10:00:00,No\r\n\
             seed,Q2,2024-05-01 10:00:01,Yes\r\n\
             short,row\r\n\
             seed,Q3,2024-05-01 10:00:02,Skipped\r\n"
        );

        assert!(queue.mark_answered(day(), "Manual Q").await.unwrap());
        queue.append_batch(day(), "Rust", &["Q4"]).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "seed,Manual Q,2024-05-01T10:00:00,Yes\r\n\
             seed,Q2,2024-05-01 10:00:01,Yes\r\n\
             short,row\r\n\
             seed,Q3,2024-05-01 10:00:02,Skipped\r\n\
             Rust,Q4,2024-05-01 21:00:00,No\r\n"
        );
    }

    #[tokio::test]
    async fn test_empty_batch_is_allowed() {
        let dir = TempDir::new().unwrap();
        let queue = queue(&dir);
        let added = queue
            .append_batch::<&str>(day(), "Rust", &[])
            .await
            .unwrap();
        assert!(added.is_empty());
        assert!(queue.store().load(day()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_serialized() {
        let dir = TempDir::new().unwrap();
        let queue = Arc::new(queue(&dir));

        let mut handles = Vec::new();
        for i in 0..8 {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move {
                let q = format!("Q{i}");
                queue.append_batch(day(), "Rust", &[q]).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(queue.store().load(day()).await.unwrap().len(), 8);
    }
}
