//! Day-partitioned record storage.
//!
//! Each calendar day lives in its own CSV file under the store directory.
//! Every call re-reads or re-writes the whole file; nothing is cached, so
//! the file is the single source of truth. Rows that do not decode are
//! carried through rewrites unchanged, so nothing on disk is ever dropped.

use crate::record::QuestionRecord;
use crate::TriviaError;
use chrono::NaiveDate;
use csv::{ByteRecord, StringRecord};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// File name prefix used by earlier deployments of the bot.
pub const DEFAULT_FILE_PREFIX: &str = "perguntas_live-";

/// Flat-file store of question records, one file per day.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
    file_prefix: String,
}

impl RecordStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
        }
    }

    /// Use a different file name prefix.
    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    /// Directory holding the day files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing the given day, e.g. `perguntas_live-2024-05-01.csv`.
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}{}.csv", self.file_prefix, date.format("%Y-%m-%d")))
    }

    /// Read every well-formed record for the day, in insertion order.
    ///
    /// A missing file is an empty store. Rows that cannot be decoded are
    /// left out here but stay on disk; see [`RecordStore::load_rows`].
    pub async fn load(&self, date: NaiveDate) -> Result<Vec<QuestionRecord>, TriviaError> {
        let rows = self.load_rows(date).await?;
        Ok(rows.into_iter().filter_map(StoredRow::into_record).collect())
    }

    /// Read every row of the day's file, decodable or not, in file order.
    pub async fn load_rows(&self, date: NaiveDate) -> Result<Vec<StoredRow>, TriviaError> {
        let path = self.path_for(date);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no store for date yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(bytes.as_slice());

        let mut rows = Vec::new();
        for (line, raw) in reader.byte_records().enumerate() {
            let row = StoredRow::decode(raw?);
            if let StoredRow::Opaque(ref raw) = row {
                warn!(
                    path = %path.display(),
                    line = line + 1,
                    fields = raw.len(),
                    "keeping undecodable row as is"
                );
            }
            rows.push(row);
        }

        Ok(rows)
    }

    /// Replace the day's file with `records`, preserving their order.
    pub async fn rewrite(
        &self,
        date: NaiveDate,
        records: &[QuestionRecord],
    ) -> Result<(), TriviaError> {
        let mut writer = row_writer();
        for record in records {
            writer.write_record(record.to_row())?;
        }
        self.replace_file(date, finish(writer)?, records.len()).await
    }

    /// Replace the day's file with `rows`, writing opaque rows back unchanged.
    pub async fn rewrite_rows(
        &self,
        date: NaiveDate,
        rows: &[StoredRow],
    ) -> Result<(), TriviaError> {
        let mut writer = row_writer();
        for row in rows {
            match row {
                StoredRow::Record(record) => writer.write_record(record.to_row())?,
                StoredRow::Opaque(raw) => writer.write_byte_record(raw)?,
            }
        }
        self.replace_file(date, finish(writer)?, rows.len()).await
    }

    /// The new content is written to a sibling temp file, synced, and renamed
    /// over the target, so readers see either the old or the new file.
    async fn replace_file(
        &self,
        date: NaiveDate,
        content: Vec<u8>,
        rows: usize,
    ) -> Result<(), TriviaError> {
        let path = self.path_for(date);
        fs::create_dir_all(&self.dir).await?;

        let tmp_path = temp_path(&path);
        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(&content).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        debug!(path = %path.display(), rows, "store rewritten");
        Ok(())
    }
}

/// One line of a day file.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredRow {
    Record(QuestionRecord),
    /// A line that is not a record (too short, unknown status, not UTF-8).
    /// Never served, but written back on every rewrite.
    Opaque(ByteRecord),
}

impl StoredRow {
    fn decode(raw: ByteRecord) -> Self {
        let row = match StringRecord::from_byte_record(raw) {
            Ok(row) => row,
            Err(e) => return StoredRow::Opaque(e.into_byte_record()),
        };
        match QuestionRecord::from_row(&row) {
            Ok(record) => StoredRow::Record(record),
            Err(_) => StoredRow::Opaque(row.into_byte_record()),
        }
    }

    pub fn as_record(&self) -> Option<&QuestionRecord> {
        match self {
            StoredRow::Record(record) => Some(record),
            StoredRow::Opaque(_) => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut QuestionRecord> {
        match self {
            StoredRow::Record(record) => Some(record),
            StoredRow::Opaque(_) => None,
        }
    }

    pub fn into_record(self) -> Option<QuestionRecord> {
        match self {
            StoredRow::Record(record) => Some(record),
            StoredRow::Opaque(_) => None,
        }
    }
}

fn row_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, TriviaError> {
    writer
        .into_inner()
        .map_err(|e| TriviaError::Io(e.into_error()))
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}
