//! SQLite-backed job-status store.
//!
//! A simple create/update/read contract for long-running question
//! processing, plus monotonic id counters for files and questions.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use docrag_core::{DocragError, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS questions (
    id      TEXT PRIMARY KEY,
    payload TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS counters (
    name  TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
"#;

/// Processing state of a question job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Done,
    Error,
}

/// One question job. A single well-typed record with optional fields;
/// `answer` and `error` fill in as the job completes or fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub question_id: String,
    pub file_id: String,
    pub question: String,
    pub status: JobStatus,
    pub answer: Option<String>,
    pub error: Option<String>,
}

impl QuestionRecord {
    pub fn new(question_id: String, file_id: String, question: String) -> Self {
        Self {
            question_id,
            file_id,
            question,
            status: JobStatus::Processing,
            answer: None,
            error: None,
        }
    }
}

/// Key-value job store backed by SQLite.
pub struct JobStore {
    conn: Mutex<Connection>,
}

impl JobStore {
    /// Open or create the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| DocragError::database(format!("Failed to open job store: {}", e)))?;

        Self::init(conn, &path.display().to_string())
    }

    /// In-memory store (for tests).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DocragError::database(format!("Failed to open in-memory store: {}", e)))?;

        Self::init(conn, ":memory:")
    }

    fn init(conn: Connection, path: &str) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 30000;
            "#,
        )
        .map_err(|e| DocragError::database(format!("Failed to configure connection: {}", e)))?;

        conn.execute_batch(SCHEMA)
            .map_err(|e| DocragError::database(format!("Failed to initialize schema: {}", e)))?;

        info!("Job store opened at {}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> Result<R>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DocragError::database(e.to_string()))?;
        f(&conn)
    }

    fn next_id(&self, counter: &str) -> Result<String> {
        self.with_conn(|conn| {
            let value: i64 = conn
                .query_row(
                    r#"
                    INSERT INTO counters (name, value) VALUES (?1, 1)
                    ON CONFLICT(name) DO UPDATE SET value = value + 1
                    RETURNING value
                    "#,
                    params![counter],
                    |row| row.get(0),
                )
                .map_err(|e| DocragError::database(e.to_string()))?;
            Ok(value.to_string())
        })
    }

    /// Next monotonic file id.
    pub fn next_file_id(&self) -> Result<String> {
        self.next_id("file_id_counter")
    }

    /// Next monotonic question id.
    pub fn next_question_id(&self) -> Result<String> {
        self.next_id("question_id_counter")
    }

    /// Create or replace a question record.
    pub fn create_question(&self, record: &QuestionRecord) -> Result<()> {
        let payload = serde_json::to_string(record)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO questions (id, payload) VALUES (?1, ?2)",
                params![record.question_id, payload],
            )
            .map_err(|e| DocragError::database(e.to_string()))?;
            debug!("Created question {}", record.question_id);
            Ok(())
        })
    }

    /// Read a question record.
    pub fn get_question(&self, question_id: &str) -> Result<Option<QuestionRecord>> {
        let payload: Option<String> = self.with_conn(|conn| {
            conn.query_row(
                "SELECT payload FROM questions WHERE id = ?1",
                params![question_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DocragError::database(e.to_string()))
        })?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Mark a question done with its answer.
    pub fn complete_question(&self, question_id: &str, answer: &str) -> Result<()> {
        self.update_question(question_id, |record| {
            record.status = JobStatus::Done;
            record.answer = Some(answer.to_string());
        })
    }

    /// Mark a question failed with its error message.
    pub fn fail_question(&self, question_id: &str, error: &str) -> Result<()> {
        self.update_question(question_id, |record| {
            record.status = JobStatus::Error;
            record.error = Some(error.to_string());
        })
    }

    fn update_question<F>(&self, question_id: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut QuestionRecord),
    {
        let Some(mut record) = self.get_question(question_id)? else {
            // Mirror the read-modify-write contract: updating a missing
            // record is a no-op.
            return Ok(());
        };

        apply(&mut record);
        self.create_question(&record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_monotonic() {
        let store = JobStore::open_memory().unwrap();
        assert_eq!(store.next_file_id().unwrap(), "1");
        assert_eq!(store.next_file_id().unwrap(), "2");
        // Independent counters.
        assert_eq!(store.next_question_id().unwrap(), "1");
        assert_eq!(store.next_file_id().unwrap(), "3");
    }

    #[test]
    fn test_create_and_read_question() {
        let store = JobStore::open_memory().unwrap();
        let record = QuestionRecord::new("1".into(), "5".into(), "какой срок поставки?".into());
        store.create_question(&record).unwrap();

        let read = store.get_question("1").unwrap().unwrap();
        assert_eq!(read.question, "какой срок поставки?");
        assert_eq!(read.status, JobStatus::Processing);
        assert_eq!(read.answer, None);
    }

    #[test]
    fn test_complete_question() {
        let store = JobStore::open_memory().unwrap();
        let record = QuestionRecord::new("1".into(), "5".into(), "вопрос".into());
        store.create_question(&record).unwrap();

        store.complete_question("1", "тридцать дней").unwrap();

        let read = store.get_question("1").unwrap().unwrap();
        assert_eq!(read.status, JobStatus::Done);
        assert_eq!(read.answer.as_deref(), Some("тридцать дней"));
        assert_eq!(read.error, None);
    }

    #[test]
    fn test_fail_question() {
        let store = JobStore::open_memory().unwrap();
        let record = QuestionRecord::new("1".into(), "5".into(), "вопрос".into());
        store.create_question(&record).unwrap();

        store.fail_question("1", "embedding service down").unwrap();

        let read = store.get_question("1").unwrap().unwrap();
        assert_eq!(read.status, JobStatus::Error);
        assert_eq!(read.error.as_deref(), Some("embedding service down"));
    }

    #[test]
    fn test_missing_question_reads_none_updates_noop() {
        let store = JobStore::open_memory().unwrap();
        assert!(store.get_question("404").unwrap().is_none());
        store.complete_question("404", "answer").unwrap();
        assert!(store.get_question("404").unwrap().is_none());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.db");

        {
            let store = JobStore::open(&path).unwrap();
            store
                .create_question(&QuestionRecord::new("1".into(), "1".into(), "q".into()))
                .unwrap();
        }

        let store = JobStore::open(&path).unwrap();
        assert!(store.get_question("1").unwrap().is_some());
    }
}
