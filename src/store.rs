//! Commit store - SQLite-backed persistence for mirrored commit history.
//!
//! Records are keyed by `(repository, sha)`; writing the same key again
//! overwrites in place, so re-ingesting a commit can never produce a
//! duplicate. Timestamps are stored as RFC 3339 text and parsed on read.
//! The watermark is never cached here: it is recomputed by scanning the
//! repository's rows, so it always reflects the true persisted state.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::StoreError;

/// One commit as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// The commit SHA; primary key component within a repository.
    pub sha: String,
    /// Absent only when neither author nor committer date was present
    /// upstream.
    pub timestamp: Option<DateTime<Utc>>,
    /// The raw commit message, stored verbatim.
    pub message: String,
    /// Author's email, else committer's, else absent.
    pub email: Option<String>,
}

/// Commit store handle. Opened once at startup and shared for the process
/// lifetime; the sync engine is its only writer.
pub struct CommitStore {
    conn: Connection,
}

impl CommitStore {
    /// Open or create the store at a specific path.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize()?;

        info!("Commit store opened at {}", path.display());
        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    /// Initialize the store schema.
    fn initialize(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS commits (
                repository TEXT NOT NULL,
                sha TEXT NOT NULL,
                commit_timestamp TEXT,
                message TEXT NOT NULL,
                email TEXT,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (repository, sha)
            );

            CREATE INDEX IF NOT EXISTS idx_commits_repository ON commits(repository);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }

    /// Upsert one record under `(repository, sha)`. Safe to call repeatedly
    /// with the same key: later writes overwrite, they never append.
    pub fn put(&self, repository: &str, record: &CommitRecord) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();

        self.conn.execute(
            r#"
            INSERT INTO commits (repository, sha, commit_timestamp, message, email, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(repository, sha) DO UPDATE SET
                commit_timestamp = ?3,
                message = ?4,
                email = ?5,
                updated_at = ?6
            "#,
            params![
                repository,
                record.sha,
                record.timestamp.map(|t| t.to_rfc3339()),
                record.message,
                record.email,
                now,
            ],
        )?;

        debug!("Stored commit {} for {}", record.sha, repository);
        Ok(())
    }

    /// Maximum commit timestamp among all records stored for a repository.
    ///
    /// Records without a timestamp are ignored; if every record lacks one
    /// (or the repository has no records) the result is `None`.
    pub fn latest_timestamp(
        &self,
        repository: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT commit_timestamp FROM commits WHERE repository = ?1")?;

        let timestamps = stmt.query_map(params![repository], |row| {
            row.get::<_, Option<String>>(0)
        })?;

        let mut latest: Option<DateTime<Utc>> = None;
        for ts in timestamps {
            let parsed = ts?
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc));

            if let Some(ts) = parsed {
                latest = Some(match latest {
                    Some(current) if current >= ts => current,
                    _ => ts,
                });
            }
        }

        Ok(latest)
    }

    /// Fetch one stored record.
    pub fn get(&self, repository: &str, sha: &str) -> Result<Option<CommitRecord>, StoreError> {
        let record = self
            .conn
            .query_row(
                r#"
                SELECT sha, commit_timestamp, message, email
                FROM commits
                WHERE repository = ?1 AND sha = ?2
                "#,
                params![repository, sha],
                |row| {
                    Ok(CommitRecord {
                        sha: row.get(0)?,
                        timestamp: row
                            .get::<_, Option<String>>(1)?
                            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                            .map(|dt| dt.with_timezone(&Utc)),
                        message: row.get(2)?,
                        email: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(record)
    }

    /// Number of records stored for a repository.
    pub fn count(&self, repository: &str) -> Result<u64, StoreError> {
        let count: u64 = self.conn.query_row(
            "SELECT COUNT(*) FROM commits WHERE repository = ?1",
            params![repository],
            |row| row.get(0),
        )?;

        Ok(count)
    }
}

/// Delete every store file whose name starts with the configured filename,
/// covering SQLite companion files (`-wal`, `-shm`) that share the prefix.
///
/// Called before any store handle is opened. No matching files is a no-op;
/// a failed deletion propagates as fatal.
pub fn purge_store_files(store_path: &Path) -> Result<(), StoreError> {
    let Some(file_name) = store_path.file_name().and_then(|n| n.to_str()) else {
        return Ok(());
    };
    let dir = match store_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        // Directory missing means there is nothing to purge.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(source) => return Err(StoreError::Purge { path: dir, source }),
    };

    for entry in entries {
        let entry = entry.map_err(|source| StoreError::Purge {
            path: dir.clone(),
            source,
        })?;

        let name = entry.file_name();
        if name.to_string_lossy().starts_with(file_name) {
            let path = entry.path();
            std::fs::remove_file(&path)
                .map_err(|source| StoreError::Purge { path: path.clone(), source })?;
            info!("Purged store file {}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn record(sha: &str, timestamp: Option<&str>) -> CommitRecord {
        CommitRecord {
            sha: sha.to_string(),
            timestamp: timestamp.map(date),
            message: format!("message {}", sha),
            email: Some("dev@example.com".to_string()),
        }
    }

    #[test]
    fn test_store_initialization() {
        let store = CommitStore::open_in_memory().unwrap();
        assert_eq!(store.count("owner/repo").unwrap(), 0);
    }

    #[test]
    fn test_put_and_get() {
        let store = CommitStore::open_in_memory().unwrap();
        let rec = record("abc", Some("2024-01-01T00:00:00Z"));

        store.put("owner/repo", &rec).unwrap();

        let stored = store.get("owner/repo", "abc").unwrap().unwrap();
        assert_eq!(stored, rec);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = CommitStore::open_in_memory().unwrap();

        store
            .put("owner/repo", &record("abc", Some("2024-01-01T00:00:00Z")))
            .unwrap();

        let mut updated = record("abc", Some("2024-01-01T00:00:00Z"));
        updated.message = "amended".to_string();
        store.put("owner/repo", &updated).unwrap();

        // Exactly one record, carrying the latest-written field values.
        assert_eq!(store.count("owner/repo").unwrap(), 1);
        let stored = store.get("owner/repo", "abc").unwrap().unwrap();
        assert_eq!(stored.message, "amended");
    }

    #[test]
    fn test_record_without_timestamp_is_stored() {
        let store = CommitStore::open_in_memory().unwrap();

        store.put("owner/repo", &record("abc", None)).unwrap();

        assert_eq!(store.count("owner/repo").unwrap(), 1);
        let stored = store.get("owner/repo", "abc").unwrap().unwrap();
        assert!(stored.timestamp.is_none());
    }

    #[test]
    fn test_latest_timestamp_empty_store() {
        let store = CommitStore::open_in_memory().unwrap();
        assert_eq!(store.latest_timestamp("owner/repo").unwrap(), None);
    }

    #[test]
    fn test_latest_timestamp_is_max() {
        let store = CommitStore::open_in_memory().unwrap();

        store
            .put("owner/repo", &record("a", Some("2024-01-02T00:00:00Z")))
            .unwrap();
        store
            .put("owner/repo", &record("b", Some("2024-01-03T00:00:00Z")))
            .unwrap();
        store
            .put("owner/repo", &record("c", Some("2024-01-01T00:00:00Z")))
            .unwrap();

        assert_eq!(
            store.latest_timestamp("owner/repo").unwrap(),
            Some(date("2024-01-03T00:00:00Z"))
        );
    }

    #[test]
    fn test_absent_timestamp_never_displaces_max() {
        let store = CommitStore::open_in_memory().unwrap();

        store
            .put("owner/repo", &record("a", Some("2024-01-02T00:00:00Z")))
            .unwrap();
        store.put("owner/repo", &record("b", None)).unwrap();

        assert_eq!(
            store.latest_timestamp("owner/repo").unwrap(),
            Some(date("2024-01-02T00:00:00Z"))
        );
    }

    #[test]
    fn test_all_absent_timestamps_yield_none() {
        let store = CommitStore::open_in_memory().unwrap();

        store.put("owner/repo", &record("a", None)).unwrap();
        store.put("owner/repo", &record("b", None)).unwrap();

        assert_eq!(store.latest_timestamp("owner/repo").unwrap(), None);
    }

    #[test]
    fn test_repositories_are_isolated() {
        let store = CommitStore::open_in_memory().unwrap();

        store
            .put("owner/one", &record("a", Some("2024-01-01T00:00:00Z")))
            .unwrap();
        store
            .put("owner/two", &record("b", Some("2024-06-01T00:00:00Z")))
            .unwrap();

        assert_eq!(store.count("owner/one").unwrap(), 1);
        assert_eq!(
            store.latest_timestamp("owner/one").unwrap(),
            Some(date("2024-01-01T00:00:00Z"))
        );
    }

    #[test]
    fn test_open_at_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("history.sqlite");

        let store = CommitStore::open_at(&path).unwrap();
        store
            .put("owner/repo", &record("a", Some("2024-01-01T00:00:00Z")))
            .unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_purge_removes_matching_prefix_only() {
        let temp_dir = TempDir::new().unwrap();
        let store_path = temp_dir.path().join("history.sqlite");

        std::fs::write(&store_path, b"db").unwrap();
        std::fs::write(temp_dir.path().join("history.sqlite-wal"), b"wal").unwrap();
        std::fs::write(temp_dir.path().join("history.sqlite-shm"), b"shm").unwrap();
        std::fs::write(temp_dir.path().join("unrelated.txt"), b"keep").unwrap();

        purge_store_files(&store_path).unwrap();

        assert!(!store_path.exists());
        assert!(!temp_dir.path().join("history.sqlite-wal").exists());
        assert!(!temp_dir.path().join("history.sqlite-shm").exists());
        assert!(temp_dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn test_purge_with_no_matching_files_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let store_path = temp_dir.path().join("history.sqlite");

        purge_store_files(&store_path).unwrap();
    }

    #[test]
    fn test_purge_with_missing_directory_is_noop() {
        let store_path = Path::new("/nonexistent-commitledger-dir/history.sqlite");
        purge_store_files(store_path).unwrap();
    }
}
