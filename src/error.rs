//! Error taxonomy for the sync pipeline.
//!
//! Each error type maps to a recovery policy: `ConfigError` aborts startup,
//! `FetchError` aborts the current cycle only, `StoreError` is fatal at
//! startup and cycle-aborting during a sync, and `SchedulingError` is
//! recovered by substituting the default schedule.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid or partially-specified configuration. Always fatal; raised before
/// any store or network access happens.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Exactly one of the repo/owner pair was supplied. A partial pair is
    /// rejected rather than mixed with a default value.
    #[error("config field `{present}` was given without `{missing}`; specify both or neither")]
    PartialRepoPair {
        present: &'static str,
        missing: &'static str,
    },

    /// A boolean option carried a non-boolean YAML value. Absent booleans
    /// default silently, but a present value must be typed correctly.
    #[error("config field `{field}` must be a boolean, got {found}")]
    InvalidBoolean { field: &'static str, found: String },
}

/// Network or API failure while listing commits. Aborts the current cycle;
/// the next scheduled cycle retries from the same watermark.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch commits page {page}: {source}")]
    Page {
        page: u8,
        #[source]
        source: octocrab::Error,
    },

    /// Non-HTTP failure from an alternate lister implementation.
    #[error("upstream unavailable: {0}")]
    Upstream(String),
}

/// Commit store I/O failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store operation failed: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("failed to purge store file {path}: {source}")]
    Purge {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid cron expression. Recovered during validation by falling back to
/// the default schedule.
#[derive(Debug, Error)]
#[error("invalid cron expression `{expression}`: {source}")]
pub struct SchedulingError {
    pub expression: String,
    #[source]
    pub source: cron::error::Error,
}
