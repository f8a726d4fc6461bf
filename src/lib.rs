//! CommitLedger - Incremental GitHub Commit History Mirror
//!
//! CommitLedger polls a GitHub repository on a cron schedule and mirrors its
//! commit history into a local SQLite store, resuming from the last seen
//! watermark instead of re-fetching history on every run.
//!
//! ## Core Features
//!
//! - **Incremental sync**: resumes from the maximum stored commit timestamp
//! - **Idempotent storage**: re-ingesting a commit overwrites in place
//! - **Cron scheduling**: configurable trigger expression with sane defaults
//! - **Field-by-field config validation**: defaults per field, typed errors
//!   for invalid input
//!
//! ## Modules
//!
//! - [`config`]: configuration loading and validation
//! - [`github`]: GitHub API integration and commit listing
//! - [`normalize`]: raw commit to stored record mapping
//! - [`store`]: SQLite-backed commit store and watermark scan
//! - [`sync`]: the per-trigger sync cycle
//! - [`daemon`]: lifecycle bootstrap and the scheduling loop

pub mod config;
pub mod daemon;
pub mod error;
pub mod github;
pub mod normalize;
pub mod store;
pub mod sync;

pub use config::{RawConfig, RepoInfo, RunOptions};
pub use daemon::Daemon;
pub use error::{ConfigError, FetchError, SchedulingError, StoreError};
pub use github::{CommitLister, GitHubCommitLister, RawCommit};
pub use store::{CommitRecord, CommitStore};
pub use sync::{CycleOutcome, CycleSummary, SyncEngine};
