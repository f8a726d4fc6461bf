//! Lifecycle bootstrap and the scheduling loop.
//!
//! Startup order matters: the optional store purge runs before any store
//! handle is opened, then the token is resolved and the client and store
//! are built. The first cycle runs synchronously at startup; after that the
//! engine is re-triggered on every cron tick until the process is
//! externally terminated.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::{parse_schedule, RunOptions};
use crate::github::{resolve_token, GitHubCommitLister};
use crate::store::{purge_store_files, CommitStore};
use crate::sync::{CycleOutcome, CycleSummary, SyncEngine};

pub struct Daemon {
    options: Arc<RunOptions>,
    engine: SyncEngine,
}

impl Daemon {
    /// Bootstrap: purge (if configured), resolve the token, build the
    /// client, open the store. Purge and store-open failures are fatal.
    pub fn new(options: RunOptions) -> Result<Self> {
        let options = Arc::new(options);
        let store_path = resolve_store_path(&options)?;

        if options.clear_kv_on_startup {
            info!("Clearing store files at {}", store_path.display());
            purge_store_files(&store_path).context("Failed to clear store on startup")?;
        }

        let token = resolve_token(&options);
        let lister = Arc::new(GitHubCommitLister::new(token)?);
        let store = CommitStore::open_at(&store_path).context("Failed to open commit store")?;

        let engine = SyncEngine::new(options.clone(), lister, store);

        Ok(Self { options, engine })
    }

    /// Run one initial cycle, then re-trigger on every cron tick. Per-cycle
    /// errors are logged and the next trigger is awaited; only Ctrl+C (or
    /// external termination) ends the loop.
    pub async fn run(&self) -> Result<()> {
        info!(
            "Mirroring {} on schedule `{}`",
            self.options.repo.full_name(),
            self.options.cron_schedule
        );

        // Initial synchronous cycle, before the first scheduled trigger.
        if let Err(e) = self.engine.run_cycle().await {
            error!("Initial sync cycle failed: {:?}", e);
        }

        let schedule = parse_schedule(&self.options.cron_schedule)
            .context("Validated cron schedule failed to parse")?;

        loop {
            let Some(next_tick) = schedule.upcoming(Utc).next() else {
                // A schedule with no future ticks cannot drive the loop.
                info!("Cron schedule has no upcoming ticks, exiting");
                return Ok(());
            };

            let wait = (next_tick - Utc::now())
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);
            debug!("Next sync trigger at {} (in {:?})", next_tick, wait);

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received, stopping");
                    return Ok(());
                }
                _ = tokio::time::sleep(wait) => {
                    match self.engine.try_cycle().await {
                        Ok(CycleOutcome::Completed(_)) => {}
                        Ok(CycleOutcome::Skipped) => {}
                        Err(e) => {
                            // Cycle-aborting, not fatal: retried from the
                            // same watermark on the next trigger.
                            error!("Sync cycle failed: {:?}", e);
                        }
                    }
                }
            }
        }
    }

    /// Run a single cycle and return its summary (the `once` subcommand).
    pub async fn run_once(&self) -> Result<CycleSummary> {
        self.engine.run_cycle().await
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }
}

/// Resolve the configured store filename to a concrete path, expanding
/// `~` and environment variables.
fn resolve_store_path(options: &RunOptions) -> Result<PathBuf> {
    let expanded = shellexpand::full(&options.kv_filename)
        .context("Failed to expand store file path")?;

    Ok(PathBuf::from(expanded.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn options_with_store(path: &std::path::Path, clear: bool) -> RunOptions {
        RunOptions {
            kv_filename: path.to_string_lossy().into_owned(),
            clear_kv_on_startup: clear,
            ..RunOptions::default()
        }
    }

    #[tokio::test]
    async fn test_bootstrap_purges_before_open() {
        let temp_dir = TempDir::new().unwrap();
        let store_path = temp_dir.path().join("history.sqlite");

        std::fs::write(&store_path, b"stale").unwrap();
        std::fs::write(temp_dir.path().join("history.sqlite-wal"), b"stale").unwrap();

        let daemon = Daemon::new(options_with_store(&store_path, true)).unwrap();

        // Companion file is gone and the store was recreated fresh.
        assert!(!temp_dir.path().join("history.sqlite-wal").exists());
        let repository = daemon.engine().options().repo.full_name();
        assert_eq!(daemon.engine().store().count(&repository).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bootstrap_preserves_store_when_clear_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let store_path = temp_dir.path().join("history.sqlite");

        {
            let store = CommitStore::open_at(&store_path).unwrap();
            store
                .put(
                    "nakennedy11/cs4550hw01",
                    &crate::store::CommitRecord {
                        sha: "abc".to_string(),
                        timestamp: None,
                        message: "kept".to_string(),
                        email: None,
                    },
                )
                .unwrap();
        }

        let daemon = Daemon::new(options_with_store(&store_path, false)).unwrap();

        let repository = daemon.engine().options().repo.full_name();
        assert_eq!(daemon.engine().store().count(&repository).unwrap(), 1);
    }

    #[test]
    fn test_store_path_expansion() {
        std::env::set_var("COMMITLEDGER_TEST_DIR", "/test/dir");

        let options = RunOptions {
            kv_filename: "${COMMITLEDGER_TEST_DIR}/history.sqlite".to_string(),
            ..RunOptions::default()
        };

        let path = resolve_store_path(&options).unwrap();
        assert_eq!(path, PathBuf::from("/test/dir/history.sqlite"));

        std::env::remove_var("COMMITLEDGER_TEST_DIR");
    }
}
