//! GitHub API integration for listing repository commits.
//!
//! The sync engine talks to the remote through the [`CommitLister`] trait so
//! tests can substitute a fake upstream; [`GitHubCommitLister`] is the real
//! octocrab-backed implementation. Pagination is followed transparently and
//! the caller always sees one flat sequence of raw commits.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, info, warn};

use crate::config::{RepoInfo, RunOptions};
use crate::error::FetchError;

/// Environment variable consulted for the auth token.
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

const PER_PAGE: u8 = 100;

/// One commit as returned by the list-commits endpoint, prior to
/// normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCommit {
    pub sha: String,
    pub commit: RawCommitDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCommitDetail {
    #[serde(default)]
    pub message: String,
    pub author: Option<RawSignature>,
    pub committer: Option<RawSignature>,
}

/// Author or committer sub-record. Both fields are optional upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSignature {
    pub email: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// Capability to list commits for a repository, optionally filtered by a
/// minimum timestamp (inclusive, per the upstream `since` semantics).
#[async_trait]
pub trait CommitLister: Send + Sync {
    async fn list_commits(
        &self,
        repo: &RepoInfo,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawCommit>, FetchError>;
}

/// Live commit lister backed by the GitHub REST API.
pub struct GitHubCommitLister {
    client: Octocrab,
}

#[derive(Serialize)]
struct ListCommitsParams {
    per_page: u8,
    page: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    since: Option<String>,
}

impl GitHubCommitLister {
    /// Create a client, authenticated when a token is supplied.
    pub fn new(token: Option<String>) -> Result<Self> {
        let mut builder = Octocrab::builder();
        if let Some(token) = token {
            builder = builder.personal_token(token);
        }

        let client = builder.build().context("Failed to create GitHub client")?;
        Ok(Self { client })
    }

    /// Create a client against a custom API base URI (used by tests to point
    /// at a mock server).
    pub fn with_base_uri(base_uri: &str, token: Option<String>) -> Result<Self> {
        let mut builder = Octocrab::builder()
            .base_uri(base_uri)
            .context("Failed to set GitHub API base URI")?;
        if let Some(token) = token {
            builder = builder.personal_token(token);
        }

        let client = builder.build().context("Failed to create GitHub client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CommitLister for GitHubCommitLister {
    async fn list_commits(
        &self,
        repo: &RepoInfo,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawCommit>, FetchError> {
        let route = format!("/repos/{}/{}/commits", repo.owner, repo.repo);
        let since_param = since.map(|s| s.to_rfc3339_opts(SecondsFormat::Secs, true));

        let mut commits = Vec::new();
        let mut page: u8 = 1;

        loop {
            let params = ListCommitsParams {
                per_page: PER_PAGE,
                page,
                since: since_param.clone(),
            };

            let batch: Vec<RawCommit> = self
                .client
                .get(&route, Some(&params))
                .await
                .map_err(|source| FetchError::Page { page, source })?;

            let batch_len = batch.len();
            debug!(
                "Fetched page {} with {} commits for {}",
                page,
                batch_len,
                repo.full_name()
            );
            commits.extend(batch);

            // A short page is the last one.
            if batch_len < PER_PAGE as usize {
                break;
            }

            // GitHub API pagination limit for u8
            if page == u8::MAX {
                warn!(
                    "Reached maximum pagination limit (255 pages) for {}",
                    repo.full_name()
                );
                break;
            }
            page += 1;
        }

        match &since_param {
            Some(since) => info!(
                "Fetched {} commits for {} (incremental, since {})",
                commits.len(),
                repo.full_name(),
                since
            ),
            None => info!(
                "Fetched {} commits for {} (initial load)",
                commits.len(),
                repo.full_name()
            ),
        }

        Ok(commits)
    }
}

/// Resolve the auth token from the environment, only when the run options
/// request it. A missing variable is not an error: the caller gets an
/// unauthenticated client and lives with upstream rate limits.
pub fn resolve_token(options: &RunOptions) -> Option<String> {
    if !options.use_github_token {
        return None;
    }

    match env::var(TOKEN_ENV_VAR) {
        Ok(token) if !token.is_empty() => {
            debug!("Using auth token from {}", TOKEN_ENV_VAR);
            Some(token)
        }
        _ => {
            debug!(
                "{} not set, using unauthenticated client",
                TOKEN_ENV_VAR
            );
            None
        }
    }
}
