//! Configuration loading and validation.
//!
//! Raw config input is loosely typed: every field is optional and booleans
//! are kept as raw YAML values so the validator can distinguish "absent"
//! from "present but wrong type". Validation is a pure transform from
//! `RawConfig` plus hardcoded defaults into an immutable [`RunOptions`];
//! no partially-mutated default object is ever exposed.

use anyhow::{Context, Result};
use cron::Schedule;
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

use crate::error::{ConfigError, SchedulingError};

pub const DEFAULT_REPO: &str = "cs4550hw01";
pub const DEFAULT_OWNER: &str = "nakennedy11";
pub const DEFAULT_CRON_SCHEDULE: &str = "*/5 * * * *";
pub const DEFAULT_KV_FILENAME: &str = ".commitHistory.sqlite";
pub const DEFAULT_CLEAR_KV_ON_STARTUP: bool = true;
pub const DEFAULT_USE_GITHUB_TOKEN: bool = false;

/// The remote repository a run mirrors, sourced once from validated config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub owner: String,
    pub repo: String,
}

impl RepoInfo {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Raw, unvalidated configuration as read from the YAML file.
///
/// Booleans stay as `serde_yaml::Value` until validation so a present but
/// mistyped value can be rejected instead of silently coerced.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawConfig {
    pub repo: Option<String>,
    pub owner: Option<String>,
    pub cron_schedule: Option<String>,
    #[serde(alias = "kvPath")]
    pub kv_filename: Option<String>,
    pub clear_kv_on_startup: Option<serde_yaml::Value>,
    pub use_github_token: Option<serde_yaml::Value>,
}

/// Validated run configuration. Constructed once at startup, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOptions {
    pub repo: RepoInfo,
    pub cron_schedule: String,
    pub kv_filename: String,
    pub clear_kv_on_startup: bool,
    pub use_github_token: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            repo: RepoInfo {
                owner: DEFAULT_OWNER.to_string(),
                repo: DEFAULT_REPO.to_string(),
            },
            cron_schedule: DEFAULT_CRON_SCHEDULE.to_string(),
            kv_filename: DEFAULT_KV_FILENAME.to_string(),
            clear_kv_on_startup: DEFAULT_CLEAR_KV_ON_STARTUP,
            use_github_token: DEFAULT_USE_GITHUB_TOKEN,
        }
    }
}

impl RawConfig {
    /// Load raw configuration from a specific file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Load raw configuration from the default location, or fall back to an
    /// empty config (all defaults) when no file exists.
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            info!("No config file at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Get the default configuration file path (XDG compliant).
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("commitledger").join("config.yml"))
    }
}

/// Validate raw config field by field into a fully-populated [`RunOptions`].
///
/// Recoverable problems (bad cron expression, wrong store extension) fall
/// back to the default with a warning. A partially-specified repo/owner pair
/// or a mistyped boolean is a [`ConfigError`] and aborts startup.
pub fn validate(raw: RawConfig) -> Result<RunOptions, ConfigError> {
    let repo = validate_repo_pair(raw.owner, raw.repo)?;
    let cron_schedule = validate_cron_schedule(raw.cron_schedule);
    let kv_filename = validate_kv_filename(raw.kv_filename);
    let clear_kv_on_startup = validate_boolean(
        "clearKvOnStartup",
        raw.clear_kv_on_startup,
        DEFAULT_CLEAR_KV_ON_STARTUP,
    )?;
    let use_github_token = validate_boolean(
        "useGithubToken",
        raw.use_github_token,
        DEFAULT_USE_GITHUB_TOKEN,
    )?;

    Ok(RunOptions {
        repo,
        cron_schedule,
        kv_filename,
        clear_kv_on_startup,
        use_github_token,
    })
}

/// The pair is used only when both halves are present and non-empty; both
/// defaults are used together when both are absent. A custom owner is never
/// combined with a default repo or vice versa.
fn validate_repo_pair(
    owner: Option<String>,
    repo: Option<String>,
) -> Result<RepoInfo, ConfigError> {
    let owner = owner.filter(|s| !s.trim().is_empty());
    let repo = repo.filter(|s| !s.trim().is_empty());

    match (owner, repo) {
        (Some(owner), Some(repo)) => Ok(RepoInfo { owner, repo }),
        (None, None) => Ok(RepoInfo {
            owner: DEFAULT_OWNER.to_string(),
            repo: DEFAULT_REPO.to_string(),
        }),
        (Some(_), None) => Err(ConfigError::PartialRepoPair {
            present: "owner",
            missing: "repo",
        }),
        (None, Some(_)) => Err(ConfigError::PartialRepoPair {
            present: "repo",
            missing: "owner",
        }),
    }
}

fn validate_cron_schedule(schedule: Option<String>) -> String {
    match schedule {
        Some(expr) => match parse_schedule(&expr) {
            Ok(_) => expr,
            Err(e) => {
                warn!("{}; falling back to `{}`", e, DEFAULT_CRON_SCHEDULE);
                DEFAULT_CRON_SCHEDULE.to_string()
            }
        },
        None => DEFAULT_CRON_SCHEDULE.to_string(),
    }
}

fn validate_kv_filename(filename: Option<String>) -> String {
    match filename {
        Some(name) if !name.is_empty() && name.ends_with(".sqlite") => name,
        Some(name) => {
            warn!(
                "Store filename `{}` must end in .sqlite; falling back to `{}`",
                name, DEFAULT_KV_FILENAME
            );
            DEFAULT_KV_FILENAME.to_string()
        }
        None => DEFAULT_KV_FILENAME.to_string(),
    }
}

fn validate_boolean(
    field: &'static str,
    value: Option<serde_yaml::Value>,
    default: bool,
) -> Result<bool, ConfigError> {
    match value {
        None => Ok(default),
        Some(serde_yaml::Value::Bool(b)) => Ok(b),
        Some(other) => Err(ConfigError::InvalidBoolean {
            field,
            found: format!("{:?}", other),
        }),
    }
}

/// Parse a cron expression into a [`Schedule`].
///
/// The `cron` crate requires a seconds field, so classic five-field
/// expressions are normalized by prepending `0`.
pub fn parse_schedule(expression: &str) -> Result<Schedule, SchedulingError> {
    let normalized: Cow<str> = if expression.split_whitespace().count() == 5 {
        Cow::Owned(format!("0 {}", expression))
    } else {
        Cow::Borrowed(expression)
    };

    Schedule::from_str(&normalized).map_err(|source| SchedulingError {
        expression: expression.to_string(),
        source,
    })
}
