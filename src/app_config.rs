//! Application configuration loading for CLI defaults.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use sitemirror_core::UserAgentPreset;
use sitemirror_core::download::constants::MAX_RETRY_JITTER_MS;

/// TOML-backed file configuration for sitemirror defaults.
///
/// Every key is optional; keys set on the command line win.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Default number of slots (same range as CLI).
    pub concurrency: Option<u8>,
    /// Default retries after the first attempt.
    pub max_retries: Option<u8>,
    /// Backoff base in seconds.
    pub backoff: Option<f64>,
    /// Upper bound of the random delay added to each retry, in milliseconds.
    pub retry_jitter_ms: Option<u64>,
    /// Connect and read timeout in seconds.
    pub timeout: Option<u64>,
    /// Extension allow-list.
    pub extensions: Option<Vec<String>>,
    /// Mirror every file regardless of extension.
    pub all_files: Option<bool>,
    pub user_agent_preset: Option<UserAgentPreset>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub dynamic_referer: Option<bool>,
    pub identity_encoding: Option<bool>,
    pub connection_close: Option<bool>,
    pub accept: Option<String>,
    /// Static headers sent with every request.
    pub headers: Option<BTreeMap<String, String>>,
    /// Statuses that are retried instead of failing immediately.
    pub retryable_statuses: Option<Vec<u16>>,
    pub no_progress: Option<bool>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=100).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=100");
        }

        if let Some(max_retries) = self.max_retries
            && max_retries > 10
        {
            bail!("Invalid config value for `max_retries`: {max_retries}. Expected range: 0..=10");
        }

        if let Some(backoff) = self.backoff
            && (!backoff.is_finite() || backoff < 0.0)
        {
            bail!("Invalid config value for `backoff`: {backoff}. Expected a non-negative number");
        }

        if let Some(jitter) = self.retry_jitter_ms
            && jitter > MAX_RETRY_JITTER_MS
        {
            bail!(
                "Invalid config value for `retry_jitter_ms`: {jitter}. Expected range: 0..={MAX_RETRY_JITTER_MS}"
            );
        }

        if let Some(timeout) = self.timeout
            && !(1..=3600).contains(&timeout)
        {
            bail!("Invalid config value for `timeout`: {timeout}. Expected range: 1..=3600");
        }

        if self.referer.is_some() && self.dynamic_referer == Some(true) {
            bail!("Config sets both `referer` and `dynamic_referer = true`; choose one");
        }

        if let Some(statuses) = &self.retryable_statuses
            && let Some(bad) = statuses.iter().find(|s| !(100..=599).contains(*s))
        {
            bail!("Invalid config value in `retryable_statuses`: {bad}. Expected HTTP status 100..=599");
        }

        Ok(())
    }
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/sitemirror/config.toml`
/// 2. `$HOME/.config/sitemirror/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("sitemirror")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("sitemirror")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from `explicit` if given, otherwise from the default path if
/// present.
///
/// An explicit path that does not exist is an error; a missing default file
/// is not.
pub fn load_file_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        if !path.is_file() {
            bail!("Config file '{}' does not exist", path.display());
        }
        let config = read_config_file(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(read_config_file(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn read_config_file(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

pub(crate) fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}
