//! Configuration lifecycle: load file config, merge CLI, build engine options.

use std::time::Duration;

use anyhow::Result;
use sitemirror_core::{ExtensionFilter, RefererMode, RequestOptions, UserAgentChoice};
use tracing::debug;

use crate::app::config_runtime::{self, CliValueSources};
use crate::app_config::load_file_config;
use crate::cli::Args;

/// Resolved configuration bundle for one run.
#[derive(Debug)]
pub(crate) struct ResolvedConfig {
    pub(crate) args: Args,
    /// File-only setting; the default retryable set when `None`.
    pub(crate) retryable_statuses: Option<Vec<u16>>,
}

/// Load file config, merge CLI overrides and validate the result.
pub(crate) fn resolve_config(args: Args, cli_sources: &CliValueSources) -> Result<ResolvedConfig> {
    let loaded = load_file_config(args.config.as_deref())?;
    match (&loaded.path, loaded.config.is_some()) {
        (Some(path), true) => debug!(path = %path.display(), "Loaded config file"),
        (Some(path), false) => debug!(path = %path.display(), "No config file found"),
        (None, _) => debug!("No config directory known"),
    }
    let retryable_statuses = loaded
        .config
        .as_ref()
        .and_then(|config| config.retryable_statuses.clone());
    let args = config_runtime::apply_config_defaults(args, cli_sources, loaded.config.as_ref())?;
    Ok(ResolvedConfig {
        args,
        retryable_statuses,
    })
}

impl ResolvedConfig {
    /// Typed request options for the engine's request policy.
    pub(crate) fn request_options(&self) -> RequestOptions {
        let args = &self.args;
        let user_agent = match &args.user_agent {
            Some(custom) => UserAgentChoice::Custom(custom.clone()),
            None => UserAgentChoice::Preset(args.user_agent_preset),
        };
        let referer = match (&args.referer, args.dynamic_referer) {
            (Some(url), _) => RefererMode::Fixed(url.clone()),
            (None, true) => RefererMode::Dynamic,
            (None, false) => RefererMode::None,
        };

        RequestOptions {
            user_agent,
            referer,
            identity_encoding: args.identity_encoding,
            connection_close: args.connection_close,
            accept: args.accept.clone(),
            extra_headers: args.headers.clone(),
            timeout: Duration::from_secs(args.timeout),
            max_retries: u32::from(args.max_retries),
            backoff_base: args.backoff,
            retry_jitter: Duration::from_millis(args.retry_jitter_ms),
            retryable_statuses: self.retryable_statuses.clone(),
        }
    }

    /// Which files under the local root are mirrored.
    pub(crate) fn extension_filter(&self) -> ExtensionFilter {
        if self.args.all_files {
            ExtensionFilter::accept_all()
        } else if self.args.extensions.is_empty() {
            ExtensionFilter::default()
        } else {
            ExtensionFilter::new(&self.args.extensions)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use clap::Parser;
    use sitemirror_core::UserAgentPreset;
    use tempfile::TempDir;

    use super::*;

    fn resolved(extra: &[&str]) -> ResolvedConfig {
        let argv: Vec<&str> = ["sitemirror", "./site", "https://h/site"]
            .into_iter()
            .chain(extra.iter().copied())
            .collect();
        ResolvedConfig {
            args: Args::try_parse_from(argv).unwrap(),
            retryable_statuses: None,
        }
    }

    #[test]
    fn test_request_options_defaults() {
        let options = resolved(&[]).request_options();
        assert_eq!(options.user_agent, UserAgentChoice::Preset(UserAgentPreset::Tool));
        assert_eq!(options.referer, RefererMode::None);
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert_eq!(options.max_retries, 3);
        assert_eq!(options.retry_jitter, Duration::ZERO);
        assert!(!options.identity_encoding);
        assert!(!options.connection_close);
    }

    #[test]
    fn test_request_options_retry_jitter_in_millis() {
        let options = resolved(&["--retry-jitter", "120"]).request_options();
        assert_eq!(options.retry_jitter, Duration::from_millis(120));
    }

    #[test]
    fn test_request_options_custom_user_agent_wins_over_preset() {
        let options = resolved(&["--user-agent-preset", "safari", "--user-agent", "MirrorBot/1"])
            .request_options();
        assert_eq!(options.user_agent, UserAgentChoice::Custom("MirrorBot/1".to_string()));
    }

    #[test]
    fn test_request_options_referer_modes() {
        assert_eq!(
            resolved(&["--referer", "https://h/"]).request_options().referer,
            RefererMode::Fixed("https://h/".to_string())
        );
        assert_eq!(
            resolved(&["--dynamic-referer"]).request_options().referer,
            RefererMode::Dynamic
        );
    }

    #[test]
    fn test_extension_filter_choices() {
        assert!(resolved(&["--all-files"]).extension_filter().accepts_all());
        assert_eq!(resolved(&[]).extension_filter(), ExtensionFilter::default());
        let filter = resolved(&["-e", "txt"]).extension_filter();
        assert!(filter.matches(Path::new("a.TXT")));
        assert!(!filter.matches(Path::new("a.png")));
    }

    #[test]
    fn test_resolve_config_reads_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("mirror.toml");
        fs::write(&path, "concurrency = 7\nretryable_statuses = [503]\n").unwrap();

        let args = Args::try_parse_from([
            "sitemirror",
            "./site",
            "https://h/site",
            "--config",
            path.to_str().unwrap(),
        ])
        .unwrap();
        let resolved = resolve_config(args, &CliValueSources::default()).unwrap();

        assert_eq!(resolved.args.concurrency, 7);
        assert_eq!(resolved.retryable_statuses, Some(vec![503]));
        assert_eq!(resolved.request_options().retryable_statuses, Some(vec![503]));
    }
}
