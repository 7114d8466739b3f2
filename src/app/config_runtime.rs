use anyhow::Result;
use clap::{ArgMatches, CommandFactory, FromArgMatches, parser::ValueSource};

use crate::app::validation::ensure_backoff;
use crate::app_config::FileConfig;
use crate::cli::Args;

/// Which mergeable flags were given explicitly on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CliValueSources {
    pub(crate) concurrency: bool,
    pub(crate) max_retries: bool,
    pub(crate) backoff: bool,
    pub(crate) retry_jitter_ms: bool,
    pub(crate) timeout: bool,
    pub(crate) extensions: bool,
    pub(crate) all_files: bool,
    pub(crate) user_agent_preset: bool,
    pub(crate) user_agent: bool,
    pub(crate) referer: bool,
    pub(crate) dynamic_referer: bool,
    pub(crate) identity_encoding: bool,
    pub(crate) connection_close: bool,
    pub(crate) accept: bool,
    pub(crate) no_progress: bool,
}

pub(crate) fn parse_cli_with_sources() -> (Args, CliValueSources) {
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    (args, sources_from_matches(&matches))
}

fn sources_from_matches(matches: &ArgMatches) -> CliValueSources {
    CliValueSources {
        concurrency: is_commandline_value(matches, "concurrency"),
        max_retries: is_commandline_value(matches, "max_retries"),
        backoff: is_commandline_value(matches, "backoff"),
        retry_jitter_ms: is_commandline_value(matches, "retry_jitter_ms"),
        timeout: is_commandline_value(matches, "timeout"),
        extensions: is_commandline_value(matches, "extensions"),
        all_files: is_commandline_value(matches, "all_files"),
        user_agent_preset: is_commandline_value(matches, "user_agent_preset"),
        user_agent: is_commandline_value(matches, "user_agent"),
        referer: is_commandline_value(matches, "referer"),
        dynamic_referer: is_commandline_value(matches, "dynamic_referer"),
        identity_encoding: is_commandline_value(matches, "identity_encoding"),
        connection_close: is_commandline_value(matches, "connection_close"),
        accept: is_commandline_value(matches, "accept"),
        no_progress: is_commandline_value(matches, "no_progress"),
    }
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}

/// Fills every flag not given on the command line from the config file.
///
/// File headers are sent in addition to `-H` headers; a `-H` header with the
/// same name is appended after the file's, so it wins.
pub(crate) fn apply_config_defaults(
    mut args: Args,
    cli_sources: &CliValueSources,
    file_config: Option<&FileConfig>,
) -> Result<Args> {
    if let Some(file_config) = file_config {
        if !cli_sources.concurrency
            && let Some(concurrency) = file_config.concurrency
        {
            args.concurrency = concurrency;
        }

        if !cli_sources.max_retries
            && let Some(max_retries) = file_config.max_retries
        {
            args.max_retries = max_retries;
        }

        if !cli_sources.backoff
            && let Some(backoff) = file_config.backoff
        {
            args.backoff = backoff;
        }

        if !cli_sources.retry_jitter_ms
            && let Some(jitter) = file_config.retry_jitter_ms
        {
            args.retry_jitter_ms = jitter;
        }

        if !cli_sources.timeout
            && let Some(timeout) = file_config.timeout
        {
            args.timeout = timeout;
        }

        // --ext and --all-files are one choice; either on the CLI shadows both
        // file keys.
        if !cli_sources.extensions && !cli_sources.all_files {
            if let Some(extensions) = &file_config.extensions {
                args.extensions.clone_from(extensions);
            }
            if let Some(all_files) = file_config.all_files {
                args.all_files = all_files;
            }
        }

        if !cli_sources.user_agent_preset
            && let Some(preset) = file_config.user_agent_preset
        {
            args.user_agent_preset = preset;
        }

        if !cli_sources.user_agent
            && args.user_agent.is_none()
            && let Some(user_agent) = &file_config.user_agent
        {
            args.user_agent = Some(user_agent.clone());
        }

        // Referer mode is one choice as well.
        if !cli_sources.referer && !cli_sources.dynamic_referer {
            if let Some(referer) = &file_config.referer {
                args.referer = Some(referer.clone());
            }
            if let Some(dynamic) = file_config.dynamic_referer {
                args.dynamic_referer = dynamic;
            }
        }

        if !cli_sources.identity_encoding
            && let Some(identity) = file_config.identity_encoding
        {
            args.identity_encoding = identity;
        }

        if !cli_sources.connection_close
            && let Some(close) = file_config.connection_close
        {
            args.connection_close = close;
        }

        if !cli_sources.accept
            && args.accept.is_none()
            && let Some(accept) = &file_config.accept
        {
            args.accept = Some(accept.clone());
        }

        if !cli_sources.no_progress
            && let Some(no_progress) = file_config.no_progress
        {
            args.no_progress = no_progress;
        }

        if let Some(headers) = &file_config.headers {
            let mut merged: Vec<(String, String)> = headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            merged.append(&mut args.headers);
            args.headers = merged;
        }
    }

    ensure_backoff(args.backoff)?;
    Ok(args)
}

/// Default tracing level from `-q` / `-v`; `RUST_LOG` still overrides it.
pub(crate) fn resolve_default_log_level(args: &Args) -> &'static str {
    if args.quiet {
        return "error";
    }
    match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}
