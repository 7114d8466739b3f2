//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use crate::app::validation::parse_header_arg;
use sitemirror_core::UserAgentPreset;
use sitemirror_core::download::constants::{
    DEFAULT_BACKOFF_BASE, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS, MAX_RETRY_JITTER_MS,
};
use sitemirror_core::download::DEFAULT_CONCURRENCY;

/// Refresh a local directory tree from a remote HTTP server.
///
/// Every allowed file under LOCAL_ROOT is fetched again from the same relative
/// path under REMOTE_ROOT and overwritten in place.
#[derive(Parser, Debug)]
#[command(name = "sitemirror")]
#[command(author, version, about)]
pub struct Args {
    /// Local directory to refresh
    pub local_root: PathBuf,

    /// Remote base URL matching LOCAL_ROOT (http or https)
    pub remote_root: String,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of parallel download slots (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// Retries after the first attempt for transient failures (0-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: u8,

    /// Backoff base in seconds; retry n waits backoff * 2^n
    #[arg(long, default_value_t = DEFAULT_BACKOFF_BASE)]
    pub backoff: f64,

    /// Random extra delay of up to this many milliseconds per retry (0-10000)
    #[arg(long = "retry-jitter", value_name = "MS", default_value_t = 0, value_parser = clap::value_parser!(u64).range(0..=MAX_RETRY_JITTER_MS))]
    pub retry_jitter_ms: u64,

    /// Connect and read timeout per request in seconds (1-3600)
    #[arg(short = 't', long, default_value_t = DEFAULT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: u64,

    /// File extension to mirror (repeatable; defaults to common image types)
    #[arg(short = 'e', long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Mirror every file regardless of extension
    #[arg(long, conflicts_with = "extensions")]
    pub all_files: bool,

    /// Built-in User-Agent to send
    #[arg(long, value_name = "PRESET", default_value_t = UserAgentPreset::Tool)]
    pub user_agent_preset: UserAgentPreset,

    /// Literal User-Agent value (overrides --user-agent-preset)
    #[arg(long, value_name = "VALUE")]
    pub user_agent: Option<String>,

    /// Send this Referer on every request
    #[arg(long, value_name = "URL", conflicts_with = "dynamic_referer")]
    pub referer: Option<String>,

    /// Send the parent directory of each URL as its Referer
    #[arg(long)]
    pub dynamic_referer: bool,

    /// Request uncompressed bodies (Accept-Encoding: identity)
    #[arg(long)]
    pub identity_encoding: bool,

    /// Close the connection after every request
    #[arg(long)]
    pub connection_close: bool,

    /// Extra request header as "Name: Value" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER", value_parser = parse_header_arg)]
    pub headers: Vec<(String, String)>,

    /// Accept header value
    #[arg(long, value_name = "VALUE")]
    pub accept: Option<String>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Disable the progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Config file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}
