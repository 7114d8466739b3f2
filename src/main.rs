//! CLI entry point for sitemirror.

use std::process::ExitCode;

use anyhow::Result;

mod app;
mod app_config;
mod cli;

/// Process outcome mapped to an exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// The run finished; individual file failures are reported, not fatal.
    Success,
    /// Ctrl-C stopped dispatch before every file was attempted.
    Interrupted,
}

impl ProcessExit {
    fn code(self) -> ExitCode {
        match self {
            Self::Success => ExitCode::SUCCESS,
            Self::Interrupted => ExitCode::from(130),
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let exit = app::runtime::run_mirror().await?;
    Ok(exit.code())
}
