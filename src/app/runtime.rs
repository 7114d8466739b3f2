use std::io::{self, IsTerminal};

use anyhow::{Context, Result};
use sitemirror_core::{MirrorEngine, MirrorJob, RequestPolicy, RunHandle, RunSummary};
use tracing::{debug, info, warn};

use crate::ProcessExit;
use crate::app::progress_manager::{self, RenderOptions};
use crate::app::{config_manager, config_runtime, terminal};

pub(crate) async fn run_mirror() -> Result<ProcessExit> {
    let (args, cli_sources) = config_runtime::parse_cli_with_sources();

    terminal::init_tracing(config_runtime::resolve_default_log_level(&args));
    debug!(?args, "CLI arguments parsed");

    let resolved = config_manager::resolve_config(args, &cli_sources)?;
    let policy = RequestPolicy::from_options(&resolved.request_options())
        .context("Invalid request options")?;
    let job = MirrorJob::new(
        &resolved.args.local_root,
        &resolved.args.remote_root,
        resolved.extension_filter(),
    )?;
    let concurrency = usize::from(resolved.args.concurrency);
    let engine = MirrorEngine::new(concurrency, policy)?;

    info!(
        local_root = %job.local_root().display(),
        remote_root = job.remote_root(),
        concurrency,
        "Sitemirror starting"
    );

    let RunHandle {
        events,
        cancel,
        join,
    } = engine.spawn(job);

    let cancel_on_signal = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing in-flight downloads");
            cancel_on_signal.cancel();
        }
    });

    let renderer = progress_manager::spawn_event_renderer(
        events,
        RenderOptions {
            progress_bar: terminal::should_use_progress_bar(
                io::stderr().is_terminal(),
                resolved.args.quiet,
                resolved.args.no_progress,
                terminal::is_dumb_terminal(),
            ),
            quiet: resolved.args.quiet,
            slot_count: concurrency,
        },
    );

    let summary = join.await.context("Mirror run terminated abnormally")?;
    let _ = renderer.await;
    signal_task.abort();

    info!(
        completed = summary.completed,
        failed = summary.failed(),
        skipped = summary.skipped,
        total = summary.total,
        "Mirror complete"
    );

    if resolved.args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if !resolved.args.quiet {
        print_summary(&summary);
    }

    if cancel.is_cancelled() {
        warn!(
            completed = summary.completed,
            skipped = summary.skipped,
            "Interrupted. Run again to refresh the remaining files."
        );
        return Ok(ProcessExit::Interrupted);
    }

    Ok(ProcessExit::Success)
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Refreshed {}/{} file(s) ({}%), {} byte(s) written",
        summary.completed, summary.total, summary.percent, summary.bytes_written
    );
    if summary.failed() > 0 {
        println!(
            "  {} HTTP failure(s), {} transport failure(s), {} unexpected error(s)",
            summary.http_failures, summary.transport_failures, summary.unhandled
        );
    }
    if summary.skipped > 0 {
        println!("  {} file(s) skipped after interrupt", summary.skipped);
    }
}
