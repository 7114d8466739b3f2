/// Tracing target the engine mirrors its log events to.
const ENGINE_EVENT_TARGET: &str = "sitemirror_core::progress";

pub(crate) fn no_color_env_requested() -> bool {
    std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty())
}

pub(crate) fn is_dumb_terminal() -> bool {
    std::env::var("TERM")
        .map(|value| value.eq_ignore_ascii_case("dumb"))
        .unwrap_or(false)
}

pub(crate) fn should_use_progress_bar(
    stderr_is_terminal: bool,
    quiet: bool,
    no_progress: bool,
    dumb_terminal: bool,
) -> bool {
    stderr_is_terminal && !quiet && !no_progress && !dumb_terminal
}

/// Filter used when `RUST_LOG` is unset.
///
/// Engine log events are already printed by the event renderer, so their
/// tracing mirror is switched off unless debugging.
pub(crate) fn default_filter_directive(default_level: &str) -> String {
    match default_level {
        "debug" | "trace" => default_level.to_string(),
        _ => format!("{default_level},{ENGINE_EVENT_TARGET}=off"),
    }
}

pub(crate) fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(default_filter_directive(default_level))
    });
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(!no_color_env_requested() && !is_dumb_terminal())
        .with_env_filter(filter)
        .try_init();
}
