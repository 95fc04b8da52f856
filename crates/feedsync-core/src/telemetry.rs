//! Tracing setup shared by feedsync binaries.
//!
//! Call [`init_tracing`] once at program start. Later calls are ignored
//! because the global subscriber can only be set once per process.

use tracing::{Level, Span};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber.
///
/// * `json`: emit newline-delimited JSON log lines, one object per event,
///   with the current action span's fields attached.
/// * `level`: verbosity used when `RUST_LOG` is not set.
///
/// `RUST_LOG` takes precedence and accepts per-target directives, so
/// `RUST_LOG=feedsync_core=debug,feedsync_plugins=warn` turns on engine
/// debug output while keeping observer noise down. Without it every target
/// logs at `level`. Targets are left out of the formatted lines; the
/// `feedsync.action` span already says which action an event belongs to.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .ok();
    }
}

/// Span wrapping one action execution.
pub fn action_span(action: &str, action_type: &str) -> Span {
    tracing::info_span!(
        "feedsync.action",
        action = %action,
        action_type = %action_type.to_ascii_lowercase(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing(false, Level::DEBUG);
        init_tracing(true, Level::INFO);
    }

    #[test]
    fn test_action_span_builds_without_subscriber() {
        let span = action_span("mirror", "Sync");
        let _entered = span.enter();
    }
}
