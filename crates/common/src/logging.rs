//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// Environment variable controlling the log filter.
pub const LOG_ENV: &str = "TYPEGEN_LOG";

/// Target prefix shared by every crate of the workspace.
const TARGET_PREFIX: &str = "typegen";

/// Install a stderr fmt subscriber.
///
/// `TYPEGEN_LOG` accepts a plain level ("debug") applied to the typegen
/// crates, or a full filter spec ("typegen_core=trace,typegen_cli=info").
/// `verbose` raises the default from `info` to `debug`.
pub fn init_tracing(verbose: bool) {
    let filter = filter_spec(std::env::var(LOG_ENV).ok().as_deref(), verbose);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(EnvFilter::new(filter));

    if tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        eprintln!("Warning: tracing subscriber already initialized");
    }
}

fn filter_spec(env: Option<&str>, verbose: bool) -> String {
    match env {
        Some(level) if is_plain_level(level) => format!("{TARGET_PREFIX}={level}"),
        Some(spec) if !spec.trim().is_empty() => spec.to_string(),
        _ if verbose => format!("{TARGET_PREFIX}=debug"),
        _ => format!("{TARGET_PREFIX}=info"),
    }
}

fn is_plain_level(s: &str) -> bool {
    matches!(
        s.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_spec() {
        assert_eq!(filter_spec(None, false), "typegen=info");
        assert_eq!(filter_spec(None, true), "typegen=debug");
        assert_eq!(filter_spec(Some("WARN"), true), "typegen=WARN");
        assert_eq!(filter_spec(Some("typegen_core=trace"), false), "typegen_core=trace");
        assert_eq!(filter_spec(Some("  "), false), "typegen=info");
    }
}
