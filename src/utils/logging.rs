use tracing_subscriber::EnvFilter;

/// Normalize a configured level name. Unknown names fall back to `info`.
pub fn level_name(level: &str) -> &'static str {
    match level.trim().to_lowercase().as_str() {
        "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    }
}

/// Filter for the subscriber: `RUST_LOG` when it is set and parses,
/// otherwise the configured `default_level`.
pub fn filter(default_level: &str) -> EnvFilter {
    match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .unwrap_or_else(|_| EnvFilter::new(level_name(default_level))),
        _ => EnvFilter::new(level_name(default_level)),
    }
}

/// Install the fmt subscriber for the broker and the bridge binary.
pub fn init(default_level: &str) {
    // try_init: tests call this repeatedly
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .with_target(false)
        .try_init();
}
