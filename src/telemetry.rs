use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. Call once at process start;
/// repeated calls (e.g. from parallel test binaries) are no-ops. Filtering
/// follows `RUST_LOG`, defaulting to `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
