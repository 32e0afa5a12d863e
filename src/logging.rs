use tracing_subscriber::EnvFilter;

/// Initialize logging with a filter taken from the `TICKY_LOG` environment variable.
/// Defaults to `info` if the variable is not set or invalid. Logs go to stderr so
/// the board on stdout stays readable.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("TICKY_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
