use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";

/// Human-readable logs on stderr so stdout stays machine-readable.
/// `RUST_LOG` overrides the default level.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
