use tracing_subscriber::EnvFilter;

/// Environment variable read for the log filter before falling back to `RUST_LOG`
const LOG_ENV: &str = "PVDASH_LOG";

/// Install the stderr subscriber. `--debug` overrides any environment filter.
pub(crate) fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("pvdash=debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // A second init (tests, repeated calls) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
