use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter directive; `RUST_LOG` overrides it.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "tierdca=debug,warn" } else { "tierdca=info,warn" }
}

/// Initialise the global tracing subscriber, writing compact lines to stderr.
///
/// A second call is a no-op.
pub fn init(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init();
}
