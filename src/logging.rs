//! Structured logging bootstrap.
//!
//! Initializes a `tracing-subscriber` formatting layer honoring `RUST_LOG`
//! (defaulting to `info`), the same convention the rest of the corpus uses.

pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
