use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the process-wide `tracing` subscriber. Filter level is
/// controlled by `RUST_LOG`, falling back to `info` for the engine's own
/// crates and `warn` for dependencies.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,lapin=warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .init();
}
