use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the JSON log subscriber.
///
/// The level is taken from `RUST_LOG` (default `info`). Records emitted via
/// the `log` facade, such as the request logger's, are bridged into the same
/// subscriber.
pub fn init_telemetry() {
    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json();

    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(formatting_layer)
        .init();
}

/// Best-effort subscriber for tests; a second call is a no-op.
pub fn init_test_telemetry() {
    if std::env::var("TEST_LOG").is_err() {
        return;
    }

    let _ = tracing_subscriber::registry()
        .with(env_filter("debug"))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
