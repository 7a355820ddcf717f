use tracing_subscriber::{EnvFilter, prelude::*};

/// Initializes the tracing subscriber shared by the binary.
///
/// `env_filter` uses the usual `tracing_subscriber::EnvFilter` syntax.
/// Panics are routed through tracing so they show up in the structured log
/// stream like every other error.
pub fn initialize(env_filter: &str) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(EnvFilter::new(env_filter)))
        .init();
    std::panic::set_hook(Box::new(tracing_panic_hook));
}

fn tracing_panic_hook(panic: &std::panic::PanicHookInfo) {
    tracing::error!("thread panicked: {panic}");
}
