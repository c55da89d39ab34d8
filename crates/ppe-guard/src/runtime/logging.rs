use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "info,ppe_guard=debug,interlock_core=debug,ppe_io=debug";

/// Initialize the tracing subscriber with optional JSON output.
///
/// `log` records from the interlock core land in the same subscriber.
/// Output goes to stderr; stdout is reserved for `--capture-only` and
/// `--detect-once` results. Calling this twice keeps the first subscriber.
pub fn init_tracing(json_output: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = if json_output {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().pretty().with_writer(std::io::stderr).boxed()
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
    {
        eprintln!("tracing already initialised: {}", e);
    }
}
