mod app;
mod config;
mod logging;
mod settings;
mod telemetry;

pub use app::run_from_args;
