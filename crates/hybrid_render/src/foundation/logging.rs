//! Logging utilities
//!
//! All pipeline code reports through the `log` facade. Failures inside a
//! frame are never propagated as errors; this side channel is the only place
//! they surface.

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize logging with an explicit default filter (e.g. `"info"` or
/// `"hybrid_render=trace"`). `RUST_LOG` still overrides it.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_with_level(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("Logger already initialised, ignoring level '{level}'");
    }
}
