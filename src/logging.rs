//! Logging backend wiring.
//!
//! The engine logs through the `log` facade only (see `set.rs`, `loader.rs`).
//! Installing a backend is left to each binary's `main`, the way `env_logger`
//! is meant to be used; this just centralizes the one call so both binaries
//! configure it identically.

/// Install `env_logger` as the `log` backend, honoring `RUST_LOG` and
/// defaulting to `info` so a freshly started supervisor is not silent.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
