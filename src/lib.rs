//! Version manager for Azure Functions Core Tools.
//!
//! Resolves version tokens against the release feed (or GitHub releases),
//! caches the matching archive under `~/.funcvm/download`, and decides which
//! cached version is active: `FUNCVM_CORE_TOOLS_VERSION` first, then a
//! `.func-version` file in the working directory, then the global pin.

pub mod arbiter;
pub mod cli;
pub mod config;
pub mod doctor;
pub mod download;
pub mod error;
pub mod feed;
pub mod install;
pub mod models;
pub mod platform;
pub mod shim;
pub mod store;
pub mod utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the stderr subscriber shared by both binaries. `RUST_LOG`
/// overrides the default `warn` level.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
