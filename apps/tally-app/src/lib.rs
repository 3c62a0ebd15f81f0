//! # Tally App Library
//!
//! The operation surface the presentation layer talks to.
//!
//! ## Module Organization
//! ```text
//! tally_app/
//! ├── lib.rs          ◄─── You are here (tracing init)
//! ├── config.rs       ◄─── AppConfig: TOML file + TALLY_* environment
//! ├── state.rs        ◄─── AppState: Database + report offset
//! ├── error.rs        ◄─── ApiError, ApiResponse envelope
//! ├── commands/
//! │   ├── mod.rs      ◄─── Command enum, dispatch
//! │   ├── product.rs  ◄─── Product store commands
//! │   ├── bill.rs     ◄─── Bill and return commands
//! │   └── report.rs   ◄─── Report and snapshot commands
//! └── bridge.rs       ◄─── JSON-lines request/response loop
//! ```

pub mod bridge;
pub mod commands;
pub mod config;
pub mod error;
pub mod state;

use tracing_subscriber::EnvFilter;

pub use config::AppConfig;
pub use error::{ApiError, ApiResponse, ErrorCode};
pub use state::AppState;

/// Initializes the tracing subscriber for structured logging.
///
/// Logs go to stderr; stdout carries the bridge protocol.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=tally_db=trace` - Show trace for the database crate only
/// - Default: `info,tally=debug,sqlx=warn`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tally=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
