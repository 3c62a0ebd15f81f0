//! # Tally Entry Point
//!
//! ## Startup Sequence
//! 1. Initialize tracing (stderr)
//! 2. Load configuration (`--config <path>`, `TALLY_CONFIG`, platform dir)
//! 3. Connect to database & run migrations
//! 4. Serve JSON-lines requests from stdin until it closes
//!
//! ```bash
//! echo '{"command":"listProducts"}' | tally --config ./tally.toml
//! ```

use std::env;
use std::path::PathBuf;

use tally_app::{bridge, init_tracing, AppConfig, AppState};
use tokio::io::BufReader;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally command bridge");
                println!();
                println!("Usage: tally [OPTIONS]");
                println!();
                println!("Reads one JSON command per line from stdin and writes one");
                println!("JSON result per line to stdout.");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>  Config file (default: platform config dir)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    init_tracing();
    info!("Starting Tally");

    let config = AppConfig::load(config_path)?;
    let state = AppState::open(&config).await?;
    info!("Database connected and migrations applied");

    let stdin = BufReader::new(tokio::io::stdin());
    bridge::serve(&state, stdin, tokio::io::stdout()).await?;

    state.db().close().await;
    Ok(())
}
