//! # EP-Simulator
//!
//! The main binary for the EP-Simulator assessment service.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for records, lifecycle and scoring
//! - Audio analysis of stored recordings
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      apps/epsim (THE BINARY)                    │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐     │
//! │  │   CLI       │    │   HTTP API  │    │  Audio Pipeline  │     │
//! │  │  (clap)     │    │   (axum)    │    │ (hound, reqwest) │     │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘     │
//! │         │                  │                    │               │
//! │         └──────────────────┼────────────────────┘               │
//! │                            ▼                                    │
//! │                    ┌───────────────┐                            │
//! │                    │  epsim-core   │                            │
//! │                    │ (THE LOGIC)   │                            │
//! │                    └───────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! epsim server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! epsim user add -e examiner@ep.sim -n "Examiner" -r examiner
//! epsim --actor 2 assessment create -t "OPI practice"
//! epsim status
//! ```

use clap::Parser;
use epsim::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // EPSIM_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("EPSIM_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "epsim=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ███████╗██████╗       ███████╗██╗███╗   ███╗
  ██╔════╝██╔══██╗      ██╔════╝██║████╗ ████║
  █████╗  ██████╔╝█████╗███████╗██║██╔████╔██║
  ██╔══╝  ██╔═══╝ ╚════╝╚════██║██║██║╚██╔╝██║
  ███████╗██║           ███████║██║██║ ╚═╝ ██║
  ╚══════╝╚═╝           ╚══════╝╚═╝╚═╝     ╚═╝

  ICAO English Proficiency Simulator v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
