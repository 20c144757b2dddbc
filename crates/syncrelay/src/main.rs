// SPDX-FileCopyrightText: 2026 Syncrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Syncrelay - cross-platform channel sync and publication scheduler.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod dispatcher;
mod serve;
mod shutdown;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use syncrelay_config::model::SyncRelayConfig;

/// Syncrelay - mirror channels across platforms and run scheduled publications.
#[derive(Parser, Debug)]
#[command(name = "syncrelay", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the sync retry sweeper and the publication scheduler.
    Serve,
    /// Validate the configuration and exit.
    CheckConfig,
    /// Show adapter health and queue counts.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> SyncRelayConfig {
    let loaded = match path {
        Some(path) => syncrelay_config::load_and_validate_path(path),
        None => syncrelay_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            syncrelay_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::CheckConfig) => {
            println!(
                "syncrelay: config ok (service.name={}, database={})",
                config.service.name, config.storage.database_path
            );
            Ok(())
        }
        Some(Commands::Status { json }) => status::run_status(&config, json).await,
        None => {
            println!("syncrelay: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
