//! AgroSync CLI
//!
//! Command-line tools for inspecting an AgroSync file store.
//!
//! # Commands
//!
//! - `inspect` - Per-collection record, unsynced and tombstone counts
//! - `verify` - Find records the push engine would self-heal
//! - `dump` - Print a collection as JSON lines

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// AgroSync command-line store tools.
#[derive(Parser)]
#[command(name = "agrosync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display per-collection statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Report records with malformed identifiers
    Verify,

    /// Print the records of a collection as JSON lines
    Dump {
        /// Collection name
        collection: String,

        /// Only records not yet pushed
        #[arg(short, long)]
        unsynced: bool,

        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Store path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Store path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Dump {
            collection,
            unsynced,
            limit,
        } => {
            let path = cli.path.ok_or("Store path required for dump")?;
            commands::dump::run(&path, &collection, unsynced, limit)?;
        }
        Commands::Version => commands::version::run(),
    }

    Ok(())
}
