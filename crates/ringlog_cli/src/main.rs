//! Ringlog CLI
//!
//! Command-line entry point for the ringlog server and its data file.
//!
//! # Commands
//!
//! - `serve` - Run the line-protocol server
//! - `write` - Write a string to a file
//! - `dump` - Print the records retained in a data file
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use ringlog_core::DEFAULT_CAPACITY;
use ringlog_server::DEFAULT_BIND_ADDR;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Bounded record log server and tools.
#[derive(Parser)]
#[command(name = "ringlog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the line-protocol server
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = DEFAULT_BIND_ADDR)]
        bind: SocketAddr,

        /// Data file mirroring the log
        #[arg(short, long)]
        data_file: Option<PathBuf>,

        /// Keep the log in memory only
        #[arg(long, conflicts_with = "data_file")]
        in_memory: bool,

        /// Keep the data file after shutdown
        #[arg(long)]
        keep_data: bool,

        /// Number of records retained
        #[arg(short, long, default_value_t = DEFAULT_CAPACITY)]
        capacity: usize,

        /// Bytes requested per socket receive
        #[arg(long, default_value_t = 1024)]
        chunk_size: usize,

        /// Maximum concurrent sessions
        #[arg(long, default_value_t = 1000)]
        max_sessions: usize,
    },

    /// Write a string to a file, replacing its contents
    Write {
        /// File to write
        file: PathBuf,

        /// Text to write
        text: String,
    },

    /// Print the records retained in a data file
    Dump {
        /// Data file to read
        #[arg(short, long)]
        data_file: PathBuf,

        /// Number of records the ring retains
        #[arg(short, long, default_value_t = DEFAULT_CAPACITY)]
        capacity: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG overrides the default level
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            bind,
            data_file,
            in_memory,
            keep_data,
            capacity,
            chunk_size,
            max_sessions,
        } => {
            let options = commands::serve::ServeOptions {
                bind,
                data_file,
                in_memory,
                keep_data,
                capacity,
                chunk_size,
                max_sessions,
            };
            commands::serve::run(options)?;
        }
        Commands::Write { file, text } => {
            commands::write::run(&file, &text)?;
        }
        Commands::Dump {
            data_file,
            capacity,
            format,
        } => {
            commands::dump::run(&data_file, capacity, &format)?;
        }
        Commands::Version => {
            println!("ringlog CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("ringlog core v{}", ringlog_core::VERSION);
        }
    }

    Ok(())
}
