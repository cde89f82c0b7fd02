//! Trey CLI - run and simulate real-time Set sessions.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Trey - a real-time multi-player Set engine
#[derive(Parser, Debug)]
#[command(name = "trey")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single headless session with bot players
    Run {
        /// JSON config file (flags below override it)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of bot players
        #[arg(short, long)]
        players: Option<usize>,

        /// Round timer in ms (>0 countdown, 0 elapsed, <0 none)
        #[arg(short, long, allow_negative_numbers = true)]
        timeout: Option<i64>,

        /// Log a hint partway through each round
        #[arg(long)]
        hints: bool,

        /// Random seed (default: wall clock)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,

        /// Suppress the startup banner
        #[arg(short, long)]
        quiet: bool,
    },

    /// Run mass parallel sessions and aggregate statistics
    Simulate {
        /// Number of sessions to run (default: 100)
        #[arg(short, long, default_value = "100")]
        games: u64,

        /// JSON config file (flags below override it)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of bot players
        #[arg(short, long)]
        players: Option<usize>,

        /// Round timer in ms (>0 countdown, 0 elapsed, <0 none)
        #[arg(short, long, allow_negative_numbers = true)]
        timeout: Option<i64>,

        /// Starting seed (increments for each session)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Parallel threads (default: CPU count)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,

        /// Show progress bar
        #[arg(long)]
        progress: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Run {
            config,
            players,
            timeout,
            hints,
            seed,
            format,
            quiet,
        } => cli::run::execute(config, players, timeout, hints, seed, format, quiet),

        Commands::Simulate {
            games,
            config,
            players,
            timeout,
            seed,
            threads,
            format,
            progress,
        } => cli::simulate::execute(games, config, players, timeout, seed, threads, format, progress),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
