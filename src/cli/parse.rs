//! CLI parse: clap types for proscope. No behavior; definitions only.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// proscope CLI - scoped progress reporting for parallel work
#[derive(Parser)]
#[command(name = "proscope")]
#[command(about = "Scoped progress reporting for parallel computations")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory (for config/config.toml)
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a simulated parallel workload inside a progress scope
    Run {
        /// Steps per worker
        #[arg(long, default_value = "100")]
        steps: u64,
        /// Number of concurrent workers
        #[arg(long, default_value = "4")]
        workers: usize,
        /// Simulated work per step in milliseconds
        #[arg(long, default_value = "10")]
        delay_ms: u64,
        /// Aggregation strategy (first-only, sum-all, weighted)
        #[arg(long)]
        strategy: Option<String>,
        /// Handler to use instead of the configured ones (repeatable)
        #[arg(long = "handler")]
        handlers: Vec<String>,
        /// Share one signaler across all workers instead of one per worker
        #[arg(long)]
        shared: bool,
        /// Make the first worker fail after this many steps
        #[arg(long)]
        fail_at: Option<u64>,
        /// Run workers as tokio tasks instead of threads
        #[arg(long)]
        tokio: bool,
        /// Output format for the final report (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the handlers a scope would use by default
    Handlers {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}
