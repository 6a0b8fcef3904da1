use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::ConfigOverrides;

#[derive(Parser, Debug)]
#[command(name = "stock-ranking")]
#[command(about = "Rank securities by daily return using batched quote requests")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// JSON configuration file; builtin defaults are used when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// CSV file with one ticker symbol per row
    #[arg(short, long, global = true, default_value = "assets/symbols/sample.csv")]
    pub symbols: PathBuf,

    /// Report file, overriding the configured path
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Symbols per request
    #[arg(long, global = true)]
    pub batch_size: Option<usize>,

    /// Maximum number of requests in flight
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Stop waiting for outstanding requests after this many seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Fetch quotes, rank by daily return and write the report (default)
    Rank,
    /// Print the batch plan and request URLs without fetching
    Plan,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Rank)
    }

    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            batch_size: self.batch_size,
            concurrency: self.concurrency,
            overall_timeout_secs: self.timeout,
            report_path: self.output.clone(),
        }
    }
}
