//! CLI argument parsing for `tdt`.
//!
//! Flags override every other configuration source.

use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use tdt_types::Scope;

/// Topic detection and tracking
///
/// Builds term graphs over dated document windows, extracts topical facets
/// and retrieves the documents a query is about.
#[derive(Parser, Debug)]
#[command(name = "tdt")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/tdt/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override database path
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Date window selection shared by several commands.
#[derive(Args, Debug, Clone)]
pub struct WindowArgs {
    /// First day of the window (YYYY-MM-DD)
    #[arg(long, requires = "end", conflicts_with = "all_dates")]
    pub begin: Option<NaiveDate>,

    /// Last day of the window (YYYY-MM-DD)
    #[arg(long, requires = "begin", conflicts_with = "all_dates")]
    pub end: Option<NaiveDate>,

    /// Use every date
    #[arg(long)]
    pub all_dates: bool,
}

impl WindowArgs {
    /// Scope named by the flags.
    pub fn scope(&self) -> Result<Scope> {
        match (self.begin, self.end, self.all_dates) {
            (Some(begin), Some(end), false) => Ok(Scope::range(begin, end)),
            (None, None, true) => Ok(Scope::AllDates),
            _ => bail!("Give either --begin and --end, or --all-dates"),
        }
    }
}

/// Commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process the token files of one window
    Run {
        /// Directory of tokenized documents
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        window: WindowArgs,

        /// Reprocess a window that already finished
        #[arg(long)]
        force: bool,
    },

    /// Merge the facets of every window inside a task scope
    Consolidate {
        #[command(flatten)]
        window: WindowArgs,
    },

    /// Retrieve the documents a query is about
    Retrieve {
        #[command(flatten)]
        window: WindowArgs,

        /// Query terms
        #[arg(short, long, num_args = 1.., required = true)]
        query: Vec<String>,

        /// Override the core number
        #[arg(long)]
        core: Option<u32>,

        /// Override the vertex/walk blend
        #[arg(long)]
        alpha: Option<f64>,
    },

    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

/// Admin subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum AdminCommands {
    /// Show database statistics
    Stats,

    /// Trigger RocksDB compaction
    Compact {
        /// Compact only specific column family
        #[arg(long)]
        cf: Option<String>,
    },
}
