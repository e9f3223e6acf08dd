//! Topic detection and tracking
//!
//! # Usage
//!
//! ```bash
//! tdt run --input DIR --begin 2023-01-01 --end 2023-01-07 [--force]
//! tdt consolidate --all-dates
//! tdt retrieve --all-dates --query storm coast
//! tdt admin stats
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/tdt/config.toml)
//! 3. Environment variables (TDT_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use tdt_cli::{
    consolidate, describe_retrieval, describe_session, handle_admin, init_logging,
    interrupt_token, load_settings, retrieve, run_window, Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(
        cli.config.as_deref(),
        cli.db_path.as_deref(),
        cli.log_level.as_deref(),
    )?;
    init_logging(&settings)?;

    match cli.command {
        Commands::Run {
            input,
            window,
            force,
        } => {
            let scope = window.scope()?;
            let (outcome, diagnostics) =
                run_window(settings, input, scope, force, interrupt_token()).await?;
            for diagnostic in &diagnostics {
                println!("{}", diagnostic);
            }
            println!("{}", describe_session(&scope, &outcome));
        }
        Commands::Consolidate { window } => {
            let scope = window.scope()?;
            let (report, diagnostics) = consolidate(settings, scope, interrupt_token()).await?;
            for diagnostic in &diagnostics {
                println!("{}", diagnostic);
            }
            println!(
                "Consolidated {} windows of {} ({} skipped)",
                report.merged.len(),
                scope,
                report.skipped.len()
            );
        }
        Commands::Retrieve {
            window,
            query,
            core,
            alpha,
        } => {
            let scope = window.scope()?;
            if let Some(core) = core {
                settings.retrieval.core_number = core;
            }
            if let Some(alpha) = alpha {
                settings.retrieval.alpha = alpha;
            }
            let (outcome, docs) = retrieve(settings, scope, query, interrupt_token()).await?;
            println!("{}", describe_retrieval(&outcome, &docs));
        }
        Commands::Admin { command } => {
            handle_admin(&settings, command)?;
        }
    }

    Ok(())
}
