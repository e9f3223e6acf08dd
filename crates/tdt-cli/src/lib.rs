//! `tdt` library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (run, consolidate, retrieve, admin)

pub mod cli;
pub mod commands;

pub use cli::{AdminCommands, Cli, Commands, WindowArgs};
pub use commands::{
    consolidate, describe_retrieval, describe_session, handle_admin, init_logging,
    interrupt_token, load_settings, open_storage, retrieve, run_window,
};
