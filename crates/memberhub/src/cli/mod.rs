//! Command-line interface for memberhub.
//!
//! This module provides the CLI structure for the `mhub` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, MenuCommand, OrphanPolicyArg, SessionCommand, StatusCommand};

use crate::logging::Verbosity;

/// mhub - Navigation menus and member sessions for community sites
///
/// Builds navigation trees from stored menu records and manages the member
/// session kept on this device.
#[derive(Debug, Parser)]
#[command(name = "mhub")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build, import and list navigation menus
    #[command(subcommand)]
    Menu(MenuCommand),

    /// Show, start or end the member session
    #[command(subcommand)]
    Session(SessionCommand),

    /// Show database and session status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.verbose)
    }
}
