//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::menu::OrphanPolicy;

/// Menu commands.
#[derive(Debug, Subcommand)]
pub enum MenuCommand {
    /// Build and print the navigation tree for a menu type
    Show {
        /// The menu category key (e.g. "main", "footer")
        menu_type: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,

        /// Override how records with a missing parent are handled
        #[arg(long, value_enum)]
        orphans: Option<OrphanPolicyArg>,
    },

    /// Replace a menu type with records from a JSON file
    Import {
        /// The menu category key
        menu_type: String,

        /// JSON file holding an array of menu records
        file: PathBuf,
    },

    /// List stored menu types
    Types {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Delete every item of a menu type
    Delete {
        /// The menu category key
        menu_type: String,
    },
}

/// Session commands.
#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Show the member signed in on this device
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Sign in as a newly joined member
    Join {
        /// Given name
        #[arg(long)]
        first_name: String,

        /// Family name
        #[arg(long)]
        last_name: String,

        /// Contact email
        #[arg(long)]
        email: String,

        /// Name shown in the interface (defaults to "first last")
        #[arg(long)]
        display_name: Option<String>,
    },

    /// Sign out and forget the member
    SignOut,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration file
    Validate {
        /// Path to config file (uses default if not specified)
        file: Option<PathBuf>,
    },
}

/// Orphan handling as a CLI argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrphanPolicyArg {
    /// Leave orphaned records out
    Drop,
    /// Show orphaned records at the top level
    Promote,
}

impl From<OrphanPolicyArg> for OrphanPolicy {
    fn from(arg: OrphanPolicyArg) -> Self {
        match arg {
            OrphanPolicyArg::Drop => Self::Drop,
            OrphanPolicyArg::Promote => Self::PromoteToRoot,
        }
    }
}
