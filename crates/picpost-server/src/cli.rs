use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "picpost",
    about = "User and media post record service",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Optional subcommand; defaults to serving when absent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve the HTTP API.
    Serve {
        /// Listen address, overriding `bind_address` from the config file.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print version and exit.
    Version,
    /// Check that the configured record store is reachable.
    Health,
    /// Manage server configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}
