//! CLI module - Command-line interface for Sigil
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// Sigil - authentication and session issuance service
#[derive(Parser)]
#[command(name = "sigil")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API (default)
    #[command(alias = "daemon")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Print an Argon2 hash for a password
    HashPassword {
        /// Password to hash; read from stdin when omitted
        password: Option<String>,
    },
}

pub use commands::*;
