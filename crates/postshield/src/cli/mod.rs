//! Command-line interface for postshield.
//!
//! This module provides the CLI structure for the `pshield` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, CrimeLevelArg, FeedCommand, ImportCommand, LevelCommand, OutputFormat,
    PostAddCommand, PostCommand, StatusCommand, UserCommand,
};

/// pshield - Crime-aware geotagged posts
///
/// Register users, publish geotagged posts with a crime level, browse and
/// search the feed, and look up the average crime level at a location.
#[derive(Debug, Parser)]
#[command(name = "pshield")]
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
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),

    /// Publish posts
    #[command(subcommand)]
    Post(PostCommand),

    /// Browse and search the post feed
    Feed(FeedCommand),

    /// Average crime level at a location
    Level(LevelCommand),

    /// Import users and posts from a JSON snapshot
    Import(ImportCommand),

    /// Show store statistics
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}
