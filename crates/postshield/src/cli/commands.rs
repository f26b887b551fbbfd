//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

/// User management commands.
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Register a user
    Add {
        /// User id issued by the auth provider
        id: String,

        /// Account email
        #[arg(short, long)]
        email: String,

        /// Display name
        #[arg(short, long)]
        username: String,

        /// Avatar image URL
        #[arg(long)]
        avatar: Option<String>,
    },

    /// Show a user and their posts
    Show {
        /// User id
        id: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Post commands.
#[derive(Debug, Subcommand)]
pub enum PostCommand {
    /// Publish a post as a user
    Add(PostAddCommand),
}

/// Arguments for publishing a post.
#[derive(Debug, Args)]
pub struct PostAddCommand {
    /// Acting user id
    #[arg(short, long)]
    pub user: String,

    /// Latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lng: f64,

    /// What happened here
    #[arg(short, long)]
    pub description: String,

    /// URL of the uploaded image
    #[arg(short, long)]
    pub image: String,

    /// Perceived crime level
    #[arg(short = 'l', long, value_enum)]
    pub crime_level: Option<CrimeLevelArg>,

    /// Display address to store as the post's location
    #[arg(long, conflicts_with = "geocode")]
    pub address: Option<String>,

    /// Saved Nominatim `reverse?format=jsonv2` response for the location
    #[arg(long, value_name = "FILE")]
    pub geocode: Option<PathBuf>,
}

/// Feed command arguments.
#[derive(Debug, Args)]
pub struct FeedCommand {
    /// Search words; every word must appear in the location or description
    pub query: Vec<String>,

    /// Maximum number of entries (0 for all; defaults to the configured page size)
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Crime level lookup arguments.
#[derive(Debug, Args)]
pub struct LevelCommand {
    /// Latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub lng: f64,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Snapshot import arguments.
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// JSON file holding an array of users with embedded posts
    pub file: PathBuf,
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

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Crime level argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CrimeLevelArg {
    /// Little or no perceived crime
    Low,
    /// Some perceived crime
    Medium,
    /// Serious perceived crime
    High,
}

impl From<CrimeLevelArg> for crate::post::CrimeLevel {
    fn from(arg: CrimeLevelArg) -> Self {
        match arg {
            CrimeLevelArg::Low => Self::Low,
            CrimeLevelArg::Medium => Self::Medium,
            CrimeLevelArg::High => Self::High,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::CrimeLevel;

    #[test]
    fn test_crime_level_arg_conversion() {
        assert_eq!(CrimeLevel::from(CrimeLevelArg::Low), CrimeLevel::Low);
        assert_eq!(CrimeLevel::from(CrimeLevelArg::Medium), CrimeLevel::Medium);
        assert_eq!(CrimeLevel::from(CrimeLevelArg::High), CrimeLevel::High);
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Plain);
    }

    #[test]
    fn test_feed_command_debug() {
        let cmd = FeedCommand {
            query: vec!["dark".to_string()],
            limit: None,
            format: OutputFormat::Table,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("query"));
        assert!(debug_str.contains("dark"));
    }
}
