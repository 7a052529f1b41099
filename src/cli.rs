//! CLI definitions for NetLens.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// NetLens CLI.
#[derive(Parser)]
#[command(name = "netlens")]
#[command(about = "Capture a page's network traffic and ask questions about it")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Capture a page, then answer a question about its traffic
    Analyze {
        /// Question to answer
        #[arg(short, long)]
        query: String,

        /// Page to capture (suggested from the query when omitted)
        #[arg(short, long)]
        url: Option<String>,

        /// Only record requests whose URL matches this substring (repeatable)
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Gemini API key
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Also write the raw capture report to this file
        #[arg(long)]
        raw_output: Option<PathBuf>,
    },

    /// Capture a page and print the raw traffic
    Capture {
        /// Page to capture
        #[arg(short, long)]
        url: String,

        /// Only record requests whose URL matches this substring (repeatable)
        #[arg(short, long = "filter")]
        filters: Vec<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Load and validate the configuration
    ConfigCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}
