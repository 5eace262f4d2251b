//! CLI definition and command handling

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{
    CompletionsCommand, InsertCommand, PublishCommand, SignCommand, StatusCommand, UpdateCommand,
};

/// extpilot - publish browser extensions to Chrome, Edge and Firefox
#[derive(Debug, Parser)]
#[command(name = "extpilot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output except results and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file (default: nearest extpilot.toml)
    #[arg(long, global = true, env = "EXTPILOT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the current store listing of an extension
    Status(StatusCommand),

    /// Upload a package as a new extension
    Insert(InsertCommand),

    /// Upload a new version of an existing extension
    Update(UpdateCommand),

    /// Submit the uploaded draft for publication
    Publish(PublishCommand),

    /// Have a package signed and download it
    Sign(SignCommand),

    /// Generate shell completions
    Completions(CompletionsCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> anyhow::Result<()> {
        match self.command {
            Commands::Status(ref cmd) => cmd.execute(&self),
            Commands::Insert(ref cmd) => cmd.execute(&self),
            Commands::Update(ref cmd) => cmd.execute(&self),
            Commands::Publish(ref cmd) => cmd.execute(&self),
            Commands::Sign(ref cmd) => cmd.execute(&self),
            Commands::Completions(ref cmd) => cmd.execute(&self),
        }
    }
}
