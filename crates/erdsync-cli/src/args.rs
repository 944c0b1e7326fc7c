//! CLI argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "erdsync")]
#[command(author, version, about = "Keep ERD diagrams and dbt schema files in sync")]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// dbt project directory
    #[arg(short, long = "project-dir", global = true, value_name = "DIR", env = "ERDSYNC_PROJECT_DIR")]
    pub project_dir: Option<PathBuf>,

    /// dbt manifest (defaults to <project-dir>/target/manifest.json)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Configuration file (defaults to the nearest erdsync.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Keep relationships whose models are not bound to a diagram entity
    #[arg(long, global = true)]
    pub include_unbound: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Infer relationships from existing relationships tests
    Infer {
        /// Diagram file (JSON or YAML)
        #[arg(short, long, value_name = "FILE")]
        diagram: Option<PathBuf>,
    },

    /// Write the diagram's relationships into schema files
    Sync {
        /// Diagram file (JSON or YAML)
        #[arg(short, long, value_name = "FILE")]
        diagram: Option<PathBuf>,
    },

    /// List models under the configured model paths
    Models,

    /// Display a model's documented schema
    Show {
        /// Model name
        model: String,

        /// Model version
        #[arg(long = "model-version", value_name = "N")]
        model_version: Option<u32>,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output
    Json,
}
