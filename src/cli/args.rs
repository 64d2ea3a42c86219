//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    browse::BrowseArgs, completions::CompletionsArgs, config::ConfigArgs, facets::FacetsArgs,
    init::InitArgs, list::ListArgs, schema::SchemaArgs, seed::SeedArgs, show::ShowArgs,
    store::StoreCommands, validate::ValidateArgs,
};
use crate::core::SourceKind;

#[derive(Parser)]
#[command(name = "lagerkoll")]
#[command(author, version, about = "Lagerkoll - automotive parts inventory lookup")]
#[command(
    long_about = "Search, filter and page through an automotive-parts inventory read from a JSON snapshot (lager.json) or a SQLite store seeded from it."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .lager/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    /// Where queries read from (overrides config and LAGER_SOURCE)
    #[arg(long, global = true, value_enum)]
    pub source: Option<SourceKind>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new lagerkoll project
    Init(InitArgs),

    /// Search and list inventory rows
    List(ListArgs),

    /// Show value counts for status, maker code and location
    Facets(FacetsArgs),

    /// Show every location of one article
    Show(ShowArgs),

    /// Validate a snapshot file against the embedded schema
    Validate(ValidateArgs),

    /// Replace the store contents with a snapshot
    Seed(SeedArgs),

    /// Bring the store in line with a snapshot (upsert and delete)
    Sync(SeedArgs),

    /// Inspect or clear the SQLite store
    #[command(subcommand)]
    Store(StoreCommands),

    /// Page through the inventory interactively
    Browse(BrowseArgs),

    /// Print the embedded snapshot schema
    Schema(SchemaArgs),

    /// Show the resolved configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Styled table for lists, YAML for single articles
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
    /// Just row keys (MK/Artikelnr/Location), one per line
    Id,
}
