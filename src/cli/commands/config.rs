//! `lagerkoll config` command - Show the resolved configuration

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{format_ttl, Context};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommands>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration (default)
    Show,

    /// Show configuration file paths
    Path,

    /// List available configuration keys
    Keys,
}

const VALID_KEYS: &[(&str, &str)] = &[
    ("source", "Where queries read from: snapshot or store"),
    ("snapshot", "Snapshot file, relative to the project root"),
    ("database", "SQLite store file, relative to the project root"),
    ("per_page", "Rows per page for list and browse"),
    ("query_ttl_secs", "How long query results stay cached"),
    ("facet_ttl_secs", "How long facet counts stay cached"),
    ("default_format", "Output format used when -f is auto"),
];

pub fn run(args: ConfigArgs, global: &GlobalOpts) -> Result<()> {
    match args.command.unwrap_or(ConfigCommands::Show) {
        ConfigCommands::Show => run_show(global),
        ConfigCommands::Path => run_path(global),
        ConfigCommands::Keys => run_keys(),
    }
}

fn run_show(global: &GlobalOpts) -> Result<()> {
    let ctx = Context::load(global)?;
    let config = &ctx.config;

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config).into_diagnostic()?);
            return Ok(());
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(config).into_diagnostic()?);
            return Ok(());
        }
        _ => {}
    }

    println!("{}", style("Effective Configuration").bold().underlined());
    println!();

    let source = ctx.source_kind().to_string();
    let snapshot = ctx.snapshot_path().display().to_string();
    let database = ctx.database_path().display().to_string();
    let per_page = config.per_page().to_string();
    let query_ttl = format_ttl(config.query_ttl());
    let facet_ttl = format_ttl(config.facet_ttl());
    let format = format!("{:?}", ctx.format(global)).to_lowercase();

    print_config_value("source", &source, global.source.is_none() && config.source.is_none());
    print_config_value("snapshot", &snapshot, config.snapshot.is_none());
    print_config_value("database", &database, config.database.is_none());
    print_config_value("per_page", &per_page, config.per_page.is_none());
    print_config_value("query_ttl_secs", &query_ttl, config.query_ttl_secs.is_none());
    print_config_value("facet_ttl_secs", &facet_ttl, config.facet_ttl_secs.is_none());
    print_config_value("default_format", &format, config.default_format.is_none());

    println!();
    match &ctx.project {
        Some(project) => println!("  {} {}", style("project:").cyan(), project.root().display()),
        None => println!("  {} {}", style("project:").cyan(), style("(not in a lagerkoll project)").dim()),
    }

    println!();
    println!("{}", style("Config Sources (in priority order):").dim());
    println!("  1. Command line flags (--source, -f)");
    println!("  2. Environment variables (LAGER_SOURCE, LAGER_SNAPSHOT, LAGER_DATABASE, LAGER_PER_PAGE)");
    println!("  3. Project config (.lager/config.yaml)");
    println!("  4. Global config (~/.config/lagerkoll/config.yaml)");

    Ok(())
}

fn run_path(global: &GlobalOpts) -> Result<()> {
    let ctx = Context::load(global)?;

    println!("{}", style("Configuration file paths:").bold());
    println!();

    match Config::global_config_path() {
        Some(path) => print_path("Global:", &path.display().to_string(), path.exists()),
        None => println!("  {} {}", style("Global:").cyan(), style("(no home directory)").dim()),
    }

    match &ctx.project {
        Some(project) => {
            let path = project.config_path();
            print_path("Project:", &path.display().to_string(), path.exists());
        }
        None => println!(
            "  {} {}",
            style("Project:").cyan(),
            style("(not in a lagerkoll project)").dim()
        ),
    }

    Ok(())
}

fn run_keys() -> Result<()> {
    println!("{}", style("Available configuration keys:").bold());
    println!();

    for (key, description) in VALID_KEYS {
        println!("  {:<16} {}", style(key).cyan(), style(description).dim());
    }

    println!();
    println!("{}", style("Set them in .lager/config.yaml or ~/.config/lagerkoll/config.yaml.").dim());

    Ok(())
}

fn print_config_value(key: &str, value: &str, is_default: bool) {
    if is_default {
        println!("  {}: {} {}", style(key).cyan(), style(value).yellow(), style("(default)").dim());
    } else {
        println!("  {}: {}", style(key).cyan(), style(value).yellow());
    }
}

fn print_path(label: &str, path: &str, exists: bool) {
    println!("  {} {}", style(label).cyan(), path);
    if exists {
        println!("          {}", style("(exists)").green());
    } else {
        println!("          {}", style("(not created)").dim());
    }
}
