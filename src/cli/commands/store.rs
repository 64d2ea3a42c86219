//! `lagerkoll store` command - Inspect or clear the SQLite store
//!
//! The store is a local SQLite database under `.lager/` holding the
//! articles and stock rows of the last seed or sync. It is gitignored and
//! can always be rebuilt from the snapshot with `lagerkoll seed`.

use clap::Subcommand;
use console::style;
use dialoguer::Confirm;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::Context;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::InventoryStore;

#[derive(Subcommand, Debug)]
pub enum StoreCommands {
    /// Show store statistics
    Status,

    /// Delete every article and stock row
    Clear {
        /// Don't ask for confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

pub fn run(cmd: StoreCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        StoreCommands::Status => run_status(global),
        StoreCommands::Clear { yes } => run_clear(yes, global),
    }
}

fn run_status(global: &GlobalOpts) -> Result<()> {
    let ctx = Context::load(global)?;
    let path = ctx.database_path();
    if !path.exists() {
        println!(
            "{} No store at {}",
            style("!").yellow(),
            style(path.display()).cyan()
        );
        println!("  Run {} to create it", style("lagerkoll seed").yellow());
        return Ok(());
    }

    let store = InventoryStore::open(&path)?;
    let stats = store.statistics()?;

    if global.format == OutputFormat::Json {
        let json = serde_json::json!({
            "path": path.display().to_string(),
            "articles": stats.articles,
            "inventory": stats.inventory,
            "locations": stats.locations,
            "lastSync": stats.last_sync,
            "source": stats.source,
            "dbSizeBytes": stats.db_size_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        return Ok(());
    }

    println!("{}", style("Store Status").bold());
    println!("{}", style("─".repeat(40)).dim());
    println!("  Location:       {}", path.display());
    println!("  Articles:       {}", style(stats.articles).cyan());
    println!("  Stock rows:     {}", style(stats.inventory).cyan());
    println!("  Locations:      {}", style(stats.locations).cyan());
    println!(
        "  Database size:  {} KB",
        style(stats.db_size_bytes / 1024).cyan()
    );
    println!(
        "  Last sync:      {}",
        stats.last_sync.as_deref().unwrap_or("never")
    );
    if let Some(source) = &stats.source {
        println!("  Source:         {}", source);
    }

    Ok(())
}

fn run_clear(yes: bool, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::load(global)?;
    let path = ctx.database_path();
    if !path.exists() {
        println!("{} Nothing to clear", style("✓").green());
        return Ok(());
    }

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete all rows in {}?", path.display()))
            .default(false)
            .interact()
            .into_diagnostic()?;
        if !confirmed {
            println!("Cancelled");
            return Ok(());
        }
    }

    let mut store = InventoryStore::open(&path)?;
    store.clear()?;
    println!("{} Store cleared", style("✓").green());
    Ok(())
}
