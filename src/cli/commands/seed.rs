//! `lagerkoll seed` and `lagerkoll sync` - Load a snapshot into the store
//!
//! Both validate the snapshot first; a failing snapshot aborts before the
//! store is opened for writing.

use console::style;
use miette::Result;
use std::path::PathBuf;

use crate::cli::helpers::Context;
use crate::cli::GlobalOpts;
use crate::core::{InventoryStore, SyncStats};
use crate::schema::Validator;

#[derive(clap::Args, Debug)]
pub struct SeedArgs {
    /// Snapshot file (default: the configured snapshot)
    pub file: Option<PathBuf>,

    /// Store file (default: the configured database)
    #[arg(long)]
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Seed,
    Sync,
}

pub fn run_seed(args: SeedArgs, global: &GlobalOpts) -> Result<()> {
    run(args, global, Mode::Seed)
}

pub fn run_sync(args: SeedArgs, global: &GlobalOpts) -> Result<()> {
    run(args, global, Mode::Sync)
}

fn run(args: SeedArgs, global: &GlobalOpts, mode: Mode) -> Result<()> {
    let ctx = Context::load(global)?;
    let file = args.file.unwrap_or_else(|| ctx.snapshot_path());
    let database = args.database.unwrap_or_else(|| ctx.database_path());

    if !global.quiet {
        println!(
            "{} Validating {}...",
            style("→").blue(),
            style(file.display()).cyan()
        );
    }
    let snapshot = Validator::new()?.load_file(&file)?;

    let mut store = InventoryStore::open(&database)?;
    let source = file.display().to_string();
    let stats = match mode {
        Mode::Seed => store.seed(&snapshot, &source)?,
        Mode::Sync => store.sync(&snapshot, &source)?,
    };

    if !global.quiet {
        print_stats(mode, &stats, &database);
    }
    Ok(())
}

fn print_stats(mode: Mode, stats: &SyncStats, database: &std::path::Path) {
    let verb = match mode {
        Mode::Seed => "Seeded",
        Mode::Sync => "Synced",
    };

    let changed = stats.articles_upserted
        + stats.inventory_upserted
        + stats.articles_deleted
        + stats.inventory_deleted;
    if mode == Mode::Sync && changed == 0 {
        println!("{} Store is up to date", style("✓").green());
    } else {
        println!(
            "{} {} {} in {}ms",
            style("✓").green(),
            verb,
            style(database.display()).cyan(),
            stats.duration_ms
        );
    }

    if stats.articles_upserted > 0 {
        println!("  Articles written:   {}", style(stats.articles_upserted).green());
    }
    if stats.inventory_upserted > 0 {
        println!("  Stock rows written: {}", style(stats.inventory_upserted).green());
    }
    if stats.articles_deleted > 0 {
        println!("  Articles removed:   {}", style(stats.articles_deleted).red());
    }
    if stats.inventory_deleted > 0 {
        println!("  Stock rows removed: {}", style(stats.inventory_deleted).red());
    }
    if stats.unchanged > 0 {
        println!("  Unchanged:          {}", style(stats.unchanged).dim());
    }
    if stats.skipped > 0 {
        println!(
            "  Skipped:            {} {}",
            style(stats.skipped).yellow(),
            style("(missing MK or Artikelnr)").dim()
        );
    }
}
