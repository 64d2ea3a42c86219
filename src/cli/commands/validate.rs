//! `lagerkoll validate` command - Check snapshots against the embedded schema

use console::style;
use miette::Result;
use std::path::PathBuf;

use crate::cli::helpers::Context;
use crate::cli::GlobalOpts;
use crate::core::snapshot::{read_snapshot, split_rows};
use crate::schema::Validator;

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    /// Snapshot files to validate (default: the configured snapshot)
    #[arg()]
    pub paths: Vec<PathBuf>,

    /// Continue with the next file after a failure
    #[arg(long)]
    pub keep_going: bool,

    /// Show summary only, don't show individual errors
    #[arg(long)]
    pub summary: bool,
}

#[derive(Default)]
struct ValidationStats {
    files_checked: usize,
    files_passed: usize,
    files_failed: usize,
    total_errors: usize,
    skipped_items: usize,
}

pub fn run(args: ValidateArgs, global: &GlobalOpts) -> Result<()> {
    let paths = if args.paths.is_empty() {
        vec![Context::load(global)?.snapshot_path()]
    } else {
        args.paths.clone()
    };
    let validator = Validator::new()?;
    let mut stats = ValidationStats::default();

    for path in &paths {
        stats.files_checked += 1;

        let content = match read_snapshot(path) {
            Ok(content) => content,
            Err(e) => {
                stats.files_failed += 1;
                stats.total_errors += 1;
                if !args.summary {
                    println!("{} {} - {}", style("✗").red(), path.display(), e);
                }
                if !args.keep_going {
                    break;
                }
                continue;
            }
        };

        match validator.check_document(&content, &path.display().to_string()) {
            Ok(doc) => {
                stats.files_passed += 1;
                let snapshot = split_rows(&doc);
                stats.skipped_items += snapshot.skipped;
                if !args.summary && !global.quiet {
                    println!(
                        "{} {} ({} location(s), {} stock row(s), {} article(s))",
                        style("✓").green(),
                        path.display(),
                        doc.len(),
                        snapshot.entries.len(),
                        snapshot.articles.len()
                    );
                    if snapshot.skipped > 0 {
                        println!(
                            "  {} {} item(s) without MK or Artikelnr will be skipped",
                            style("!").yellow(),
                            snapshot.skipped
                        );
                    }
                }
            }
            Err(e) => {
                stats.files_failed += 1;
                stats.total_errors += e.violation_count();

                if !args.summary {
                    println!(
                        "{} {} - {} error(s)",
                        style("✗").red(),
                        path.display(),
                        e.violation_count()
                    );
                    let report = miette::Report::new(e);
                    println!("{:?}", report);
                }

                if !args.keep_going {
                    break;
                }
            }
        }
    }

    if !global.quiet {
        print_summary(&stats);
    }

    match stats.files_failed {
        0 => {
            if !global.quiet {
                println!("{} All snapshots passed validation!", style("✓").green().bold());
            }
            Ok(())
        }
        1 => Err(miette::miette!("Validation failed: 1 file has errors")),
        n => Err(miette::miette!("Validation failed: {} files have errors", n)),
    }
}

fn print_summary(stats: &ValidationStats) {
    println!();
    println!("{}", style("─".repeat(60)).dim());
    println!("{}", style("Validation Summary").bold());
    println!("{}", style("─".repeat(60)).dim());
    println!("  Files checked:  {}", style(stats.files_checked).cyan());
    println!("  Files passed:   {}", style(stats.files_passed).green());
    println!("  Files failed:   {}", style(stats.files_failed).red());
    println!("  Total errors:   {}", style(stats.total_errors).red());
    if stats.skipped_items > 0 {
        println!("  Skipped items:  {}", style(stats.skipped_items).yellow());
    }
    println!();
}
