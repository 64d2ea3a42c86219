//! `lagerkoll init` command - Initialize a new project

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::{Path, PathBuf};

use crate::core::project::{Project, ProjectError, LAGER_DIR};

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Rewrite .lager/config.yaml even if the project exists
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        println!(
            "{} Created directory {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
    }

    match Project::init(&path, args.force) {
        Ok(project) => {
            println!(
                "{} Initialized lagerkoll project at {}",
                style("✓").green(),
                style(project.root().display()).cyan()
            );
            println!();
            println!("Created project structure:");
            print_structure(project.root());
            println!();
            println!("Next steps:");
            println!(
                "  {} Put your snapshot in data/lager.json",
                style("cp lager.json data/").yellow()
            );
            println!(
                "  {} Check it against the schema",
                style("lagerkoll validate").yellow()
            );
            println!(
                "  {} Search the inventory",
                style("lagerkoll list -s bromsskiva").yellow()
            );
            println!(
                "  {} Load it into the SQLite store",
                style("lagerkoll seed").yellow()
            );
            Ok(())
        }
        Err(ProjectError::AlreadyExists(path)) => {
            println!(
                "{} lagerkoll project already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            println!();
            println!(
                "Use {} to rewrite the config",
                style("lagerkoll init --force").yellow()
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_structure(root: &Path) {
    let entries = [
        (format!("{}/", LAGER_DIR), "project marker and SQLite store"),
        (format!("{}/config.yaml", LAGER_DIR), "project configuration"),
        ("data/".to_string(), "snapshot files (lager.json)"),
    ];
    for (entry, description) in entries {
        let marker = if root.join(&entry).exists() {
            style("✓").green()
        } else {
            style("-").dim()
        };
        println!(
            "  {} {:<22} {}",
            marker,
            style(&entry).cyan(),
            style(description).dim()
        );
    }
}
