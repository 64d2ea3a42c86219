//! `lagerkoll browse` command - Interactive paging and search
//!
//! Every page, search and filter change goes through one [`CachedSource`],
//! so going back to a page within the query TTL and reopening a facet list
//! within the facet TTL do not touch the snapshot or store again.

use console::{style, Term};
use dialoguer::{theme::ColorfulTheme, Input, MultiSelect, Select};
use miette::{IntoDiagnostic, Result};

use crate::cli::commands::facets::status_options;
use crate::cli::commands::list::{table_rows, ListColumn, INVENTORY_COLUMNS};
use crate::cli::commands::show::{find_article, print_detail};
use crate::cli::helpers::Context;
use crate::cli::table::{TableConfig, TableFormatter};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::query::{Column, SortKey};
use crate::core::{CachedSource, FacetOption, InventoryQuery, InventorySource, Page, InventoryRow};

#[derive(clap::Args, Debug)]
pub struct BrowseArgs {
    /// Initial free text search
    #[arg(long = "search", short = 's')]
    pub search: Option<String>,

    /// Rows per page (default: per_page from config)
    #[arg(long, short = 'n')]
    pub per_page: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Next,
    Previous,
    Search,
    Status,
    Mk,
    Location,
    Sort,
    Show,
    Clear,
    Reload,
    Quit,
}

impl Action {
    fn label(&self) -> &'static str {
        match self {
            Action::Next => "Next page",
            Action::Previous => "Previous page",
            Action::Search => "Search...",
            Action::Status => "Filter status...",
            Action::Mk => "Filter MK...",
            Action::Location => "Filter location...",
            Action::Sort => "Sort by...",
            Action::Show => "Show article...",
            Action::Clear => "Clear filters",
            Action::Reload => "Reload data",
            Action::Quit => "Quit",
        }
    }
}

struct Browser {
    source: CachedSource<Box<dyn InventorySource>>,
    query: InventoryQuery,
    theme: ColorfulTheme,
    term: Term,
}

pub fn run(args: BrowseArgs, global: &GlobalOpts) -> Result<()> {
    let term = Term::stdout();
    if !term.is_term() {
        return Err(miette::miette!(
            help = "use `lagerkoll list` for scripted output",
            "browse needs an interactive terminal"
        ));
    }

    let ctx = Context::load(global)?;
    let query = InventoryQuery {
        per_page: args.per_page.unwrap_or_else(|| ctx.config.per_page()),
        q: args.search,
        ..Default::default()
    };
    query.validate()?;

    let mut browser = Browser {
        source: ctx.open_cached()?,
        query,
        theme: ColorfulTheme::default(),
        term,
    };
    browser.run()
}

impl Browser {
    fn run(&mut self) -> Result<()> {
        loop {
            let page = self.source.query(&self.query)?;
            self.render(&page)?;

            let actions = self.actions(&page);
            let labels: Vec<&str> = actions.iter().map(Action::label).collect();
            let choice = Select::with_theme(&self.theme)
                .with_prompt("Action")
                .items(&labels)
                .default(0)
                .interact()
                .into_diagnostic()?;

            match actions[choice] {
                Action::Next => self.query.page += 1,
                Action::Previous => self.query.page = self.query.page.saturating_sub(1).max(1),
                Action::Search => self.prompt_search()?,
                Action::Status => {
                    let options = status_options(self.source.status_counts()?);
                    self.query.status = self.pick("Status", &options, &self.query.status)?;
                    self.query.page = 1;
                }
                Action::Mk => {
                    let options = self.source.mk_counts()?;
                    self.query.mk = self.pick("MK", &options, &self.query.mk)?;
                    self.query.page = 1;
                }
                Action::Location => {
                    let options = self.source.location_counts()?;
                    self.query.location = self.pick("Location", &options, &self.query.location)?;
                    self.query.page = 1;
                }
                Action::Sort => self.prompt_sort()?,
                Action::Show => self.show_article(&page)?,
                Action::Clear => {
                    self.query = InventoryQuery {
                        per_page: self.query.per_page,
                        ..Default::default()
                    };
                }
                // the snapshot or store may have changed since it was cached
                Action::Reload => self.source.invalidate(),
                Action::Quit => return Ok(()),
            }
        }
    }

    fn actions(&self, page: &Page<InventoryRow>) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.query.page < page.page_count {
            actions.push(Action::Next);
        }
        if self.query.page > 1 {
            actions.push(Action::Previous);
        }
        actions.extend([Action::Search, Action::Status, Action::Mk, Action::Location, Action::Sort]);
        if !page.data.is_empty() {
            actions.push(Action::Show);
        }
        if self.has_filters() {
            actions.push(Action::Clear);
        }
        actions.push(Action::Reload);
        actions.push(Action::Quit);
        actions
    }

    fn has_filters(&self) -> bool {
        self.query.q.is_some()
            || !self.query.status.is_empty()
            || !self.query.mk.is_empty()
            || !self.query.location.is_empty()
    }

    fn render(&self, page: &Page<InventoryRow>) -> Result<()> {
        self.term.clear_screen().into_diagnostic()?;
        println!(
            "{} {}",
            style("lagerkoll").bold(),
            style(self.source.describe()).dim()
        );
        if self.has_filters() {
            let mut parts = Vec::new();
            if let Some(q) = &self.query.q {
                parts.push(format!("text \"{}\"", q));
            }
            for (name, values) in [
                ("status", &self.query.status),
                ("mk", &self.query.mk),
                ("location", &self.query.location),
            ] {
                if !values.is_empty() {
                    parts.push(format!("{} {}", name, values.join("|")));
                }
            }
            println!("{} {}", style("Filters:").dim(), parts.join(", "));
        }
        println!();

        if page.data.is_empty() {
            println!("No inventory rows found.");
        } else {
            let visible: Vec<&str> = ListColumn::defaults().iter().map(ListColumn::key).collect();
            TableFormatter::new(INVENTORY_COLUMNS, "row")
                .with_config(TableConfig::for_pipe())
                .output(&table_rows(&page.data, true), OutputFormat::Auto, &visible)?;
        }

        println!();
        println!(
            "{} row(s), page {} of {}",
            style(page.total).cyan(),
            self.query.page,
            page.page_count.max(1)
        );
        Ok(())
    }

    fn prompt_search(&mut self) -> Result<()> {
        let current = self.query.q.clone().unwrap_or_default();
        let text: String = Input::with_theme(&self.theme)
            .with_prompt("Search (Artikelnr, Benämning)")
            .with_initial_text(current)
            .allow_empty(true)
            .interact_text()
            .into_diagnostic()?;
        let text = text.trim();
        self.query.q = (!text.is_empty()).then(|| text.to_string());
        self.query.page = 1;
        Ok(())
    }

    fn pick(&self, prompt: &str, options: &[FacetOption], selected: &[String]) -> Result<Vec<String>> {
        if options.is_empty() {
            return Ok(Vec::new());
        }
        let labels: Vec<String> = options
            .iter()
            .map(|o| format!("{} ({})", o.label, o.count))
            .collect();
        let defaults: Vec<bool> = options.iter().map(|o| selected.contains(&o.value)).collect();
        let chosen = MultiSelect::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(&labels)
            .defaults(&defaults)
            .interact()
            .into_diagnostic()?;
        Ok(chosen.into_iter().map(|i| options[i].value.clone()).collect())
    }

    fn prompt_sort(&mut self) -> Result<()> {
        let columns: Vec<Column> = Column::all().to_vec();
        let labels: Vec<&str> = columns.iter().map(Column::id).collect();
        let column = Select::with_theme(&self.theme)
            .with_prompt("Sort by")
            .items(&labels)
            .default(0)
            .interact()
            .into_diagnostic()?;
        let direction = Select::with_theme(&self.theme)
            .with_prompt("Direction")
            .items(&["ascending", "descending"])
            .default(0)
            .interact()
            .into_diagnostic()?;

        self.query.sort = vec![SortKey {
            id: columns[column].id().to_string(),
            desc: direction == 1,
        }];
        self.query.page = 1;
        Ok(())
    }

    fn show_article(&self, page: &Page<InventoryRow>) -> Result<()> {
        let labels: Vec<String> = page
            .data
            .iter()
            .map(|r| format!("{} {} {}", r.mk, r.artikelnr, r.benamning.as_deref().unwrap_or("")))
            .collect();
        let choice = Select::with_theme(&self.theme)
            .with_prompt("Article")
            .items(&labels)
            .default(0)
            .interact()
            .into_diagnostic()?;

        let row = &page.data[choice];
        let rows = find_article(&self.source, &row.mk, &row.artikelnr)?;
        self.term.clear_screen().into_diagnostic()?;
        if !rows.is_empty() {
            print_detail(&rows);
        }
        println!();
        Input::<String>::with_theme(&self.theme)
            .with_prompt("Press enter to go back")
            .allow_empty(true)
            .interact_text()
            .into_diagnostic()?;
        Ok(())
    }
}
