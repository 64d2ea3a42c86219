//! `lagerkoll show` command - One article across all locations

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::commands::list::{table_rows, INVENTORY_COLUMNS};
use crate::cli::helpers::{format_date, format_relative, Context};
use crate::cli::table::{TableConfig, TableFormatter};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::query::{FilterClause, FilterFlag, FilterValue, InventoryQuery, Operator, SortKey};
use crate::core::{InventoryRow, InventorySource, StatusCode};

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Maker code (märkeskod)
    pub mk: String,

    /// Article number
    pub artikelnr: String,
}

pub fn run(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::load(global)?;
    let source = ctx.open_source()?;
    let rows = find_article(source.as_ref(), &args.mk, &args.artikelnr)?;

    if rows.is_empty() {
        return Err(miette::miette!(
            help = "check the maker code, or search with `lagerkoll list -s <text>`",
            "no stock found for {} {}",
            args.mk,
            args.artikelnr
        ));
    }

    let format = ctx.format(global);
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&rows).into_diagnostic()?);
        }
        OutputFormat::Auto => print_detail(&rows),
        _ => {
            let visible: Vec<&str> = INVENTORY_COLUMNS.iter().map(|c| c.key).collect();
            TableFormatter::new(INVENTORY_COLUMNS, "location")
                .with_config(TableConfig::for_pipe())
                .output(&table_rows(&rows, false), format, &visible)?;
        }
    }

    Ok(())
}

/// Every stock row of one article, ordered by location
pub fn find_article(source: &dyn InventorySource, mk: &str, artikelnr: &str) -> Result<Vec<InventoryRow>> {
    let clause = |id: &str, value: &str| FilterClause {
        id: id.to_string(),
        value: FilterValue::One(value.to_string()),
        operator: Some(Operator::Eq),
        variant: None,
    };
    let mut query = InventoryQuery {
        per_page: 1,
        sort: vec![SortKey {
            id: "location".to_string(),
            desc: false,
        }],
        filter_flag: Some(FilterFlag::AdvancedFilters),
        filters: vec![clause("mk", mk), clause("artikelnr", artikelnr)],
        ..Default::default()
    };

    let first = source.query(&query)?;
    if first.total <= 1 {
        return Ok(first.data);
    }
    query.per_page = first.total;
    Ok(source.query(&query)?.data)
}

pub(crate) fn print_detail(rows: &[InventoryRow]) {
    let first = &rows[0];
    let now = chrono::Utc::now();

    println!(
        "{} {}  {}",
        style(&first.mk).cyan().bold(),
        style(&first.artikelnr).cyan().bold(),
        first.benamning.as_deref().unwrap_or("")
    );
    println!("{}", style("─".repeat(60)).dim());

    let field = |label: &str, value: Option<String>| {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            println!("  {:<14} {}", style(label).dim(), value);
        }
    };
    let list = |items: &[String]| (!items.is_empty()).then(|| items.join(", "));

    field("Benämning 2", first.benamning2.clone());
    field("Extrainfo", first.extrainfo.clone());
    field("Bild", first.bild.map(|b| if b { "ja" } else { "nej" }.to_string()));
    field("Paket", list(&first.paket));
    field("Fordon", list(&first.fordon));
    field(
        "Alternativ",
        (!first.alternativart.is_empty()).then(|| {
            first
                .alternativart
                .iter()
                .map(|x| format!("{} {}", x.markeskod, x.artikelnummer))
                .collect::<Vec<_>>()
                .join(", ")
        }),
    );
    field("Ersätter", list(&first.ersatter));
    field("Ersatt av", list(&first.ersatt_av));

    println!();
    println!("{}", style(format!("Lager ({})", rows.len())).bold());
    for row in rows {
        let status = match row.status.as_deref() {
            Some(code) if !code.is_empty() => {
                let label = code.parse::<StatusCode>().map(|s| s.label()).unwrap_or("Okänd");
                format!("{} {}", code, label)
            }
            _ => "-".to_string(),
        };
        let updated = row
            .updated_at
            .map(|dt| format!("{} ({})", format_date(&dt), format_relative(&dt, &now)))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<16} {:<24} {:<10} {}",
            style(&row.location).cyan(),
            status,
            row.lagerplats.as_deref().unwrap_or("-"),
            style(updated).dim()
        );
    }
}
