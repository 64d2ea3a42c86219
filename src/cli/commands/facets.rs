//! `lagerkoll facets` command - Value counts for the filter columns

use std::collections::BTreeMap;

use clap::ValueEnum;
use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::helpers::Context;
use crate::cli::table::{CellValue, ColumnDef, TableConfig, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::{FacetOption, InventorySource, StatusCode};

#[derive(clap::Args, Debug)]
pub struct FacetsArgs {
    /// Which facet to count
    #[arg(value_enum, default_value = "all")]
    pub facet: FacetKind,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FacetKind {
    Status,
    Mk,
    Location,
    All,
}

#[derive(Debug, Default, Serialize)]
struct FacetReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<BTreeMap<String, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mk: Option<Vec<FacetOption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<Vec<FacetOption>>,
}

const FACET_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("value", "VALUE", 20),
    ColumnDef::new("label", "LABEL", 30),
    ColumnDef::new("count", "COUNT", 8),
];

pub fn run(args: FacetsArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::load(global)?;
    let source = ctx.open_source()?;
    let report = collect(source.as_ref(), args.facet)?;

    let format = ctx.format(global);
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&report).into_diagnostic()?);
        }
        _ => {
            let config = match format {
                OutputFormat::Auto | OutputFormat::Tsv if !global.quiet => TableConfig::default(),
                _ => TableConfig::for_pipe(),
            };
            let sections = [
                ("Status", report.status.map(status_options)),
                ("MK", report.mk),
                ("Location", report.location),
            ];
            for (title, options) in sections {
                let Some(options) = options else { continue };
                if matches!(format, OutputFormat::Auto | OutputFormat::Tsv | OutputFormat::Md) {
                    println!("{}", style(title).bold());
                }
                let rows: Vec<TableRow> = options
                    .iter()
                    .map(|o| {
                        let value = if title == "Status" {
                            CellValue::Status(o.value.clone())
                        } else {
                            CellValue::Code(o.value.clone())
                        };
                        TableRow::new(o.value.clone())
                            .cell("value", value)
                            .cell("label", CellValue::Text(o.label.clone()))
                            .cell("count", CellValue::Number(o.count as i64))
                    })
                    .collect();
                TableFormatter::new(FACET_COLUMNS, "value")
                    .with_config(config.clone())
                    .output(&rows, format, &["value", "label", "count"])?;
                println!();
            }
        }
    }

    Ok(())
}

fn collect(source: &dyn InventorySource, facet: FacetKind) -> Result<FacetReport> {
    let want = |kind| facet == FacetKind::All || facet == kind;
    let mut report = FacetReport::default();
    if want(FacetKind::Status) {
        report.status = Some(source.status_counts()?);
    }
    if want(FacetKind::Mk) {
        report.mk = Some(source.mk_counts()?);
    }
    if want(FacetKind::Location) {
        report.location = Some(source.location_counts()?);
    }
    Ok(report)
}

/// Status counts as options labelled with the status name
pub(crate) fn status_options(counts: BTreeMap<String, usize>) -> Vec<FacetOption> {
    counts
        .into_iter()
        .map(|(value, count)| {
            let label = value
                .parse::<StatusCode>()
                .map(|s| s.label().to_string())
                .unwrap_or_else(|_| "Okänd".to_string());
            FacetOption { value, label, count }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{InventoryStore, StoreSource};

    #[test]
    fn test_status_options_labels() {
        let counts: BTreeMap<String, usize> = [("B".to_string(), 2), ("J".to_string(), 5), ("Q".to_string(), 1)]
            .into_iter()
            .collect();
        let options = status_options(counts);
        assert_eq!(options[0].label, "Beställd");
        assert_eq!(options[1].label, "Lagervara");
        assert_eq!(options[2].label, "Okänd");
        assert_eq!(options[1].count, 5);
    }

    #[test]
    fn test_collect_only_requested_facet() {
        let store = InventoryStore::open_in_memory().unwrap();
        let source = StoreSource::new(store);
        let report = collect(&source, FacetKind::Mk).unwrap();
        assert!(report.status.is_none());
        assert!(report.location.is_none());
        assert_eq!(report.mk, Some(Vec::new()));

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("status").is_none());
    }
}
