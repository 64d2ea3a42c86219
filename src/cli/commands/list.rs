//! `lagerkoll list` command - Search, filter, sort and page the inventory

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::ValueEnum;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{format_relative, Context};
use crate::cli::table::{CellValue, ColumnDef, TableConfig, TableFormatter, TableRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::query::{
    FilterClause, FilterFlag, FilterValue, InventoryQuery, JoinOperator, Operator, Page, SortKey,
};
use crate::core::{query_or_empty, InventoryRow};

#[derive(clap::Args, Debug, Default)]
pub struct ListArgs {
    /// Free text, matched against Artikelnr, Benämning and Benämning 2
    #[arg(long = "search", short = 's', visible_alias = "q")]
    pub search: Option<String>,

    /// Only these status codes (J, U, H, A, B, R, N)
    #[arg(long, value_delimiter = ',')]
    pub status: Vec<String>,

    /// Only these maker codes
    #[arg(long, value_delimiter = ',')]
    pub mk: Vec<String>,

    /// Only these locations
    #[arg(long, value_delimiter = ',')]
    pub location: Vec<String>,

    /// Advanced filter `field:op:value[,value]` (repeatable, e.g. `mk:inArray:VO,SA`)
    #[arg(long = "where", short = 'w', value_name = "FIELD:OP:VALUE")]
    pub filters: Vec<String>,

    /// How advanced filters combine
    #[arg(long, value_enum)]
    pub join: Option<JoinOperator>,

    /// Filter mode (default: advancedFilters when --where is given)
    #[arg(long, value_enum)]
    pub filter_flag: Option<FilterFlag>,

    /// Sort keys: `field`, `field:desc` or `-field` (repeatable)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub sort: Vec<String>,

    /// Page number, starting at 1
    #[arg(long, short = 'p')]
    pub page: Option<usize>,

    /// Rows per page (default: per_page from config)
    #[arg(long, short = 'n')]
    pub per_page: Option<usize>,

    /// Read the query as JSON from a file, or `-` for stdin; flags override it
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Only print the number of matching rows
    #[arg(long)]
    pub count: bool,

    /// Print an empty page instead of failing
    #[arg(long)]
    pub lenient: bool,

    /// Show dates as relative time ("för 3 dagar sedan")
    #[arg(long)]
    pub relative: bool,

    /// Columns to display
    #[arg(long, value_delimiter = ',', default_values_t = ListColumn::defaults())]
    pub columns: Vec<ListColumn>,

    /// Wrap text columns at this width instead of truncating
    #[arg(long)]
    pub wrap: Option<usize>,
}

/// Columns available for display
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListColumn {
    Mk,
    Artikelnr,
    Benamning,
    Benamning2,
    Location,
    Status,
    Lagerplats,
    Fordon,
    Created,
    Updated,
}

impl ListColumn {
    pub fn defaults() -> Vec<ListColumn> {
        vec![
            ListColumn::Mk,
            ListColumn::Artikelnr,
            ListColumn::Benamning,
            ListColumn::Location,
            ListColumn::Status,
            ListColumn::Updated,
        ]
    }

    pub fn key(&self) -> &'static str {
        match self {
            ListColumn::Mk => "mk",
            ListColumn::Artikelnr => "artikelnr",
            ListColumn::Benamning => "benamning",
            ListColumn::Benamning2 => "benamning2",
            ListColumn::Location => "location",
            ListColumn::Status => "status",
            ListColumn::Lagerplats => "lagerplats",
            ListColumn::Fordon => "fordon",
            ListColumn::Created => "created",
            ListColumn::Updated => "updated",
        }
    }
}

impl std::fmt::Display for ListColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Column definitions for inventory tables
pub const INVENTORY_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("mk", "MK", 6),
    ColumnDef::new("artikelnr", "ARTIKELNR", 18),
    ColumnDef::new("benamning", "BENÄMNING", 36),
    ColumnDef::new("benamning2", "BENÄMNING 2", 30),
    ColumnDef::new("location", "LOCATION", 16),
    ColumnDef::new("status", "STATUS", 22),
    ColumnDef::new("lagerplats", "LAGERPLATS", 12),
    ColumnDef::new("fordon", "FORDON", 24),
    ColumnDef::new("created", "CREATED", 20),
    ColumnDef::new("updated", "UPDATED", 20),
];

pub fn run(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::load(global)?;
    let query = build_query(&args, ctx.config.per_page())?;
    tracing::debug!(?query, "list query");

    let page = if args.lenient {
        match ctx.open_source() {
            Ok(source) => query_or_empty(source.as_ref(), &query),
            Err(e) => {
                tracing::warn!(error = %e, "cannot open inventory source, returning empty page");
                Page::empty()
            }
        }
    } else {
        ctx.open_source()?.query(&query)?
    };

    if args.count {
        println!("{}", page.total);
        return Ok(());
    }

    let format = ctx.format(global);
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&page).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&page).into_diagnostic()?);
        }
        _ => {
            let visible: Vec<&str> = args.columns.iter().map(ListColumn::key).collect();
            let rows = table_rows(&page.data, args.relative);
            let config = TableConfig {
                wrap_width: args.wrap.filter(|_| !matches!(format, OutputFormat::Csv | OutputFormat::Id)),
                ..TableConfig::for_pipe()
            };
            let show_pager = matches!(format, OutputFormat::Auto | OutputFormat::Tsv) && !global.quiet;

            if page.data.is_empty() && matches!(format, OutputFormat::Auto | OutputFormat::Tsv) {
                if !global.quiet {
                    println!("No inventory rows found.");
                    print_pager(&query, &page);
                }
                return Ok(());
            }

            TableFormatter::new(INVENTORY_COLUMNS, "row")
                .with_config(config)
                .output(&rows, format, &visible)?;

            if show_pager {
                print_pager(&query, &page);
            }
        }
    }

    Ok(())
}

fn print_pager(query: &InventoryQuery, page: &Page<InventoryRow>) {
    println!();
    println!(
        "{} of {} row(s), page {} of {}",
        style(page.data.len()).cyan(),
        style(page.total).cyan(),
        query.page,
        page.page_count.max(1)
    );
    if query.page < page.page_count {
        println!(
            "{}",
            style(format!("Next page: --page {}", query.page + 1)).dim()
        );
    }
}

/// Table rows for inventory output
pub fn table_rows(rows: &[InventoryRow], relative: bool) -> Vec<TableRow> {
    let now = Utc::now();
    let date = |value: Option<chrono::DateTime<Utc>>| match value {
        Some(dt) if relative => CellValue::Text(format_relative(&dt, &now)),
        other => CellValue::date(other),
    };

    rows.iter()
        .map(|row| {
            TableRow::new(row.key())
                .cell("mk", CellValue::Code(row.mk.clone()))
                .cell("artikelnr", CellValue::Code(row.artikelnr.clone()))
                .cell("benamning", CellValue::text(row.benamning.as_deref()))
                .cell("benamning2", CellValue::text(row.benamning2.as_deref()))
                .cell("location", CellValue::Text(row.location.clone()))
                .cell("status", CellValue::status(row.status.as_deref()))
                .cell("lagerplats", CellValue::text(row.lagerplats.as_deref()))
                .cell("fordon", CellValue::List(row.fordon.clone()))
                .cell("created", date(row.created_at))
                .cell("updated", date(row.updated_at))
        })
        .collect()
}

/// Build the query from `--input` (if any) and the flags layered on top
pub fn build_query(args: &ListArgs, default_per_page: usize) -> Result<InventoryQuery> {
    let mut query = match &args.input {
        Some(path) => read_query(path)?,
        None => InventoryQuery {
            per_page: default_per_page,
            ..Default::default()
        },
    };

    if let Some(page) = args.page {
        query.page = page;
    }
    if let Some(per_page) = args.per_page {
        query.per_page = per_page;
    }
    if !args.sort.is_empty() {
        query.sort = args.sort.iter().map(|s| parse_sort(s)).collect();
    }
    if let Some(search) = &args.search {
        query.q = Some(search.clone());
    }
    if !args.status.is_empty() {
        query.status = args.status.clone();
    }
    if !args.mk.is_empty() {
        query.mk = args.mk.clone();
    }
    if !args.location.is_empty() {
        query.location = args.location.clone();
    }
    if !args.filters.is_empty() {
        for raw in &args.filters {
            query.filters.push(parse_where(raw)?);
        }
        query.filter_flag = Some(FilterFlag::AdvancedFilters);
    }
    if let Some(join) = args.join {
        query.join_operator = join;
    }
    if let Some(flag) = args.filter_flag {
        query.filter_flag = Some(flag);
    }

    query.validate()?;
    Ok(query)
}

fn read_query(path: &Path) -> Result<InventoryQuery> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).into_diagnostic()?;
        buf
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| miette::miette!("cannot read query {}: {}", path.display(), e))?
    };

    serde_json::from_str(&content).map_err(|e| {
        miette::miette!(
            help = "expected camelCase fields such as page, perPage, sort, q, status, filters",
            "invalid query JSON: {}",
            e
        )
    })
}

/// `field`, `field:desc`, `field:asc` or `-field`
pub fn parse_sort(raw: &str) -> SortKey {
    let raw = raw.trim();
    if let Some(id) = raw.strip_prefix('-') {
        return SortKey {
            id: id.to_string(),
            desc: true,
        };
    }
    match raw.rsplit_once(':') {
        Some((id, dir)) if dir.eq_ignore_ascii_case("desc") => SortKey {
            id: id.to_string(),
            desc: true,
        },
        Some((id, dir)) if dir.eq_ignore_ascii_case("asc") => SortKey {
            id: id.to_string(),
            desc: false,
        },
        _ => SortKey {
            id: raw.to_string(),
            desc: false,
        },
    }
}

/// `field:op:value[,value]`; the operator may be left out (`mk:VO,SA`)
pub fn parse_where(raw: &str) -> Result<FilterClause> {
    let (id, rest) = match raw.split_once(':') {
        Some((id, rest)) => (id.trim(), Some(rest)),
        None => (raw.trim(), None),
    };
    if id.is_empty() {
        return Err(miette::miette!(
            help = "use field:op:value, e.g. status:inArray:J,B or updatedAt:isBetween:2024-01-01,2024-06-30",
            "filter '{}' names no field",
            raw
        ));
    }

    let (operator, value) = match rest {
        None => (None, ""),
        Some(rest) => match rest.split_once(':') {
            Some((op, value)) if Operator::parse(op).is_some() => (Operator::parse(op), value),
            _ => match Operator::parse(rest) {
                Some(op) => (Some(op), ""),
                None => (None, rest),
            },
        },
    };

    let values: Vec<String> = value.split(',').map(|v| v.trim().to_string()).collect();
    let value = match operator {
        Some(Operator::IsBetween) => FilterValue::Many(values),
        _ if values.len() == 1 => FilterValue::One(values.into_iter().next().unwrap_or_default()),
        _ => FilterValue::Many(values),
    };

    Ok(FilterClause {
        id: id.to_string(),
        value,
        operator,
        variant: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sort_forms() {
        assert_eq!(parse_sort("mk"), SortKey { id: "mk".into(), desc: false });
        assert_eq!(parse_sort("-updatedAt"), SortKey { id: "updatedAt".into(), desc: true });
        assert_eq!(parse_sort("location:desc"), SortKey { id: "location".into(), desc: true });
        assert_eq!(parse_sort("Artikelnr:ASC"), SortKey { id: "Artikelnr".into(), desc: false });
    }

    #[test]
    fn test_parse_where_with_operator() {
        let clause = parse_where("status:inArray:J,B").unwrap();
        assert_eq!(clause.id, "status");
        assert_eq!(clause.operator, Some(Operator::InArray));
        assert_eq!(clause.value.values(), vec!["J", "B"]);
    }

    #[test]
    fn test_parse_where_without_operator() {
        let clause = parse_where("mk:VO").unwrap();
        assert_eq!(clause.operator, None);
        assert_eq!(clause.value, FilterValue::One("VO".into()));

        let clause = parse_where("updatedAt:2024-05-01T10:00:00Z").unwrap();
        assert_eq!(clause.operator, None);
        assert_eq!(clause.value, FilterValue::One("2024-05-01T10:00:00Z".into()));
    }

    #[test]
    fn test_parse_where_keeps_open_range_bounds() {
        let clause = parse_where("updatedAt:isBetween:,2024-06-30").unwrap();
        assert_eq!(clause.operator, Some(Operator::IsBetween));
        assert_eq!(clause.value.positional(), vec!["", "2024-06-30"]);
    }

    #[test]
    fn test_parse_where_value_with_colons() {
        let clause = parse_where("createdAt:gte:2024-01-01T08:30:00Z").unwrap();
        assert_eq!(clause.operator, Some(Operator::Gte));
        assert_eq!(clause.value, FilterValue::One("2024-01-01T08:30:00Z".into()));
    }

    #[test]
    fn test_parse_where_unary_operator() {
        let clause = parse_where("lagerplats:isEmpty").unwrap();
        assert_eq!(clause.operator, Some(Operator::IsEmpty));
        assert!(clause.value.values().is_empty());
    }

    #[test]
    fn test_parse_where_rejects_missing_field() {
        assert!(parse_where(":eq:VO").is_err());
    }

    #[test]
    fn test_build_query_flags() {
        let args = ListArgs {
            search: Some("filter".into()),
            status: vec!["J".into()],
            filters: vec!["mk:eq:VO".into()],
            join: Some(JoinOperator::Or),
            sort: vec!["-updatedAt".into()],
            page: Some(2),
            ..Default::default()
        };
        let query = build_query(&args, 25).unwrap();

        assert_eq!(query.page, 2);
        assert_eq!(query.per_page, 25);
        assert_eq!(query.q.as_deref(), Some("filter"));
        assert_eq!(query.status, vec!["J"]);
        assert_eq!(query.filter_flag, Some(FilterFlag::AdvancedFilters));
        assert_eq!(query.join_operator, JoinOperator::Or);
        assert_eq!(query.sort, vec![SortKey { id: "updatedAt".into(), desc: true }]);
        assert!(query.is_advanced());
    }

    #[test]
    fn test_build_query_rejects_page_zero() {
        let args = ListArgs {
            page: Some(0),
            ..Default::default()
        };
        assert!(build_query(&args, 10).is_err());
    }

    #[test]
    fn test_build_query_reads_input_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("query.json");
        std::fs::write(
            &path,
            r#"{"page": 3, "perPage": 5, "mk": ["VO"], "joinOperator": "eller"}"#,
        )
        .unwrap();

        let args = ListArgs {
            input: Some(path),
            per_page: Some(7),
            ..Default::default()
        };
        let query = build_query(&args, 10).unwrap();
        assert_eq!(query.page, 3);
        assert_eq!(query.per_page, 7);
        assert_eq!(query.mk, vec!["VO"]);
        assert_eq!(query.join_operator, JoinOperator::Or);
    }

    #[test]
    fn test_table_rows_keys_and_cells() {
        let rows = vec![crate::core::query::tests::row("VO", "123", "Partille", Some("J"))];
        let table = table_rows(&rows, false);
        assert_eq!(table[0].key, rows[0].key());
        assert!(matches!(table[0].get("status"), Some(CellValue::Status(s)) if s == "J"));
    }
}
