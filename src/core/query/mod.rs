//! Inventory query model and in-memory engine
//!
//! An [`InventoryQuery`] is the table state the lookup UI sends: page, page
//! size, sort keys, free text, facet selections and optional advanced filter
//! clauses. It is turned into a [`Condition`] tree and a list of
//! [`SortSpec`]s, which either the in-memory engine ([`run`]) or the SQL
//! store evaluates.

mod condition;
mod sort;

pub use condition::{contains_ignore_case, Column, Condition};
pub use sort::{compare_rows, resolve_sort, SortSpec};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::record::InventoryRow;
use crate::core::snapshot::SnapshotError;

pub const DEFAULT_PER_PAGE: usize = 10;

/// Query input for an inventory page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InventoryQuery {
    pub page: usize,
    pub per_page: usize,
    pub sort: Vec<SortKey>,
    pub filter_flag: Option<FilterFlag>,
    /// Free text matched against article number and descriptions
    pub q: Option<String>,
    pub status: Vec<String>,
    pub location: Vec<String>,
    pub mk: Vec<String>,
    pub filters: Vec<FilterClause>,
    pub join_operator: JoinOperator,
}

impl Default for InventoryQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            sort: vec![SortKey {
                id: "Artikelnr".to_string(),
                desc: false,
            }],
            filter_flag: None,
            q: None,
            status: Vec::new(),
            location: Vec::new(),
            mk: Vec::new(),
            filters: Vec::new(),
            join_operator: JoinOperator::And,
        }
    }
}

impl InventoryQuery {
    /// Whether advanced filter clauses replace the simple facet filters
    pub fn is_advanced(&self) -> bool {
        matches!(
            self.filter_flag,
            Some(FilterFlag::AdvancedFilters) | Some(FilterFlag::CommandFilters)
        )
    }

    /// Row offset of the requested page
    ///
    /// Saturates, so an absurd page number lands past the end and comes
    /// back empty.
    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }

    /// Reject page numbers and sizes the pager cannot express
    pub fn validate(&self) -> Result<(), QueryError> {
        if self.page == 0 {
            return Err(QueryError::InvalidPage(self.page));
        }
        if self.per_page == 0 {
            return Err(QueryError::InvalidPageSize(self.per_page));
        }
        Ok(())
    }
}

/// One sort key as sent by the table (`{"id": "mk", "desc": true}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub id: String,
    #[serde(default)]
    pub desc: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum FilterFlag {
    AdvancedFilters,
    CommandFilters,
    Simple,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum JoinOperator {
    #[default]
    #[serde(alias = "och")]
    #[value(alias = "och")]
    And,
    #[serde(alias = "eller")]
    #[value(alias = "eller")]
    Or,
}

/// Advanced filter clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterClause {
    /// Column id, e.g. `mk` or `updatedAt`
    pub id: String,
    #[serde(default)]
    pub value: FilterValue,
    #[serde(default)]
    pub operator: Option<Operator>,
    /// Column variant hint from the table (`text`, `multiSelect`, `dateRange`, ...)
    #[serde(default)]
    pub variant: Option<String>,
}

/// A clause value: a single string or a list of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    One(String),
    Many(Vec<String>),
}

impl Default for FilterValue {
    fn default() -> Self {
        FilterValue::Many(Vec::new())
    }
}

impl FilterValue {
    /// Non-empty values, in order
    pub fn values(&self) -> Vec<String> {
        match self {
            FilterValue::One(s) => {
                let s = s.trim();
                if s.is_empty() {
                    Vec::new()
                } else {
                    vec![s.to_string()]
                }
            }
            FilterValue::Many(items) => items
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    /// Raw positional values, empty strings kept (range bounds)
    pub fn positional(&self) -> Vec<String> {
        match self {
            FilterValue::One(s) => vec![s.clone()],
            FilterValue::Many(items) => items.clone(),
        }
    }
}

/// Advanced filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "eq")]
    Eq,
    #[serde(rename = "ne")]
    Ne,
    #[serde(rename = "iLike")]
    ILike,
    #[serde(rename = "notILike")]
    NotILike,
    #[serde(rename = "isEmpty")]
    IsEmpty,
    #[serde(rename = "isNotEmpty")]
    IsNotEmpty,
    #[serde(rename = "inArray")]
    InArray,
    #[serde(rename = "notInArray")]
    NotInArray,
    #[serde(rename = "isBetween")]
    IsBetween,
    #[serde(rename = "lt")]
    Lt,
    #[serde(rename = "lte")]
    Lte,
    #[serde(rename = "gt")]
    Gt,
    #[serde(rename = "gte")]
    Gte,
}

impl Operator {
    pub fn all() -> &'static [Operator] {
        &[
            Operator::Eq,
            Operator::Ne,
            Operator::ILike,
            Operator::NotILike,
            Operator::IsEmpty,
            Operator::IsNotEmpty,
            Operator::InArray,
            Operator::NotInArray,
            Operator::IsBetween,
            Operator::Lt,
            Operator::Lte,
            Operator::Gt,
            Operator::Gte,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::ILike => "iLike",
            Operator::NotILike => "notILike",
            Operator::IsEmpty => "isEmpty",
            Operator::IsNotEmpty => "isNotEmpty",
            Operator::InArray => "inArray",
            Operator::NotInArray => "notInArray",
            Operator::IsBetween => "isBetween",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
        }
    }

    /// Parse an operator name, ignoring case
    pub fn parse(s: &str) -> Option<Operator> {
        Operator::all()
            .iter()
            .copied()
            .find(|op| op.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

/// One page of query results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page_count: usize,
    /// Number of rows matching the filters across all pages
    pub total: usize,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            page_count: 0,
            total: 0,
        }
    }
}

/// `ceil(total / per_page)`
pub fn page_count(total: usize, per_page: usize) -> usize {
    if per_page == 0 {
        0
    } else {
        total.div_ceil(per_page)
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum QueryError {
    #[error("page must be 1 or greater (got {0})")]
    #[diagnostic(code(lagerkoll::query::page))]
    InvalidPage(usize),

    #[error("page size must be 1 or greater (got {0})")]
    #[diagnostic(code(lagerkoll::query::per_page))]
    InvalidPageSize(usize),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("store query failed: {0}")]
    #[diagnostic(
        code(lagerkoll::query::store),
        help("run `lagerkoll seed` to (re)create the store")
    )]
    Store(#[from] rusqlite::Error),

    #[error("store data is corrupt: {0}")]
    #[diagnostic(code(lagerkoll::query::corrupt))]
    Corrupt(String),
}

/// Filter, sort and paginate rows in memory
pub fn run(rows: Vec<InventoryRow>, query: &InventoryQuery) -> Result<Page<InventoryRow>, QueryError> {
    query.validate()?;

    let condition = Condition::from_query(query);
    let specs = resolve_sort(&query.sort);
    tracing::debug!(?condition, ?specs, "running in-memory inventory query");

    let mut matching: Vec<InventoryRow> = rows.into_iter().filter(|r| condition.matches(r)).collect();
    // stable: ties keep snapshot order
    matching.sort_by(|a, b| compare_rows(a, b, &specs));

    let total = matching.len();
    let data = matching
        .into_iter()
        .skip(query.offset())
        .take(query.per_page)
        .collect();

    Ok(Page {
        data,
        page_count: page_count(total, query.per_page),
        total,
    })
}
