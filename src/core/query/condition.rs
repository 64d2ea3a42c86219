//! Filter predicates
//!
//! A [`Condition`] is a small boolean tree over row columns. It is built once
//! from an [`InventoryQuery`] and then either evaluated against rows in
//! memory or compiled to SQL by the store, so both sources share one set of
//! filter semantics. Comparisons against a missing value are false, as in SQL.

use chrono::{DateTime, Duration, Utc};

use super::{FilterClause, InventoryQuery, JoinOperator, Operator};
use crate::core::record::InventoryRow;
use crate::core::snapshot::parse_timestamp;

/// Filterable and sortable row columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Mk,
    Artikelnr,
    Location,
    Status,
    Lagerplats,
    Benamning,
    Benamning2,
    Extrainfo,
    CreatedAt,
    UpdatedAt,
}

impl Column {
    pub fn all() -> &'static [Column] {
        &[
            Column::Mk,
            Column::Artikelnr,
            Column::Location,
            Column::Status,
            Column::Lagerplats,
            Column::Benamning,
            Column::Benamning2,
            Column::Extrainfo,
            Column::CreatedAt,
            Column::UpdatedAt,
        ]
    }

    /// Column id as the table sends it
    pub fn id(&self) -> &'static str {
        match self {
            Column::Mk => "mk",
            Column::Artikelnr => "artikelnr",
            Column::Location => "location",
            Column::Status => "status",
            Column::Lagerplats => "lagerplats",
            Column::Benamning => "benamning",
            Column::Benamning2 => "benamning2",
            Column::Extrainfo => "extrainfo",
            Column::CreatedAt => "createdAt",
            Column::UpdatedAt => "updatedAt",
        }
    }

    /// Resolve a column id, ignoring case and accepting the Swedish spellings
    pub fn parse(id: &str) -> Option<Column> {
        let folded: String = id
            .chars()
            .flat_map(char::to_lowercase)
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| match c {
                'å' | 'ä' => 'a',
                'ö' => 'o',
                other => other,
            })
            .collect();

        match folded.as_str() {
            "mk" | "markeskod" => Some(Column::Mk),
            "artikelnr" | "artikelnummer" => Some(Column::Artikelnr),
            "location" | "lager" => Some(Column::Location),
            "status" => Some(Column::Status),
            "lagerplats" => Some(Column::Lagerplats),
            "benamning" => Some(Column::Benamning),
            "benamning2" => Some(Column::Benamning2),
            "extrainfo" => Some(Column::Extrainfo),
            "createdat" => Some(Column::CreatedAt),
            "updatedat" => Some(Column::UpdatedAt),
            _ => None,
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Column::CreatedAt | Column::UpdatedAt)
    }

    /// Facet columns filter by set membership unless told otherwise
    pub fn is_facet(&self) -> bool {
        matches!(self, Column::Mk | Column::Location | Column::Status)
    }

    pub fn text<'a>(&self, row: &'a InventoryRow) -> Option<&'a str> {
        match self {
            Column::Mk => Some(row.mk.as_str()),
            Column::Artikelnr => Some(row.artikelnr.as_str()),
            Column::Location => Some(row.location.as_str()),
            Column::Status => row.status.as_deref(),
            Column::Lagerplats => row.lagerplats.as_deref(),
            Column::Benamning => row.benamning.as_deref(),
            Column::Benamning2 => row.benamning2.as_deref(),
            Column::Extrainfo => row.extrainfo.as_deref(),
            Column::CreatedAt | Column::UpdatedAt => None,
        }
    }

    pub fn timestamp(&self, row: &InventoryRow) -> Option<DateTime<Utc>> {
        match self {
            Column::CreatedAt => row.created_at,
            Column::UpdatedAt => row.updated_at,
            _ => None,
        }
    }

    fn is_blank(&self, row: &InventoryRow) -> bool {
        if self.is_date() {
            self.timestamp(row).is_none()
        } else {
            self.text(row).map_or(true, str::is_empty)
        }
    }
}

/// Boolean filter tree
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Every child holds; empty means no restriction
    All(Vec<Condition>),
    /// Some child holds; empty means no restriction
    Any(Vec<Condition>),
    /// Case-insensitive substring match
    Contains { column: Column, needle: String },
    NotContains { column: Column, needle: String },
    Equals { column: Column, value: String },
    NotEquals { column: Column, value: String },
    In { column: Column, values: Vec<String> },
    NotIn { column: Column, values: Vec<String> },
    IsEmpty(Column),
    IsNotEmpty(Column),
    /// Inclusive timestamp range; a missing bound is open
    Between {
        column: Column,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
}

impl Condition {
    /// Build the filter for a query
    ///
    /// Advanced clauses are used when the filter flag asks for them and at
    /// least one clause is usable; otherwise the free text and facet filters
    /// apply.
    pub fn from_query(query: &InventoryQuery) -> Condition {
        if query.is_advanced() {
            if let Some(advanced) = Self::from_clauses(&query.filters, query.join_operator) {
                return advanced;
            }
        }
        Self::simple(query)
    }

    /// Free text plus facet membership, all required
    pub fn simple(query: &InventoryQuery) -> Condition {
        let mut parts = Vec::new();

        if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            parts.push(Condition::Any(
                [Column::Artikelnr, Column::Benamning, Column::Benamning2]
                    .into_iter()
                    .map(|column| Condition::Contains {
                        column,
                        needle: q.to_string(),
                    })
                    .collect(),
            ));
        }

        for (column, values) in [
            (Column::Status, &query.status),
            (Column::Location, &query.location),
            (Column::Mk, &query.mk),
        ] {
            let values: Vec<String> = values
                .iter()
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(String::from)
                .collect();
            if !values.is_empty() {
                parts.push(Condition::In { column, values });
            }
        }

        Condition::All(parts)
    }

    /// Combine advanced clauses; `None` when no clause is usable
    pub fn from_clauses(clauses: &[FilterClause], join: JoinOperator) -> Option<Condition> {
        let parts: Vec<Condition> = clauses.iter().filter_map(Self::from_clause).collect();
        if parts.is_empty() {
            return None;
        }
        Some(match join {
            JoinOperator::And => Condition::All(parts),
            JoinOperator::Or => Condition::Any(parts),
        })
    }

    /// Translate one clause; unknown columns and missing values yield `None`
    pub fn from_clause(clause: &FilterClause) -> Option<Condition> {
        let Some(column) = Column::parse(&clause.id) else {
            tracing::debug!(id = %clause.id, "ignoring filter on unknown column");
            return None;
        };

        let operator = clause.operator.unwrap_or(if column.is_facet() {
            Operator::InArray
        } else if column.is_date() {
            Operator::IsBetween
        } else {
            Operator::ILike
        });

        match operator {
            Operator::IsEmpty => return Some(Condition::IsEmpty(column)),
            Operator::IsNotEmpty => return Some(Condition::IsNotEmpty(column)),
            _ => {}
        }

        if column.is_date() {
            return Self::date_clause(column, operator, clause);
        }

        let values = clause.value.values();
        let first = values.first().cloned();
        let condition = match operator {
            Operator::Eq => Condition::Equals { column, value: first? },
            Operator::Ne => Condition::NotEquals { column, value: first? },
            Operator::ILike => Condition::Contains { column, needle: first? },
            Operator::NotILike => Condition::NotContains { column, needle: first? },
            Operator::InArray if !values.is_empty() => Condition::In { column, values },
            Operator::NotInArray if !values.is_empty() => Condition::NotIn { column, values },
            other => {
                tracing::debug!(column = column.id(), operator = other.as_str(), "unsupported text filter");
                return None;
            }
        };
        Some(condition)
    }

    fn date_clause(column: Column, operator: Operator, clause: &FilterClause) -> Option<Condition> {
        let between = |from, to| Some(Condition::Between { column, from, to });

        if operator == Operator::IsBetween {
            let bounds = clause.value.positional();
            if bounds.len() != 2 {
                return None;
            }
            let from = parse_timestamp(&bounds[0]).map(start_of_day);
            let to = parse_timestamp(&bounds[1]).map(end_of_day);
            if from.is_none() && to.is_none() {
                return None;
            }
            return between(from, to);
        }

        let day = clause
            .value
            .values()
            .first()
            .and_then(|v| parse_timestamp(v))?;
        let (start, end) = (start_of_day(day), end_of_day(day));
        // `None` at the edges of the representable range: nothing lies beyond
        let millisecond = Duration::milliseconds(1);
        let before = start.checked_sub_signed(millisecond);
        let after = end.checked_add_signed(millisecond);

        match operator {
            Operator::Eq => between(Some(start), Some(end)),
            Operator::Ne => {
                let sides: Vec<Condition> = [
                    before.map(|to| Condition::Between { column, from: None, to: Some(to) }),
                    after.map(|from| Condition::Between { column, from: Some(from), to: None }),
                ]
                .into_iter()
                .flatten()
                .collect();
                Some(Condition::Any(sides))
            }
            Operator::Lt => between(None, Some(before?)),
            Operator::Lte => between(None, Some(end)),
            Operator::Gt => between(Some(after?), None),
            Operator::Gte => between(Some(start), None),
            other => {
                tracing::debug!(column = column.id(), operator = other.as_str(), "unsupported date filter");
                None
            }
        }
    }

    /// Evaluate against a row
    pub fn matches(&self, row: &InventoryRow) -> bool {
        match self {
            Condition::All(parts) => parts.iter().all(|c| c.matches(row)),
            Condition::Any(parts) => parts.is_empty() || parts.iter().any(|c| c.matches(row)),
            Condition::Contains { column, needle } => column
                .text(row)
                .is_some_and(|h| contains_ignore_case(h, needle)),
            Condition::NotContains { column, needle } => column
                .text(row)
                .is_some_and(|h| !contains_ignore_case(h, needle)),
            Condition::Equals { column, value } => column.text(row) == Some(value.as_str()),
            Condition::NotEquals { column, value } => {
                column.text(row).is_some_and(|t| t != value)
            }
            Condition::In { column, values } => column
                .text(row)
                .is_some_and(|t| values.iter().any(|v| v == t)),
            Condition::NotIn { column, values } => column
                .text(row)
                .is_some_and(|t| !values.iter().any(|v| v == t)),
            Condition::IsEmpty(column) => column.is_blank(row),
            Condition::IsNotEmpty(column) => !column.is_blank(row),
            Condition::Between { column, from, to } => {
                column.timestamp(row).is_some_and(|t| {
                    from.map_or(true, |f| t >= f) && to.map_or(true, |end| t <= end)
                })
            }
        }
    }
}

/// Unicode-aware case-insensitive substring test
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn start_of_day(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(t)
}

fn end_of_day(t: DateTime<Utc>) -> DateTime<Utc> {
    t.date_naive()
        .and_hms_milli_opt(23, 59, 59, 999)
        .map(|dt| dt.and_utc())
        .unwrap_or(t)
}
