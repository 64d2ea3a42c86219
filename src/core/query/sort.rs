//! Multi-key row ordering

use std::cmp::Ordering;

use super::{Column, SortKey};
use crate::core::record::InventoryRow;

/// A resolved sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub column: Column,
    pub desc: bool,
}

impl SortSpec {
    pub fn asc(column: Column) -> Self {
        Self { column, desc: false }
    }

    pub fn desc(column: Column) -> Self {
        Self { column, desc: true }
    }
}

/// Order used when the caller sends no sort keys
pub const DEFAULT_SORT: SortSpec = SortSpec {
    column: Column::UpdatedAt,
    desc: true,
};

/// Resolve the caller's sort keys in order
///
/// Unknown ids sort by `createdAt`. An empty list falls back to
/// [`DEFAULT_SORT`].
pub fn resolve_sort(keys: &[SortKey]) -> Vec<SortSpec> {
    if keys.is_empty() {
        return vec![DEFAULT_SORT];
    }
    keys.iter()
        .map(|key| {
            let column = Column::parse(&key.id).unwrap_or_else(|| {
                tracing::debug!(id = %key.id, "unknown sort id, using createdAt");
                Column::CreatedAt
            });
            SortSpec {
                column,
                desc: key.desc,
            }
        })
        .collect()
}

/// Compare two rows by a chain of sort keys
///
/// Missing values sort last ascending and first descending.
pub fn compare_rows(a: &InventoryRow, b: &InventoryRow, specs: &[SortSpec]) -> Ordering {
    for spec in specs {
        let ord = if spec.column.is_date() {
            nulls_last(spec.column.timestamp(a), spec.column.timestamp(b))
        } else {
            nulls_last(spec.column.text(a), spec.column.text(b))
        };
        let ord = if spec.desc { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn nulls_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
