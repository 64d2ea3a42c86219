//! Facet counts over the whole inventory

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::core::query::Column;
use crate::core::record::InventoryRow;

/// One selectable facet value with its row count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetOption {
    pub value: String,
    pub label: String,
    pub count: usize,
}

impl FacetOption {
    pub fn new(value: String, count: usize) -> Self {
        Self {
            label: value.clone(),
            value,
            count,
        }
    }
}

/// Rows per status, empty statuses omitted
pub fn status_counts(rows: &[InventoryRow]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for status in rows.iter().filter_map(|r| r.status.as_deref()) {
        if !status.is_empty() {
            *counts.entry(status.to_string()).or_insert(0) += 1;
        }
    }
    counts
}

/// Facet options for a column, by count descending then label ascending
pub fn value_counts(rows: &[InventoryRow], column: Column) -> Vec<FacetOption> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in rows.iter().filter_map(|r| column.text(r)) {
        if !value.is_empty() {
            *counts.entry(value).or_insert(0) += 1;
        }
    }

    let mut options: Vec<FacetOption> = counts
        .into_iter()
        .map(|(value, count)| FacetOption::new(value.to_string(), count))
        .collect();
    sort_options(&mut options);
    options
}

pub fn sort_options(options: &mut [FacetOption]) {
    options.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
}
