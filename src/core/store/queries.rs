//! Query methods for the inventory store
//!
//! A [`Condition`] is compiled to a parameterized WHERE clause over
//! `inventory LEFT JOIN articles`; ordering and pagination are pushed down too.

use std::collections::BTreeMap;

use rusqlite::ToSql;
use serde::de::DeserializeOwned;

use super::{format_timestamp, parse_timestamp, InventoryStore, ICONTAINS_FN};
use crate::core::facets::FacetOption;
use crate::core::query::{
    page_count, resolve_sort, Column, Condition, InventoryQuery, Page, QueryError, SortSpec,
};
use crate::core::record::InventoryRow;

const FROM_JOINED: &str =
    "FROM inventory i LEFT JOIN articles a ON a.mk = i.mk AND a.artikelnr = i.artikelnr";

const ROW_COLUMNS: &str = "i.id, i.mk, i.artikelnr, i.location, i.status, i.lagerplats, \
     a.benamning, a.benamning2, a.extrainfo, a.bild, \
     a.paket, a.fordon, a.alternativart, a.ersatter, a.ersatt_av, \
     i.created_at, i.updated_at";

/// SQL expression for a column
fn column_expr(column: Column) -> &'static str {
    match column {
        Column::Mk => "i.mk",
        Column::Artikelnr => "i.artikelnr",
        Column::Location => "i.location",
        Column::Status => "i.status",
        Column::Lagerplats => "i.lagerplats",
        Column::Benamning => "a.benamning",
        Column::Benamning2 => "a.benamning2",
        Column::Extrainfo => "a.extrainfo",
        Column::CreatedAt => "i.created_at",
        Column::UpdatedAt => "i.updated_at",
    }
}

/// Compile a condition to SQL, pushing its bind values onto `params`
pub(crate) fn compile(condition: &Condition, params: &mut Vec<Box<dyn ToSql>>) -> String {
    match condition {
        Condition::All(parts) | Condition::Any(parts) if parts.is_empty() => "1=1".to_string(),
        Condition::All(parts) => join_parts(parts, " AND ", params),
        Condition::Any(parts) => join_parts(parts, " OR ", params),
        Condition::Contains { column, needle } => {
            params.push(Box::new(needle.clone()));
            format!("{}({}, ?)", ICONTAINS_FN, column_expr(*column))
        }
        Condition::NotContains { column, needle } => {
            params.push(Box::new(needle.clone()));
            format!("NOT {}({}, ?)", ICONTAINS_FN, column_expr(*column))
        }
        Condition::Equals { column, value } => {
            params.push(Box::new(value.clone()));
            format!("{} = ?", column_expr(*column))
        }
        Condition::NotEquals { column, value } => {
            params.push(Box::new(value.clone()));
            format!("{} <> ?", column_expr(*column))
        }
        Condition::In { column, values } => {
            format!("{} IN ({})", column_expr(*column), placeholders(values, params))
        }
        Condition::NotIn { column, values } => {
            format!("{} NOT IN ({})", column_expr(*column), placeholders(values, params))
        }
        Condition::IsEmpty(column) if column.is_date() => {
            format!("{} IS NULL", column_expr(*column))
        }
        Condition::IsEmpty(column) => {
            let expr = column_expr(*column);
            format!("({} IS NULL OR {} = '')", expr, expr)
        }
        Condition::IsNotEmpty(column) if column.is_date() => {
            format!("{} IS NOT NULL", column_expr(*column))
        }
        Condition::IsNotEmpty(column) => {
            let expr = column_expr(*column);
            format!("({} IS NOT NULL AND {} <> '')", expr, expr)
        }
        Condition::Between { column, from, to } => {
            let expr = column_expr(*column);
            let mut bounds = Vec::new();
            if let Some(from) = from {
                params.push(Box::new(format_timestamp(from)));
                bounds.push(format!("{} >= ?", expr));
            }
            if let Some(to) = to {
                params.push(Box::new(format_timestamp(to)));
                bounds.push(format!("{} <= ?", expr));
            }
            if bounds.is_empty() {
                format!("{} IS NOT NULL", expr)
            } else {
                format!("({})", bounds.join(" AND "))
            }
        }
    }
}

fn join_parts(parts: &[Condition], sep: &str, params: &mut Vec<Box<dyn ToSql>>) -> String {
    let compiled: Vec<String> = parts.iter().map(|c| compile(c, params)).collect();
    format!("({})", compiled.join(sep))
}

fn placeholders(values: &[String], params: &mut Vec<Box<dyn ToSql>>) -> String {
    for v in values {
        params.push(Box::new(v.clone()));
    }
    vec!["?"; values.len()].join(", ")
}

/// ORDER BY clause matching the in-memory comparator, `i.rowid` breaking ties
pub(crate) fn order_by(specs: &[SortSpec]) -> String {
    let mut terms: Vec<String> = specs
        .iter()
        .map(|spec| {
            let direction = if spec.desc {
                "DESC NULLS FIRST"
            } else {
                "ASC NULLS LAST"
            };
            format!("{} {}", column_expr(spec.column), direction)
        })
        .collect();
    terms.push("i.rowid ASC".to_string());
    terms.join(", ")
}

/// Row as read from SQLite, JSON columns still encoded
struct RawRow {
    id: String,
    mk: String,
    artikelnr: String,
    location: String,
    status: Option<String>,
    lagerplats: Option<String>,
    benamning: Option<String>,
    benamning2: Option<String>,
    extrainfo: Option<String>,
    bild: Option<bool>,
    lists: [Option<String>; 5],
    created_at: Option<String>,
    updated_at: Option<String>,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            mk: row.get(1)?,
            artikelnr: row.get(2)?,
            location: row.get(3)?,
            status: row.get(4)?,
            lagerplats: row.get(5)?,
            benamning: row.get(6)?,
            benamning2: row.get(7)?,
            extrainfo: row.get(8)?,
            bild: row.get::<_, Option<i64>>(9)?.map(|v| v != 0),
            lists: [row.get(10)?, row.get(11)?, row.get(12)?, row.get(13)?, row.get(14)?],
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }

    fn into_row(self) -> Result<InventoryRow, QueryError> {
        let [paket, fordon, alternativart, ersatter, ersatt_av] = self.lists;
        Ok(InventoryRow {
            paket: decode_list(&self.id, "paket", paket)?,
            fordon: decode_list(&self.id, "fordon", fordon)?,
            alternativart: decode_list(&self.id, "alternativart", alternativart)?,
            ersatter: decode_list(&self.id, "ersatter", ersatter)?,
            ersatt_av: decode_list(&self.id, "ersatt_av", ersatt_av)?,
            id: self.id,
            mk: self.mk,
            artikelnr: self.artikelnr,
            location: self.location,
            status: self.status,
            lagerplats: self.lagerplats,
            benamning: self.benamning,
            benamning2: self.benamning2,
            extrainfo: self.extrainfo,
            bild: self.bild,
            created_at: parse_timestamp(self.created_at),
            updated_at: parse_timestamp(self.updated_at),
        })
    }
}

fn decode_list<T: DeserializeOwned>(
    id: &str,
    column: &str,
    raw: Option<String>,
) -> Result<Vec<T>, QueryError> {
    match raw {
        None => Ok(Vec::new()),
        Some(s) => serde_json::from_str(&s)
            .map_err(|e| QueryError::Corrupt(format!("{} of row {}: {}", column, id, e))),
    }
}

impl InventoryStore {
    /// Filter, sort and paginate inside SQLite
    pub fn query(&self, query: &InventoryQuery) -> Result<Page<InventoryRow>, QueryError> {
        query.validate()?;

        let condition = Condition::from_query(query);
        let specs = resolve_sort(&query.sort);

        let mut params_vec: Vec<Box<dyn ToSql>> = vec![];
        let where_clause = compile(&condition, &mut params_vec);
        let order = order_by(&specs);
        tracing::debug!(%where_clause, %order, "running store inventory query");

        let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

        let count_sql = format!("SELECT COUNT(*) {} WHERE {}", FROM_JOINED, where_clause);
        let total: i64 = self
            .conn
            .query_row(&count_sql, params_refs.as_slice(), |row| row.get(0))?;
        let total = total.max(0) as usize;

        if total == 0 || query.offset() >= total {
            return Ok(Page {
                data: Vec::new(),
                page_count: page_count(total, query.per_page),
                total,
            });
        }

        let sql = format!(
            "SELECT {} {} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            ROW_COLUMNS, FROM_JOINED, where_clause, order
        );
        // offset < total here, so only the page size can exceed i64
        let limit = i64::try_from(query.per_page).unwrap_or(i64::MAX);
        let offset = i64::try_from(query.offset()).unwrap_or(i64::MAX);
        let mut page_params = params_refs;
        page_params.push(&limit);
        page_params.push(&offset);

        let mut stmt = self.conn.prepare(&sql)?;
        let raw: Vec<RawRow> = stmt
            .query_map(page_params.as_slice(), RawRow::from_row)?
            .collect::<rusqlite::Result<_>>()?;
        let data = raw
            .into_iter()
            .map(RawRow::into_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page {
            data,
            page_count: page_count(total, query.per_page),
            total,
        })
    }

    /// Row count per status over the whole inventory, empty statuses omitted
    pub fn status_counts(&self) -> Result<BTreeMap<String, usize>, QueryError> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM inventory
             WHERE status IS NOT NULL AND status <> ''
             GROUP BY status",
        )?;
        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;
        Ok(counts)
    }

    /// Facet options for a column, most frequent first
    pub fn value_counts(&self, column: Column) -> Result<Vec<FacetOption>, QueryError> {
        let expr = column_expr(column);
        let sql = format!(
            "SELECT {expr}, COUNT(*) AS n {FROM_JOINED}
             WHERE {expr} IS NOT NULL AND {expr} <> ''
             GROUP BY {expr}
             ORDER BY n DESC, {expr} ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let options = stmt
            .query_map([], |row| {
                let value: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok(FacetOption::new(value, count as usize))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(options)
    }

    pub fn mk_counts(&self) -> Result<Vec<FacetOption>, QueryError> {
        self.value_counts(Column::Mk)
    }

    pub fn location_counts(&self) -> Result<Vec<FacetOption>, QueryError> {
        self.value_counts(Column::Location)
    }
}
