//! Table formatting for inventory listings
//!
//! Rows are built from typed cells so each output format can render the
//! same value its own way: colored and aligned for the terminal, raw codes
//! for CSV and ID output, escaped text for Markdown.
//!
//! # Text Wrapping
//!
//! - Set `TableConfig::wrap_width` to enable word-wrapped multi-line rows
//! - CSV and ID formats stay single-line for pipability

use std::io;

use chrono::{DateTime, Utc};
use console::style;
use miette::{IntoDiagnostic, Result};
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{format_date, truncate_str};
use crate::cli::OutputFormat;
use crate::core::{StatusCode, Tone};

/// Configuration for table output
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Maximum width for text columns before wrapping (None = truncate instead)
    pub wrap_width: Option<usize>,
    /// Show summary line after table (e.g., "5 row(s) shown")
    pub show_summary: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            wrap_width: None,
            show_summary: true,
        }
    }
}

impl TableConfig {
    /// Create config optimized for piping (no wrapping, no summary)
    pub fn for_pipe() -> Self {
        Self {
            wrap_width: None,
            show_summary: false,
        }
    }
}

/// Wrap text to fit within a maximum width, breaking at word boundaries
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if text.chars().count() <= max_width || max_width < 5 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        let current_len = current.chars().count();

        if !current.is_empty() && current_len + 1 + word_len <= max_width {
            current.push(' ');
            current.push_str(word);
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        // Force-break words longer than a line
        let mut chars: Vec<char> = word.chars().collect();
        while chars.len() > max_width {
            let rest = chars.split_off(max_width);
            lines.push(chars.into_iter().collect());
            chars = rest;
        }
        current = chars.into_iter().collect();
    }

    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// A typed cell value with semantic meaning for formatting
#[derive(Debug, Clone)]
pub enum CellValue {
    /// Maker code or article number (cyan)
    Code(String),
    /// Plain text, truncated to the column width
    Text(String),
    /// Stock status code, colored by tone
    Status(String),
    /// Date only, UTC
    Date(DateTime<Utc>),
    Number(i64),
    /// Comma-joined list (fordon, paket, ...)
    List(Vec<String>),
    Empty,
}

impl CellValue {
    pub fn text(value: Option<&str>) -> Self {
        match value {
            Some(s) if !s.is_empty() => CellValue::Text(s.to_string()),
            _ => CellValue::Empty,
        }
    }

    pub fn status(value: Option<&str>) -> Self {
        match value {
            Some(s) if !s.is_empty() => CellValue::Status(s.to_string()),
            _ => CellValue::Empty,
        }
    }

    pub fn date(value: Option<DateTime<Utc>>) -> Self {
        value.map_or(CellValue::Empty, CellValue::Date)
    }

    fn status_label(code: &str) -> &'static str {
        code.parse::<StatusCode>()
            .map(|s| s.label())
            .unwrap_or("Okänd")
    }

    /// Format for TSV output (with colors if terminal)
    pub fn format_tsv(&self, width: usize) -> String {
        match self {
            CellValue::Code(code) => {
                format!("{:<width$}", style(truncate_str(code, width)).cyan(), width = width)
            }
            CellValue::Text(s) => {
                format!("{:<width$}", truncate_str(s, width.saturating_sub(2)), width = width)
            }
            CellValue::Status(code) => {
                let label = format!("{} {}", code, Self::status_label(code));
                let label = truncate_str(&label, width);
                let styled = match code.parse::<StatusCode>().map(|s| s.tone()) {
                    Ok(Tone::Positive) => style(label).green(),
                    Ok(Tone::Neutral) => style(label).yellow(),
                    Ok(Tone::Negative) => style(label).red(),
                    Err(_) => style(label).dim(),
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Date(dt) => format!("{:<width$}", format_date(dt), width = width),
            CellValue::Number(n) => format!("{:>width$}", n, width = width),
            CellValue::List(items) => {
                let joined = items.join(", ");
                format!("{:<width$}", truncate_str(&joined, width.saturating_sub(2)), width = width)
            }
            CellValue::Empty => format!("{:<width$}", style("-").dim(), width = width),
        }
    }

    /// Format for Markdown output (no colors, escaped pipes)
    pub fn format_md(&self) -> String {
        let raw = match self {
            CellValue::Status(code) => format!("{} ({})", code, Self::status_label(code)),
            CellValue::Empty => "-".to_string(),
            other => other.raw(),
        };
        raw.replace('|', "\\|")
    }

    /// Raw value for CSV and ID output
    pub fn raw(&self) -> String {
        match self {
            CellValue::Code(s) | CellValue::Text(s) | CellValue::Status(s) => s.clone(),
            CellValue::Date(dt) => format_date(dt),
            CellValue::Number(n) => n.to_string(),
            CellValue::List(items) => items.join(", "),
            CellValue::Empty => String::new(),
        }
    }

    /// Display width of this cell's content (for dynamic column sizing)
    pub fn display_width(&self) -> usize {
        match self {
            CellValue::Code(s) | CellValue::Text(s) => s.chars().count(),
            CellValue::Status(code) => code.chars().count() + 1 + Self::status_label(code).chars().count(),
            CellValue::Date(_) => 10,
            CellValue::Number(n) => n.to_string().len(),
            CellValue::List(items) => items.join(", ").chars().count(),
            CellValue::Empty => 1,
        }
    }
}

/// Column definition with header label and maximum width
#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub key: &'static str,
    pub header: &'static str,
    pub width: usize,
}

impl ColumnDef {
    pub const fn new(key: &'static str, header: &'static str, width: usize) -> Self {
        Self { key, header, width }
    }
}

/// A row of cell values for table output
pub struct TableRow {
    /// Stable row key, printed by `-f id`
    pub key: String,
    pub cells: Vec<(&'static str, CellValue)>,
}

impl TableRow {
    pub fn new(key: String) -> Self {
        Self {
            key,
            cells: Vec::new(),
        }
    }

    pub fn cell(mut self, key: &'static str, value: CellValue) -> Self {
        self.cells.push((key, value));
        self
    }

    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.cells.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }
}

/// Table formatter that outputs rows in various formats
pub struct TableFormatter<'a> {
    columns: &'a [ColumnDef],
    entity_name: &'static str,
    config: TableConfig,
}

impl<'a> TableFormatter<'a> {
    pub fn new(columns: &'a [ColumnDef], entity_name: &'static str) -> Self {
        Self {
            columns,
            entity_name,
            config: TableConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TableConfig) -> Self {
        self.config = config;
        self
    }

    /// Output rows in the specified format
    ///
    /// JSON and YAML are serialized by the caller from the underlying rows;
    /// here they fall back to the styled table.
    pub fn output(&self, rows: &[TableRow], format: OutputFormat, visible: &[&str]) -> Result<()> {
        let columns: Vec<&ColumnDef> = self
            .columns
            .iter()
            .filter(|c| visible.contains(&c.key))
            .collect();

        match format {
            OutputFormat::Csv => self.output_csv(rows, &columns),
            OutputFormat::Md => {
                self.output_md(rows, &columns);
                Ok(())
            }
            OutputFormat::Id => {
                for row in rows {
                    println!("{}", row.key);
                }
                Ok(())
            }
            _ => {
                self.output_tsv(rows, &columns);
                Ok(())
            }
        }
    }

    /// Dynamic column widths: max of header and content, capped at the column width
    fn calculate_widths(&self, rows: &[TableRow], columns: &[&ColumnDef]) -> Vec<usize> {
        columns
            .iter()
            .map(|col| {
                let max_content = rows
                    .iter()
                    .filter_map(|r| r.get(col.key))
                    .map(CellValue::display_width)
                    .max()
                    .unwrap_or(0);
                let natural = col.header.chars().count().max(max_content.saturating_add(2));
                natural.min(col.width)
            })
            .collect()
    }

    fn output_tsv(&self, rows: &[TableRow], columns: &[&ColumnDef]) {
        let widths = self.calculate_widths(rows, columns);

        let header: Vec<String> = columns
            .iter()
            .zip(&widths)
            .map(|(col, w)| format!("{:<width$}", style(col.header).bold(), width = *w))
            .collect();
        println!("{}", header.join(" "));

        let total_width: usize = widths.iter().sum::<usize>() + widths.len().saturating_sub(1);
        println!("{}", "-".repeat(total_width));

        for row in rows {
            match self.config.wrap_width {
                Some(wrap) => self.output_tsv_row_wrapped(row, columns, &widths, wrap),
                None => {
                    let parts: Vec<String> = columns
                        .iter()
                        .zip(&widths)
                        .map(|(col, w)| match row.get(col.key) {
                            Some(value) => value.format_tsv(*w),
                            None => CellValue::Empty.format_tsv(*w),
                        })
                        .collect();
                    println!("{}", parts.join(" "));
                }
            }
        }

        if self.config.show_summary {
            println!();
            println!("{} {}(s) shown", style(rows.len()).cyan(), self.entity_name);
        }
    }

    fn output_tsv_row_wrapped(
        &self,
        row: &TableRow,
        columns: &[&ColumnDef],
        widths: &[usize],
        wrap_width: usize,
    ) {
        let wrapped: Vec<Vec<String>> = columns
            .iter()
            .map(|col| match row.get(col.key) {
                Some(value @ (CellValue::Text(_) | CellValue::List(_))) => {
                    wrap_text(&value.raw(), wrap_width)
                }
                Some(value) => vec![value.raw()],
                None => vec!["-".to_string()],
            })
            .collect();

        let max_lines = wrapped.iter().map(Vec::len).max().unwrap_or(1);
        for line in 0..max_lines {
            let parts: Vec<String> = wrapped
                .iter()
                .zip(widths)
                .map(|(cell, w)| {
                    let content = cell.get(line).map(String::as_str).unwrap_or("");
                    format!("{:<width$}", content, width = *w)
                })
                .collect();
            println!("{}", parts.join(" ").trim_end());
        }

        if max_lines > 1 {
            println!();
        }
    }

    fn output_csv(&self, rows: &[TableRow], columns: &[&ColumnDef]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(io::stdout());
        writer
            .write_record(columns.iter().map(|c| c.key))
            .into_diagnostic()?;
        for row in rows {
            writer
                .write_record(
                    columns
                        .iter()
                        .map(|c| row.get(c.key).map(CellValue::raw).unwrap_or_default()),
                )
                .into_diagnostic()?;
        }
        writer.flush().into_diagnostic()
    }

    fn output_md(&self, rows: &[TableRow], columns: &[&ColumnDef]) {
        let mut builder = Builder::default();
        builder.push_record(columns.iter().map(|c| c.header.to_string()));
        for row in rows {
            builder.push_record(columns.iter().map(|c| {
                row.get(c.key)
                    .map(CellValue::format_md)
                    .unwrap_or_else(|| "-".to_string())
            }));
        }
        println!("{}", builder.build().with(Style::markdown()));
    }
}
