//! `lagerkoll schema` command - Print the embedded snapshot schema
//!
//! Lets scripts and editors see exactly what `validate`, `seed` and `sync`
//! accept without shipping the schema file separately.

use console::style;
use miette::{IntoDiagnostic, Result};
use serde_json::Value;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::schema::{schema_source, LAGER_SCHEMA};

#[derive(clap::Args, Debug)]
pub struct SchemaArgs {
    /// Show a field summary instead of the raw JSON Schema
    #[arg(long)]
    pub fields: bool,
}

pub fn run(args: SchemaArgs, global: &GlobalOpts) -> Result<()> {
    let source = schema_source()
        .ok_or_else(|| miette::miette!("embedded schema {} is missing", LAGER_SCHEMA))?;

    if !args.fields {
        print!("{}", source);
        if !source.ends_with('\n') {
            println!();
        }
        return Ok(());
    }

    let schema: Value = serde_json::from_str(&source).into_diagnostic()?;
    let fields = item_fields(&schema);

    match global.format {
        OutputFormat::Json => {
            let map: serde_json::Map<String, Value> = fields
                .iter()
                .map(|(name, kind, _)| (name.clone(), Value::String(kind.clone())))
                .collect();
            println!("{}", serde_json::to_string_pretty(&map).into_diagnostic()?);
        }
        _ => {
            let title = schema["title"].as_str().unwrap_or(LAGER_SCHEMA);
            println!("{}", style(title).bold());
            if let Some(desc) = schema["description"].as_str() {
                println!("{}", style(desc).dim());
            }
            println!();
            println!("{:<16} {:<28} {}", style("FIELD").bold(), style("TYPE").bold(), style("NOTES").bold());
            println!("{}", "-".repeat(70));
            for (name, kind, notes) in fields {
                println!("{:<16} {:<28} {}", style(name).cyan(), kind, style(notes).dim());
            }
            println!();
            println!(
                "{}",
                style("Field names are matched loosely (case, å/ä/ö, separators) before validation.").dim()
            );
        }
    }

    Ok(())
}

/// (name, type, notes) for every item property, resolving `$defs` refs
fn item_fields(schema: &Value) -> Vec<(String, String, String)> {
    let defs = &schema["$defs"];
    let Some(properties) = defs["item"]["properties"].as_object() else {
        return Vec::new();
    };

    properties
        .iter()
        .map(|(name, prop)| {
            let resolved = prop["$ref"]
                .as_str()
                .and_then(|r| r.strip_prefix("#/$defs/"))
                .map(|def| &defs[def])
                .unwrap_or(prop);
            (
                name.clone(),
                type_name(&resolved["type"]),
                resolved["description"].as_str().unwrap_or("").to_string(),
            )
        })
        .collect()
}

fn type_name(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" | "),
        _ => "any".to_string(),
    }
}
