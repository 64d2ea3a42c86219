//! Snapshot validation with detailed error reporting

use std::borrow::Cow;
use std::path::Path;

use jsonschema::{validator_for, ValidationError as JsonSchemaError, Validator as JsonValidator};
use miette::{Diagnostic, IntoDiagnostic, NamedSource, SourceSpan};
use rust_embed::Embed;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::core::snapshot::{canonical_key, read_snapshot, sanitize, split_rows, LagerDocument, Snapshot};

#[derive(Embed)]
#[folder = "schemas/"]
struct EmbeddedSchemas;

/// File name of the embedded snapshot schema
pub const LAGER_SCHEMA: &str = "lager.schema.json";

/// Text of the embedded snapshot schema
pub fn schema_source() -> Option<Cow<'static, str>> {
    EmbeddedSchemas::get(LAGER_SCHEMA).map(|file| match file.data {
        Cow::Borrowed(bytes) => String::from_utf8_lossy(bytes),
        Cow::Owned(bytes) => Cow::Owned(String::from_utf8_lossy(&bytes).into_owned()),
    })
}

/// Validation error with source location information
#[derive(Debug, Error, Diagnostic)]
#[error("Snapshot validation failed: {summary}")]
#[diagnostic(
    code(lagerkoll::schema::validation_error),
    help("run `lagerkoll schema` to see what a snapshot may contain")
)]
pub struct ValidationError {
    summary: String,

    #[source_code]
    src: NamedSource<String>,

    #[related]
    violations: Vec<SchemaViolation>,
}

/// A single schema violation
#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct SchemaViolation {
    #[label("{}", self.hint)]
    span: SourceSpan,

    message: String,
    hint: String,

    #[help]
    help: Option<String>,
}

impl SchemaViolation {
    pub fn new(message: String, hint: String, span: SourceSpan, help: Option<String>) -> Self {
        Self {
            span,
            message,
            hint,
            help,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl ValidationError {
    pub fn new(filename: &str, source: &str, violations: Vec<SchemaViolation>) -> Self {
        let count = violations.len();
        let summary = if count == 1 {
            "1 error".to_string()
        } else {
            format!("{} errors", count)
        };
        Self {
            summary,
            src: NamedSource::new(filename, source.to_string()),
            violations,
        }
    }

    /// Get the number of violations
    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    pub fn violations(&self) -> &[SchemaViolation] {
        &self.violations
    }
}

/// Validator holding the compiled snapshot schema
pub struct Validator {
    compiled: JsonValidator,
}

impl Validator {
    /// Compile the embedded schema
    pub fn new() -> miette::Result<Self> {
        let source = schema_source()
            .ok_or_else(|| miette::miette!("embedded schema {} is missing", LAGER_SCHEMA))?;
        let schema: JsonValue = serde_json::from_str(&source).into_diagnostic()?;
        let compiled = validator_for(&schema)
            .map_err(|e| miette::miette!("embedded schema does not compile: {}", e))?;
        Ok(Self { compiled })
    }

    /// Parse, sanitize and validate snapshot text
    ///
    /// Every violation is collected; spans point at the offending key in the
    /// original text where it can be found.
    pub fn check_document(&self, content: &str, filename: &str) -> Result<LagerDocument, ValidationError> {
        let raw: JsonValue = serde_json::from_str(content).map_err(|e| {
            let violation = SchemaViolation::new(
                format!("JSON parse error: {}", e),
                "invalid JSON".to_string(),
                line_column_span(content, e.line(), e.column()),
                Some("Check JSON syntax - commas, brackets, quotes".to_string()),
            );
            ValidationError::new(filename, content, vec![violation])
        })?;

        let doc = sanitize(&raw).map_err(|e| {
            let violation = SchemaViolation::new(
                e.to_string(),
                "unexpected shape".to_string(),
                first_line_span(content),
                Some("Use an object keyed by location, or an array of items with a `Lager` field".to_string()),
            );
            ValidationError::new(filename, content, vec![violation])
        })?;

        // a document of string-keyed arrays of objects always converts
        let instance = serde_json::to_value(&doc).unwrap_or(JsonValue::Null);
        let violations: Vec<SchemaViolation> = self
            .compiled
            .iter_errors(&instance)
            .map(|e| error_to_violation(content, &e))
            .collect();

        if violations.is_empty() {
            Ok(doc)
        } else {
            Err(ValidationError::new(filename, content, violations))
        }
    }

    /// Read and validate a snapshot file, then split it into rows
    pub fn load_file(&self, path: &Path) -> miette::Result<Snapshot> {
        let content = read_snapshot(path)?;
        let filename = path.display().to_string();
        let doc = self.check_document(&content, &filename)?;
        let snapshot = split_rows(&doc);
        tracing::debug!(
            path = %path.display(),
            articles = snapshot.articles.len(),
            entries = snapshot.entries.len(),
            skipped = snapshot.skipped,
            "validated snapshot"
        );
        Ok(snapshot)
    }
}

/// Convert a JSON Schema validation error to our violation format
fn error_to_violation(content: &str, error: &JsonSchemaError) -> SchemaViolation {
    let path = error.instance_path.to_string();
    let message = format_schema_error(error);
    let hint = format_error_hint(error);
    let help = generate_help_message(error);

    let span = find_path_span(content, &path);

    SchemaViolation::new(message, hint, span, help)
}

/// Format a JSON Schema error into a user-friendly message
fn format_schema_error(error: &JsonSchemaError) -> String {
    let path = if error.instance_path.as_str().is_empty() {
        "document root".to_string()
    } else {
        format!("'{}'", error.instance_path)
    };

    match &error.kind {
        jsonschema::error::ValidationErrorKind::Required { property } => {
            let prop_str = property
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| property.to_string());
            format!("Missing required field: {} at {}", prop_str, path)
        }
        jsonschema::error::ValidationErrorKind::Type { kind } => {
            format!("Wrong type at {}: expected {:?}", path, kind)
        }
        jsonschema::error::ValidationErrorKind::MinLength { limit } => {
            format!("Value at {} is too short: minimum {} characters", path, limit)
        }
        jsonschema::error::ValidationErrorKind::MaxLength { limit } => {
            format!("Value at {} is too long: maximum {} characters", path, limit)
        }
        jsonschema::error::ValidationErrorKind::AdditionalProperties { unexpected } => {
            format!("Unknown field(s) at {}: {}", path, unexpected.join(", "))
        }
        _ => format!("Validation error at {}: {}", path, error),
    }
}

/// Generate a short hint for the error label
fn format_error_hint(error: &JsonSchemaError) -> String {
    match &error.kind {
        jsonschema::error::ValidationErrorKind::Required { .. } => "required field missing".to_string(),
        jsonschema::error::ValidationErrorKind::Type { .. } => "wrong type".to_string(),
        jsonschema::error::ValidationErrorKind::MinLength { .. } => "too short".to_string(),
        jsonschema::error::ValidationErrorKind::MaxLength { .. } => "too long".to_string(),
        jsonschema::error::ValidationErrorKind::AdditionalProperties { .. } => "unknown field".to_string(),
        _ => "validation error".to_string(),
    }
}

/// Generate a help message with suggestions for fixing the error
fn generate_help_message(error: &JsonSchemaError) -> Option<String> {
    let field = error
        .instance_path
        .as_str()
        .rsplit('/')
        .next()
        .unwrap_or_default();

    match &error.kind {
        jsonschema::error::ValidationErrorKind::Type { kind } => match field {
            "MK" | "Artikelnr" => Some("Codes are strings (or plain integers), e.g. \"VO\"".to_string()),
            "Fordon" | "Paket" | "Ersätter" | "ErsattAv" => {
                Some("Use a list of strings or one comma separated string".to_string())
            }
            "CreatedAt" | "UpdatedAt" => {
                Some("Use an RFC 3339 date, YYYY-MM-DD, or epoch milliseconds".to_string())
            }
            _ => Some(format!("Expected value of type: {:?}", kind)),
        },
        jsonschema::error::ValidationErrorKind::MaxLength { .. } if field == "Status" => {
            Some("Status is a short code such as J, B or N".to_string())
        }
        jsonschema::error::ValidationErrorKind::AnyOf { .. } => {
            Some("Cross references need `märkeskod` and `artikelnummer`".to_string())
        }
        _ => None,
    }
}

/// Span of a 1-based line/column position, to the end of that line
fn line_column_span(content: &str, line: usize, column: usize) -> SourceSpan {
    let line = line.saturating_sub(1);
    let column = column.saturating_sub(1);

    let mut offset = 0;
    for (i, line_content) in content.lines().enumerate() {
        if i == line {
            offset += column.min(line_content.len());
            break;
        }
        offset += line_content.len() + 1;
    }

    let offset = offset.min(content.len());
    let rest_of_content = &content[offset..];
    let len = rest_of_content
        .find('\n')
        .unwrap_or(rest_of_content.len())
        .max(1);

    (offset, len).into()
}

fn first_line_span(content: &str) -> SourceSpan {
    let len = content.find('\n').unwrap_or(content.len()).max(1);
    (0, len).into()
}

/// Find the span for an instance path in the original JSON text
///
/// Paths look like `/Partille/3/Status`. The location key is located first,
/// then the item key after it, matching raw spellings that canonicalize to
/// the same key.
fn find_path_span(content: &str, json_path: &str) -> SourceSpan {
    let parts: Vec<String> = json_path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(unescape_pointer)
        .collect();

    let Some(location) = parts.first() else {
        return first_line_span(content);
    };

    let keys = object_keys(content);
    let location_key = keys.iter().find(|k| k.name == *location);
    let after = location_key.map(|k| k.start).unwrap_or(0);

    let field = parts
        .iter()
        .skip(1)
        .rev()
        .find(|p| p.parse::<usize>().is_err());

    if let Some(field) = field {
        if let Some(key) = keys
            .iter()
            .filter(|k| k.start >= after)
            .find(|k| canonical_key(&k.name) == Some(field.as_str()) || k.name == *field)
        {
            return (key.start, key.len).into();
        }
    }

    match location_key {
        Some(key) => (key.start, key.len).into(),
        None => first_line_span(content),
    }
}

/// `~1` and `~0` escapes of a JSON pointer segment
fn unescape_pointer(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// An object key as it appears in the text
struct KeySpan {
    name: String,
    start: usize,
    len: usize,
}

/// Every string literal followed by `:`, in document order
fn object_keys(content: &str) -> Vec<KeySpan> {
    let bytes = content.as_bytes();
    let mut keys = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'"' {
            i += 1;
            continue;
        }
        let start = i;
        i += 1;
        while i < bytes.len() && bytes[i] != b'"' {
            if bytes[i] == b'\\' {
                i += 1;
            }
            i += 1;
        }
        let end = (i + 1).min(bytes.len());
        i = end;

        let mut j = end;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if j < bytes.len() && bytes[j] == b':' {
            let literal = &content[start..end];
            let name = serde_json::from_str::<String>(literal)
                .unwrap_or_else(|_| literal.trim_matches('"').to_string());
            keys.push(KeySpan {
                name,
                start,
                len: end - start,
            });
        }
    }
    keys
}
