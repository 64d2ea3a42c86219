//! Snapshot schema - embedded JSON Schema and validation

pub mod validator;

pub use validator::{schema_source, SchemaViolation, ValidationError, Validator, LAGER_SCHEMA};
