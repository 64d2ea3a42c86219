//! CLI command implementations

pub mod browse;
pub mod completions;
pub mod config;
pub mod facets;
pub mod init;
pub mod list;
pub mod schema;
pub mod seed;
pub mod show;
pub mod store;
pub mod validate;
