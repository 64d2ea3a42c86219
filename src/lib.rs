//! lagerkoll: automotive parts inventory lookup
//!
//! Reads a per-location stock snapshot (`lager.json`), optionally mirrors it
//! into a local SQLite store, and answers paged, filtered and sorted queries
//! over MK, Artikelnr, Benämning, location and status.

pub mod cli;
pub mod core;
pub mod schema;
