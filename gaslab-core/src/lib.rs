//! GasLab Core: data model, program catalog, raw data and the gap-fill engine.
//!
//! This crate contains everything that works on one site at a time:
//! - Domain types (measurement points, site series, validity windows)
//! - Gas, program and site catalogs with alias resolution
//! - Raw-table parsing and normalization into site series
//! - Fetchers for the public data tree, a local mirror and synthetic data
//! - Gap-fill engine (linear, seasonal Holt–Winters, robust seasonal)

pub mod catalog;
pub mod data;
pub mod domain;
pub mod gapfill;
