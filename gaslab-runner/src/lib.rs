//! GasLab Runner: parallel loading, program collections and reconciliation.
//!
//! This crate builds on `gaslab-core` to provide:
//! - A bounded task pool with per-task failure isolation
//! - Load configuration (TOML or builder)
//! - The fetch-and-harmonize orchestrator producing program collections
//! - Multi-program reconciliation (harmonized table, site ratios, ratio trend)
//! - CSV/JSON export

pub mod collection;
pub mod config;
pub mod export;
pub mod orchestrator;
pub mod pool;
pub mod reconcile;

pub use collection::{CollectionMeta, OutputRow, ProgramCollection, SiteData, SiteEntry};
pub use config::{ConfigError, LoadRequest, MAX_FETCH_WORKERS};
pub use export::{collection_csv, save_reconciliation, write_collection, ExportError};
pub use orchestrator::{load_program, load_programs, LoadError};
pub use pool::{PoolError, TaskOutcome, TaskPool};
pub use reconcile::{
    flatten, global_ratio_trend, reconcile, site_ratios, HarmonizedRow, HarmonizedTable,
    RatioRow, RatioTrendRow, ReconcileError, Reconciliation, TableMeta,
};
