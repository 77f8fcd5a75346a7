//! Fetcher collaborator trait and structured error types.
//!
//! A [`SiteFetcher`] turns one (gas, site, program, frequency) request into a
//! normalized [`SiteSeries`] or an explicit error. Implementations cover the
//! public HTTP tree, a local mirror of it, and synthetic data for tests.

use super::parse::{parse_table, ParseError};
use super::schema::{normalize, select_region, SchemaError};
use crate::catalog::{CatalogError, FileLayout, GasId, ProgramConfig, ProgramId};
use crate::domain::{Frequency, SiteSeries};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One site's worth of data to retrieve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRequest {
    pub gas: GasId,
    pub site: String,
    pub program: ProgramId,
    pub freq: Frequency,
}

impl SiteRequest {
    pub fn new(gas: GasId, site: impl Into<String>, program: ProgramId, freq: Frequency) -> Self {
        Self {
            gas,
            site: site.into().to_lowercase(),
            program,
            freq,
        }
    }
}

impl fmt::Display for SiteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} at {} ({})", self.program, self.gas, self.site, self.freq)
    }
}

/// Errors from fetching or decoding one site's table.
///
/// All of these are task-local: the orchestrator logs them and drops the site.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("not available: {what}")]
    NotAvailable { what: String },

    #[error("network error for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("I/O error reading {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("no {gas} data for site '{site}'")]
    NoData { gas: String, site: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl FetchError {
    /// True for the explicit "this site has no such file" signal.
    pub fn is_not_available(&self) -> bool {
        matches!(self, FetchError::NotAvailable { .. } | FetchError::NoData { .. })
    }
}

/// Source of per-site tables.
///
/// Implementations must be shareable across pool workers.
pub trait SiteFetcher: Send + Sync {
    /// Human-readable name of this fetcher.
    fn name(&self) -> &str;

    /// Fetch and normalize one site's series.
    fn fetch(&self, program: &ProgramConfig, request: &SiteRequest)
        -> Result<SiteSeries, FetchError>;
}

/// Parse raw text published by `program` and normalize it for `request`.
pub fn decode_site_table(
    program: &ProgramConfig,
    request: &SiteRequest,
    text: &str,
) -> Result<SiteSeries, FetchError> {
    let layout = program.layout(request.freq)?;
    let mut table = parse_table(text, layout)?;
    if program.file_layout == FileLayout::Regional {
        table = select_region(table, request.gas.as_str(), &request.site)?;
    }
    let series = normalize(table, &request.site, request.freq)?;
    if !series.has_data() {
        return Err(FetchError::NoData {
            gas: request.gas.to_string(),
            site: request.site.clone(),
        });
    }
    Ok(series)
}
