//! Catalog of gases, measurement programs and sites.
//!
//! Everything a caller names by string (gas alias, program, site, frequency)
//! is resolved here before any fetch is attempted.

pub mod gas;
pub mod program;
pub mod site;

pub use gas::{GasId, KNOWN_GASES};
pub use program::{FileLayout, GasPath, ProgramCatalog, ProgramConfig, ProgramId, SiteCase};
pub use site::{
    normalize_site_code, RegistryError, SiteLocation, SiteRegistry, StaticSiteRegistry,
};

use thiserror::Error;

/// Validation errors raised before any data is requested.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatalogError {
    #[error("unknown gas '{alias}'")]
    UnknownGas { alias: String },

    #[error("unknown measurement program '{name}' (valid: {valid})")]
    UnknownProgram { name: String, valid: String },

    #[error("{program} does not measure {gas} (measured: {measured})")]
    GasNotMeasured {
        program: String,
        gas: String,
        measured: String,
    },

    #[error("{program} has no site '{site}'")]
    UnknownSite { program: String, site: String },

    #[error("{program} does not publish {freq} data")]
    FrequencyNotPublished { program: String, freq: String },
}
