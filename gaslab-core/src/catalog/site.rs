//! Site codes and static site metadata.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Errors loading a site registry from disk.
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("cannot read site registry {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("invalid site registry TOML: {0}")]
    Parse(String),
}

/// Latitude, longitude (degrees) and elevation (metres above sea level).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SiteLocation {
    pub lat: f64,
    pub lon: f64,
    pub elev: f64,
}

/// Lowercase a site code and strip any variant suffix.
///
/// `"SMO"`, `"smo_pfp"` and `"Smo-2"` all normalize to `"smo"`.
pub fn normalize_site_code(code: &str) -> String {
    code.trim()
        .split(|c: char| matches!(c, '_' | '-' | '.' | ' '))
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Site-metadata collaborator.
pub trait SiteRegistry: Send + Sync {
    /// Location for a normalized site code, or `None` when unknown.
    fn location(&self, site: &str) -> Option<SiteLocation>;
}

/// In-memory registry keyed by normalized site code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticSiteRegistry {
    pub sites: BTreeMap<String, SiteLocation>,
}

impl StaticSiteRegistry {
    /// Registry covering the sampling sites of the halocarbon network.
    pub fn network_default() -> Self {
        let entries: &[(&str, f64, f64, f64)] = &[
            ("alt", 82.45, -62.51, 185.0),
            ("brw", 71.32, -156.61, 11.0),
            ("sum", 72.58, -38.48, 3210.0),
            ("mhd", 53.33, -9.90, 5.0),
            ("lef", 45.95, -90.27, 472.0),
            ("hfm", 42.54, -72.17, 340.0),
            ("thd", 41.05, -124.15, 107.0),
            ("nwr", 40.05, -105.59, 3523.0),
            ("itn", 35.37, -77.39, 9.0),
            ("kum", 19.52, -154.82, 3.0),
            ("mlo", 19.54, -155.58, 3397.0),
            ("rpb", 13.17, -59.43, 15.0),
            ("smo", -14.25, -170.56, 42.0),
            ("cgo", -40.68, 144.69, 94.0),
            ("ush", -54.85, -68.31, 12.0),
            ("psa", -64.77, -64.05, 10.0),
            ("spo", -89.98, -24.80, 2810.0),
        ];

        let sites = entries
            .iter()
            .map(|&(code, lat, lon, elev)| (code.to_string(), SiteLocation { lat, lon, elev }))
            .collect();
        Self { sites }
    }

    /// Load a registry from a TOML file with one table per site.
    pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|e| RegistryError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse a registry from TOML, normalizing the site keys.
    pub fn from_toml(content: &str) -> Result<Self, RegistryError> {
        let parsed: StaticSiteRegistry =
            toml::from_str(content).map_err(|e| RegistryError::Parse(e.to_string()))?;
        let sites = parsed
            .sites
            .into_iter()
            .map(|(code, loc)| (normalize_site_code(&code), loc))
            .collect();
        Ok(Self { sites })
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

impl SiteRegistry for StaticSiteRegistry {
    fn location(&self, site: &str) -> Option<SiteLocation> {
        self.sites.get(&normalize_site_code(site)).copied()
    }
}
