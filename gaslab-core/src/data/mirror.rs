//! Fetcher over a local copy of the data tree.
//!
//! The mirror uses the same relative paths as the public tree, so a synced
//! or mounted copy can stand in for HTTP.

use super::provider::{decode_site_table, FetchError, SiteFetcher, SiteRequest};
use crate::catalog::ProgramConfig;
use crate::domain::SiteSeries;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct MirrorFetcher {
    root: PathBuf,
}

impl MirrorFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of the file serving `request`.
    pub fn path_for(
        &self,
        program: &ProgramConfig,
        request: &SiteRequest,
    ) -> Result<PathBuf, FetchError> {
        let rel = program.relative_path(&request.gas, &request.site, request.freq)?;
        Ok(self.root.join(rel))
    }
}

impl SiteFetcher for MirrorFetcher {
    fn name(&self) -> &str {
        "mirror"
    }

    fn fetch(
        &self,
        program: &ProgramConfig,
        request: &SiteRequest,
    ) -> Result<SiteSeries, FetchError> {
        let path = self.path_for(program, request)?;
        debug!(%request, path = %path.display(), "reading");
        let text = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => FetchError::NotAvailable {
                what: path.display().to_string(),
            },
            _ => FetchError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            },
        })?;
        decode_site_table(program, request, &text)
    }
}
