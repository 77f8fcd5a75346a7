//! HTTP fetcher for the public data tree.
//!
//! Retries connection failures and 5xx responses with exponential backoff.
//! A 404 is the tree's way of saying a site has no file for a gas, so it
//! maps to [`FetchError::NotAvailable`] without retrying.

use super::provider::{decode_site_table, FetchError, SiteFetcher, SiteRequest};
use crate::catalog::{FileLayout, ProgramConfig};
use crate::domain::SiteSeries;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    max_retries: u32,
    base_delay: Duration,
    /// Network-wide files keyed by URL, shared by every per-site task.
    network_files: Mutex<HashMap<String, Arc<String>>>,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(60))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gaslab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            network_files: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    /// GET `url` as text with retry.
    fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(url, attempt, ?delay, "retrying");
                std::thread::sleep(delay);
            }

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(FetchError::NotAvailable {
                            what: url.to_string(),
                        });
                    }

                    if status.is_server_error() {
                        last_error = Some(FetchError::Http {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                        continue;
                    }

                    if !status.is_success() {
                        return Err(FetchError::Http {
                            status: status.as_u16(),
                            url: url.to_string(),
                        });
                    }

                    return resp.text().map_err(|e| FetchError::Network {
                        url: url.to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    if e.is_connect() || e.is_timeout() {
                        last_error = Some(FetchError::Network {
                            url: url.to_string(),
                            reason: e.to_string(),
                        });
                        continue;
                    }
                    return Err(FetchError::Network {
                        url: url.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let err = last_error.unwrap_or_else(|| FetchError::Network {
            url: url.to_string(),
            reason: "max retries exceeded".into(),
        });
        warn!(url, error = %err, "giving up after {} retries", self.max_retries);
        Err(err)
    }

    /// Fetch a network-wide file once and share it between site tasks.
    fn get_shared(&self, url: &str) -> Result<Arc<String>, FetchError> {
        if let Some(text) = self.memo().get(url) {
            return Ok(Arc::clone(text));
        }
        let text = Arc::new(self.get_text(url)?);
        self.memo()
            .entry(url.to_string())
            .or_insert_with(|| Arc::clone(&text));
        Ok(text)
    }

    fn memo(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<String>>> {
        self.network_files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SiteFetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    fn fetch(
        &self,
        program: &ProgramConfig,
        request: &SiteRequest,
    ) -> Result<SiteSeries, FetchError> {
        let url = program.url(&request.gas, &request.site, request.freq)?;
        debug!(%request, url = %url, "fetching");
        match program.file_layout {
            FileLayout::Network | FileLayout::Regional => {
                let text = self.get_shared(&url)?;
                decode_site_table(program, request, &text)
            }
            FileLayout::PerSite => {
                let text = self.get_text(&url)?;
                decode_site_table(program, request, &text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{GasId, ProgramId};
    use crate::domain::Frequency;

    #[test]
    fn client_builds() {
        let fetcher = HttpFetcher::new().unwrap();
        assert_eq!(fetcher.name(), "http");
        assert_eq!(fetcher.max_retries, 3);
    }

    #[test]
    fn catalog_errors_surface_before_any_request() {
        let fetcher = HttpFetcher::new().unwrap().with_retries(0, Duration::ZERO);
        let program = ProgramConfig::for_program(ProgramId::OldGc, "http://127.0.0.1:9");
        let req = SiteRequest::new(
            GasId::parse("SF6").unwrap(),
            "brw",
            ProgramId::OldGc,
            Frequency::Monthly,
        );
        let err = fetcher.fetch(&program, &req).unwrap_err();
        assert!(matches!(err, FetchError::Catalog(_)));
    }
}
