//! Parallel fetch and harmonization of one gas from one program.
//!
//! A load runs in up to two bounded rounds:
//! 1. fetch: one task per site through the [`SiteFetcher`]; failures are
//!    logged and the site is dropped
//! 2. gap-fill: one engine invocation per fetched site, only for monthly data
//!    from a program eligible for gap-filling
//!
//! Every name in the request is validated against the catalog before the
//! first fetch is dispatched.

use crate::collection::{CollectionMeta, ProgramCollection, SiteData, SiteEntry};
use crate::config::{ConfigError, LoadRequest};
use crate::pool::{PoolError, TaskOutcome, TaskPool};
use gaslab_core::catalog::{
    normalize_site_code, CatalogError, GasId, ProgramCatalog, ProgramConfig, SiteRegistry,
};
use gaslab_core::data::{FetchError, SiteFetcher, SiteRequest};
use gaslab_core::domain::SiteSeries;
use gaslab_core::gapfill::{fill, GapFillResult};
use std::convert::Infallible;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that abort a whole load. Per-site failures never surface here.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Resolve the site list for `program`, honouring an explicit subset.
fn resolve_sites(program: &ProgramConfig, subset: Option<&[String]>) -> Result<Vec<String>, CatalogError> {
    let Some(subset) = subset else {
        return Ok(program.sites.clone());
    };
    let mut sites = Vec::with_capacity(subset.len());
    for site in subset {
        if !program.has_site(site) {
            return Err(CatalogError::UnknownSite {
                program: program.id.to_string(),
                site: site.clone(),
            });
        }
        sites.push(normalize_site_code(site));
    }
    sites.sort();
    sites.dedup();
    Ok(sites)
}

/// Fetch round: successful non-empty series, in site order.
fn fetch_round(
    request: &LoadRequest,
    program: &ProgramConfig,
    requests: Vec<SiteRequest>,
    fetcher: &dyn SiteFetcher,
) -> Result<Vec<SiteSeries>, PoolError> {
    let pool = TaskPool::new("fetch", request.effective_fetch_workers())?;
    debug!(fetcher = fetcher.name(), sites = requests.len(), "dispatching fetch round");
    let results = pool.run(requests, |req| fetcher.fetch(program, req));

    let mut fetched = Vec::with_capacity(results.len());
    for (req, outcome) in results {
        match outcome {
            TaskOutcome::Done(series) if series.has_data() => fetched.push(series),
            TaskOutcome::Done(_) => info!(site = %req.site, "no data, site dropped"),
            TaskOutcome::Failed(err) => log_fetch_failure(&req, &err),
            TaskOutcome::Panicked(msg) => warn!(site = %req.site, panic = %msg, "fetch task panicked, site dropped"),
        }
    }
    Ok(fetched)
}

fn log_fetch_failure(req: &SiteRequest, err: &FetchError) {
    if err.is_not_available() {
        info!(request = %req, error = %err, "not available, site dropped");
    } else {
        warn!(request = %req, error = %err, "fetch failed, site dropped");
    }
}

/// Gap-fill round: one result per site whose fill did not panic.
fn fill_round(request: &LoadRequest, series: Vec<SiteSeries>) -> Result<Vec<GapFillResult>, PoolError> {
    let config = request.gapfill_config();
    let pool = TaskPool::new("gapfill", request.effective_fill_workers())?;
    let results = pool.run(series, |s| Ok::<_, Infallible>(fill(s, &config)));

    let mut filled = Vec::with_capacity(results.len());
    for (series, outcome) in results {
        match outcome {
            TaskOutcome::Done(result) => {
                debug!(site = series.site(), outcome = result.outcome().label(), "site filled");
                filled.push(result);
            }
            TaskOutcome::Failed(never) => match never {},
            TaskOutcome::Panicked(msg) => {
                warn!(site = series.site(), panic = %msg, "gap-fill task panicked, site dropped")
            }
        }
    }
    Ok(filled)
}

/// Load one gas from one measurement program into a [`ProgramCollection`].
///
/// Returns an empty collection, not an error, when every site failed or had
/// no data.
pub fn load_program(
    request: &LoadRequest,
    fetcher: &dyn SiteFetcher,
    catalog: &ProgramCatalog,
    registry: &dyn SiteRegistry,
) -> Result<ProgramCollection, LoadError> {
    request.validate()?;
    let gas = GasId::parse(&request.gas)?;
    let program = catalog.resolve(&request.program)?;
    program.validate(&gas, request.freq)?;
    let sites = resolve_sites(program, request.sites.as_deref())?;

    info!(
        gas = %gas,
        program = %program.id,
        freq = %request.freq,
        sites = sites.len(),
        "loading"
    );

    let requests: Vec<SiteRequest> = sites
        .iter()
        .map(|site| SiteRequest::new(gas.clone(), site.as_str(), program.id, request.freq))
        .collect();
    let fetched = fetch_round(request, program, requests, fetcher)?;

    let fill_eligible = request.freq.supports_gapfill() && program.gapfill_eligible;
    if request.gapfill && !fill_eligible {
        info!(
            program = %program.id,
            freq = %request.freq,
            "gap-fill requested but not applicable, returning raw data"
        );
    }
    let gapfilled = request.gapfill && fill_eligible;

    let mut collection = ProgramCollection::new(CollectionMeta {
        gas: gas.clone(),
        program: program.id,
        freq: request.freq,
        gapfill: gapfilled.then_some(request.strategy),
    });

    if gapfilled {
        for result in fill_round(request, fetched)? {
            let site = result.site().to_string();
            collection.insert(site, SiteEntry { data: SiteData::Filled(result), location: None });
        }
    } else {
        for series in fetched {
            let site = series.site().to_string();
            collection.insert(site, SiteEntry { data: SiteData::Raw(series), location: None });
        }
    }

    if request.addlocation {
        enrich_locations(&mut collection, registry);
    }

    if collection.is_empty() {
        warn!(gas = %gas, program = %program.id, "no site returned data");
    } else {
        info!(
            gas = %gas,
            program = %program.id,
            sites = collection.sites().len(),
            rows = collection.row_count(),
            "load complete"
        );
    }
    Ok(collection)
}

/// Left-join site metadata; unknown sites keep null locations.
fn enrich_locations(collection: &mut ProgramCollection, registry: &dyn SiteRegistry) {
    for (site, entry) in collection.entries_mut() {
        entry.location = registry.location(&normalize_site_code(site));
        if entry.location.is_none() {
            debug!(site = %site, "no location metadata");
        }
    }
    collection.set_location_enriched(true);
}

/// Load the same gas from several programs with otherwise identical options.
///
/// Every program is validated before any fetch starts.
pub fn load_programs(
    request: &LoadRequest,
    programs: &[String],
    fetcher: &dyn SiteFetcher,
    catalog: &ProgramCatalog,
    registry: &dyn SiteRegistry,
) -> Result<Vec<ProgramCollection>, LoadError> {
    let gas = GasId::parse(&request.gas)?;
    for name in programs {
        catalog.resolve(name)?.validate(&gas, request.freq)?;
    }
    programs
        .iter()
        .map(|name| {
            let mut req = request.clone();
            req.program = name.clone();
            load_program(&req, fetcher, catalog, registry)
        })
        .collect()
}
