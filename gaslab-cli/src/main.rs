//! GasLab CLI: load, compare and catalog commands.
//!
//! Commands:
//! - `load`: fetch one gas from one program, optionally gap-fill, write CSV
//! - `compare`: load one gas from several programs and write ratio tables
//! - `gases`: list canonical gas identifiers
//! - `programs`: list measurement programs with their sites and cadences

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use gaslab_core::catalog::{
    GasId, ProgramCatalog, ProgramConfig, ProgramId, StaticSiteRegistry, KNOWN_GASES,
};
use gaslab_core::data::{HttpFetcher, MirrorFetcher, SiteFetcher, SyntheticFetcher};
use gaslab_core::domain::Frequency;
use gaslab_core::gapfill::FillStrategy;
use gaslab_runner::{
    collection_csv, load_program, load_programs, reconcile, save_reconciliation, write_collection,
    LoadRequest, ProgramCollection,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "gaslab",
    about = "GasLab CLI: trace-gas network data loading, gap-filling and reconciliation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where data comes from.
#[derive(Args, Clone)]
struct SourceArgs {
    /// Read files from a local mirror of the data tree instead of HTTP.
    #[arg(long, conflicts_with = "synthetic")]
    mirror: Option<PathBuf>,

    /// Generate deterministic synthetic data (development only).
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Seed for --synthetic.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Base URL of the public data tree.
    #[arg(long)]
    base_url: Option<String>,

    /// HTTP timeout in seconds.
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Site metadata TOML replacing the built-in registry.
    #[arg(long)]
    site_metadata: Option<PathBuf>,
}

/// Options shared by `load` and `compare`; each overrides the config file.
#[derive(Args, Clone)]
struct LoadArgs {
    /// Gas name or alias (e.g. CFC-11, F11, n2o).
    #[arg(long)]
    gas: Option<String>,

    /// monthly, daily or hourly.
    #[arg(long)]
    freq: Option<Frequency>,

    /// Gap-fill monthly data.
    #[arg(long, default_value_t = false)]
    gapfill: bool,

    /// linear, seasonal or robust_seasonal.
    #[arg(long)]
    strategy: Option<FillStrategy>,

    /// Months of forecast appended after the last observation.
    #[arg(long)]
    forecast: Option<usize>,

    #[arg(long)]
    seasonal_periods: Option<usize>,

    /// Join site latitude, longitude and elevation.
    #[arg(long, default_value_t = false)]
    addlocation: bool,

    /// Restrict to these sites.
    #[arg(long, value_delimiter = ',')]
    sites: Vec<String>,

    /// Concurrent fetches (1-6).
    #[arg(long)]
    fetch_workers: Option<usize>,

    /// TOML file with load options.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load one gas from one measurement program.
    Load {
        #[command(flatten)]
        load: LoadArgs,

        /// Measurement program (cats, rits, msd, otto, fecd, oldgc, combined or an alias).
        #[arg(long)]
        program: Option<String>,

        /// CSV output file. Defaults to stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        source: SourceArgs,
    },
    /// Compare one gas across measurement programs.
    Compare {
        #[command(flatten)]
        load: LoadArgs,

        /// Programs to load.
        #[arg(long, value_delimiter = ',', required = true)]
        programs: Vec<String>,

        /// Ratio pairs as A/B; defaults to the first two programs.
        #[arg(long)]
        ratio: Vec<String>,

        /// Directory for the comparison files.
        #[arg(long, default_value = "comparison")]
        output_dir: PathBuf,

        #[command(flatten)]
        source: SourceArgs,
    },
    /// List canonical gas identifiers.
    Gases {
        /// Only gases measured by this program.
        #[arg(long)]
        program: Option<String>,
    },
    /// List measurement programs.
    Programs,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Load {
            load,
            program,
            output,
            source,
        } => run_load(load, program, output, source),
        Commands::Compare {
            load,
            programs,
            ratio,
            output_dir,
            source,
        } => run_compare(load, programs, ratio, output_dir, source),
        Commands::Gases { program } => run_gases(program),
        Commands::Programs => run_programs(),
    }
}

// ─── Setup ──────────────────────────────────────────────────────────

fn build_request(args: &LoadArgs, program: Option<String>) -> Result<LoadRequest> {
    let mut request = match &args.config {
        Some(path) => LoadRequest::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => {
            let Some(gas) = &args.gas else {
                bail!("--gas is required unless --config is given");
            };
            LoadRequest::new(gas.as_str(), "cats")
        }
    };

    if let Some(gas) = &args.gas {
        request.gas = gas.clone();
    }
    if let Some(program) = program {
        request.program = program;
    }
    if let Some(freq) = args.freq {
        request.freq = freq;
    }
    if args.gapfill {
        request.gapfill = true;
    }
    if let Some(strategy) = args.strategy {
        request.strategy = strategy;
    }
    if let Some(n) = args.forecast {
        request.forecast_periods = n;
    }
    if let Some(n) = args.seasonal_periods {
        request.seasonal_periods = n;
    }
    if args.addlocation {
        request.addlocation = true;
    }
    if !args.sites.is_empty() {
        request.sites = Some(args.sites.clone());
    }
    if let Some(n) = args.fetch_workers {
        request.fetch_workers = n;
    }
    request.validate()?;
    Ok(request)
}

fn build_fetcher(source: &SourceArgs) -> Result<Box<dyn SiteFetcher>> {
    if source.synthetic {
        return Ok(Box::new(SyntheticFetcher::new(source.seed)));
    }
    if let Some(root) = &source.mirror {
        if !root.is_dir() {
            bail!("mirror directory does not exist: {}", root.display());
        }
        return Ok(Box::new(MirrorFetcher::new(root.clone())));
    }
    let fetcher = HttpFetcher::with_timeout(Duration::from_secs(source.timeout))
        .context("failed to build HTTP client")?;
    Ok(Box::new(fetcher))
}

fn build_catalog(source: &SourceArgs) -> ProgramCatalog {
    match &source.base_url {
        Some(url) => ProgramCatalog::new(url),
        None => ProgramCatalog::default(),
    }
}

fn build_registry(source: &SourceArgs) -> Result<StaticSiteRegistry> {
    match &source.site_metadata {
        Some(path) => StaticSiteRegistry::from_file(path)
            .with_context(|| format!("failed to load site metadata {}", path.display())),
        None => Ok(StaticSiteRegistry::network_default()),
    }
}

// ─── Commands ───────────────────────────────────────────────────────

fn run_load(
    args: LoadArgs,
    program: Option<String>,
    output: Option<PathBuf>,
    source: SourceArgs,
) -> Result<()> {
    let request = build_request(&args, program)?;
    let fetcher = build_fetcher(&source)?;
    let catalog = build_catalog(&source);
    let registry = build_registry(&source)?;

    let collection = load_program(&request, fetcher.as_ref(), &catalog, &registry)?;
    print_summary(&collection);

    match output {
        Some(path) => {
            write_collection(&path, &collection)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "written");
        }
        None => print!("{}", collection_csv(&collection)?),
    }
    Ok(())
}

fn parse_pair(pair: &str) -> Result<(ProgramId, ProgramId)> {
    let Some((a, b)) = pair.split_once('/') else {
        bail!("ratio '{pair}' must be written as A/B");
    };
    Ok((a.trim().parse()?, b.trim().parse()?))
}

fn run_compare(
    args: LoadArgs,
    programs: Vec<String>,
    ratios: Vec<String>,
    output_dir: PathBuf,
    source: SourceArgs,
) -> Result<()> {
    if programs.len() < 2 {
        bail!("compare needs at least two programs");
    }
    let pairs: Vec<(ProgramId, ProgramId)> = if ratios.is_empty() {
        vec![(programs[0].parse()?, programs[1].parse()?)]
    } else {
        ratios.iter().map(|r| parse_pair(r)).collect::<Result<_>>()?
    };

    let request = build_request(&args, None)?;
    let fetcher = build_fetcher(&source)?;
    let catalog = build_catalog(&source);
    let registry = build_registry(&source)?;

    let collections = load_programs(&request, &programs, fetcher.as_ref(), &catalog, &registry)?;
    for collection in &collections {
        print_summary(collection);
    }

    for (a, b) in pairs {
        let rec = reconcile(&collections, a, b)?;
        let written = save_reconciliation(&rec, &output_dir)
            .with_context(|| format!("failed to write comparison to {}", output_dir.display()))?;
        let mean = if rec.trend.is_empty() {
            f64::NAN
        } else {
            rec.trend.iter().map(|t| t.mean_ratio).sum::<f64>() / rec.trend.len() as f64
        };
        eprintln!(
            "{a}/{b}: {} ratio rows over {} dates, mean ratio {mean:.4}",
            rec.ratios.len(),
            rec.trend.len()
        );
        for path in written {
            eprintln!("  {}", path.display());
        }
    }
    Ok(())
}

fn run_gases(program: Option<String>) -> Result<()> {
    match program {
        Some(name) => {
            let catalog = ProgramCatalog::default();
            let config = catalog.resolve(&name)?;
            for gas in config.gases.keys() {
                println!("{:<10} {}", gas.as_str(), gas.units());
            }
        }
        None => {
            let catalog = ProgramCatalog::default();
            for name in KNOWN_GASES {
                let gas = GasId::parse(name)?;
                let programs: Vec<String> = catalog
                    .programs_for(&gas)
                    .iter()
                    .map(|p| p.tag().to_string())
                    .collect();
                println!("{:<10} {:<4} {}", gas.as_str(), gas.units(), programs.join(","));
            }
        }
    }
    Ok(())
}

fn describe(program: &ProgramConfig) -> String {
    let freqs: Vec<&str> = program.suffixes.keys().map(|f| f.as_str()).collect();
    format!(
        "{:<6} {:<6} sites={:<3} gases={:<3} freq={}{}",
        program.id.tag(),
        program.id.dir_name(),
        program.sites.len(),
        program.gases.len(),
        freqs.join(","),
        if program.gapfill_eligible { "" } else { " (no gap-fill)" },
    )
}

fn run_programs() -> Result<()> {
    for program in ProgramCatalog::default().programs() {
        println!("{}", describe(program));
    }
    Ok(())
}

fn print_summary(collection: &ProgramCollection) {
    let meta = collection.meta();
    eprintln!(
        "{} {} ({}): {} sites, {} rows",
        meta.program,
        meta.gas,
        meta.freq,
        collection.sites().len(),
        collection.row_count()
    );
    for (site, outcome) in collection.outcomes() {
        eprintln!("  {site:<5} {}", outcome.label());
    }
}
