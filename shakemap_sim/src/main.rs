//! Scenario shake-map simulator CLI
//!
//! Realizes ground-motion fields for every rupture of a catalog over a site
//! grid and writes EQRM scenario files.

use clap::Parser;
use shakemap_env::Site;
use shakemap_sim::{
    DeterministicSeeds, OrchestratorConfig, ParallelScenarioOrchestrator, RuptureCatalog,
    SimError, SimpleAttenuation, SyntheticCatalog,
};
use std::path::PathBuf;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Scenario shake-map simulator
#[derive(Parser, Debug)]
#[command(name = "shakemap-sim")]
#[command(about = "Simulate spatially-correlated ground-motion fields over a rupture catalog", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long)]
    seed: Option<u64>,
    
    /// Number of worker threads
    #[arg(short, long)]
    workers: Option<usize>,
    
    /// Spectral periods in seconds, comma separated (0 = PGA)
    #[arg(short, long, value_delimiter = ',')]
    periods: Option<Vec<f64>>,
    
    /// Add a spatially-correlated intra-event field
    #[arg(short, long)]
    correlated: bool,
    
    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,
    
    /// Rupture catalog JSON (a synthetic catalog is generated if absent)
    #[arg(long)]
    catalog: Option<PathBuf>,
    
    /// Number of synthetic ruptures
    #[arg(long, default_value = "20")]
    ruptures: usize,
    
    #[arg(long, default_value = "-0.5", allow_hyphen_values = true)]
    lon_min: f64,
    
    #[arg(long, default_value = "0.5", allow_hyphen_values = true)]
    lon_max: f64,
    
    #[arg(long, default_value = "-0.5", allow_hyphen_values = true)]
    lat_min: f64,
    
    #[arg(long, default_value = "0.5", allow_hyphen_values = true)]
    lat_max: f64,
    
    /// Grid spacing in degrees
    #[arg(long, default_value = "0.1")]
    spacing: f64,
    
    /// Run configuration JSON; command line options override it
    #[arg(long)]
    config: Option<PathBuf>,
    
    /// Write each site row once instead of 8 times
    #[arg(long)]
    no_duplicate: bool,
    
    /// Also write a `lon lat value` dump of this rupture's PGA layer
    #[arg(long)]
    dump_rupture: Option<usize>,
    
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
    
    /// JSON summary on stdout
    #[arg(long)]
    json: bool,
}

fn build_config(args: &Args) -> Result<OrchestratorConfig, SimError> {
    let mut config = match &args.config {
        Some(path) => OrchestratorConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => OrchestratorConfig::default(),
    };
    
    if let Some(seed) = args.seed {
        config.seed = if seed == 0 {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(1)
        } else {
            seed
        };
    }
    if let Some(workers) = args.workers {
        config.num_workers = workers;
    }
    if let Some(periods) = &args.periods {
        config.periods = periods.clone();
    }
    if args.correlated {
        config.scenario.spatial_correlation = true;
    }
    if let Some(output) = &args.output {
        config.output_dir = output.clone();
    }
    if args.no_duplicate {
        config.duplicate_eqrm_rows = false;
    }
    config.validate()?;
    Ok(config)
}

fn run(args: &Args) -> Result<bool, SimError> {
    let config = build_config(args)?;
    
    let sites = Site::grid(args.lon_min, args.lon_max, args.lat_min, args.lat_max, args.spacing)?;
    
    let catalog = match &args.catalog {
        Some(path) => RuptureCatalog::load(path)?,
        None => {
            let mut rng = DeterministicSeeds::new(config.seed).catalog_rng();
            SyntheticCatalog::default()
                .with_ruptures(args.ruptures)
                .with_region(args.lon_min, args.lon_max, args.lat_min, args.lat_max)
                .generate(&mut rng)?
        }
    };
    
    if !args.json {
        info!("Shake-map simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("  Sites: {} | Ruptures: {} | Periods: {:?}", sites.len(), catalog.len(), config.periods);
        info!("  Correlated: {} | Output: {}", config.scenario.spatial_correlation, config.output_dir.display());
    }
    
    let orchestrator = ParallelScenarioOrchestrator::new(config);
    let report = orchestrator.run(SimpleAttenuation::default(), &catalog, &sites)?;
    
    if let Some(index) = args.dump_rupture {
        let values = report.grid.get(index)?;
        let path = orchestrator.config().output_dir.join(format!("pga_{:06}.txt", index));
        shakemap_sim::writer::write_site_dump(&path, &sites, &values)?;
        info!("Wrote site dump {}", path.display());
    }
    
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.summary())?);
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if report.is_complete() {
            info!("✅ All {} ruptures realized", report.processed());
        } else {
            error!("❌ {} ruptures missing from the grid", report.missing.len());
            for failure in report.failures() {
                error!("  - rupture {} (id {}): {}", failure.index, failure.rupture_id, failure.message);
            }
            for worker in report.workers.iter().filter(|w| !w.completed()) {
                warn!(
                    "  - worker {} stopped early: {}",
                    worker.worker,
                    worker
                        .aborted
                        .as_deref()
                        .or(worker.panicked.as_deref())
                        .unwrap_or("unknown")
                );
            }
        }
    }
    
    Ok(report.is_complete())
}

fn main() {
    let args = Args::parse();
    
    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");
    
    match run(&args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    }
}
