//! Parallel execution of a rupture catalog over a fixed worker pool.
//!
//! Correlation factors for the configured periods are computed once before
//! any worker starts and shared read-only. Workers are scoped OS threads.
//! Each owns a clone of the ground motion model and its own
//! [`ScenarioShakeMap`] over the shared factors, and claims rupture ranges from a shared [`WorkQueue`], and for every rupture:
//!
//! 1. realizes all configured periods from the rupture's seeded stream
//! 2. writes the PGA layer into the shared grid column at the rupture's index
//! 3. writes `scenario_<index>.txt` and appends a line to its event listing
//!
//! Random streams are keyed by rupture index, so the grid does not depend on
//! the number of workers or the order in which ranges are claimed.

use serde::{Deserialize, Serialize};
use shakemap_core::{
    ColumnSlots, CorrelationFactors, MultiScenarioShakeMap, ScenarioConfig, ScenarioShakeMap,
    EQRM_ROW_REPEATS,
};
use shakemap_env::Location;
use shakemap_env::{GroundMotionModel, Rupture, Site};
use std::any::Any;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::catalog::RuptureCatalog;
use crate::error::SimError;
use crate::seeds::DeterministicSeeds;
use crate::work::WorkQueue;
use crate::writer::{append_event_line, create_event_listing, write_scenario_file};

/// Run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Worker threads (at least 1)
    pub num_workers: usize,
    
    /// Spectral periods to realize per rupture (0.0 = PGA)
    pub periods: Vec<f64>,
    
    pub scenario: ScenarioConfig,
    
    /// Directory receiving scenario files and event listings
    pub output_dir: PathBuf,
    
    /// Master seed for all rupture streams
    pub seed: u64,
    
    /// Write each site row 8 times in scenario files (legacy EQRM layout)
    pub duplicate_eqrm_rows: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            num_workers: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            periods: vec![0.0],
            scenario: ScenarioConfig::default(),
            output_dir: PathBuf::from("shakemap_out"),
            seed: 42,
            duplicate_eqrm_rows: true,
        }
    }
}

impl OrchestratorConfig {
    /// Sets the number of workers.
    pub fn with_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }
    
    /// Sets the periods realized per rupture.
    pub fn with_periods(mut self, periods: Vec<f64>) -> Self {
        self.periods = periods;
        self
    }
    
    /// Sets the per-rupture scenario options.
    pub fn with_scenario(mut self, scenario: ScenarioConfig) -> Self {
        self.scenario = scenario;
        self
    }
    
    /// Sets the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
    
    /// Sets the master seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
    
    /// Enables or disables 8× row duplication in scenario files.
    pub fn with_duplicate_rows(mut self, duplicate: bool) -> Self {
        self.duplicate_eqrm_rows = duplicate;
        self
    }
    
    /// Parses a JSON config; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        Ok(serde_json::from_str(json)?)
    }
    
    /// Checks the configuration before any worker starts.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.num_workers == 0 {
            return Err(SimError::config("num_workers must be at least 1"));
        }
        if self.periods.is_empty() {
            return Err(SimError::config("at least one period is required"));
        }
        if let Some(p) = self.periods.iter().find(|p| !p.is_finite() || **p < 0.0) {
            return Err(SimError::config(format!("invalid period {}", p)));
        }
        Ok(())
    }
    
    /// Column of the grid layer: period 0 if present, else the first period.
    pub fn pga_column(&self) -> usize {
        self.periods.iter().position(|&p| p == 0.0).unwrap_or(0)
    }
    
    fn row_repeats(&self) -> usize {
        if self.duplicate_eqrm_rows {
            EQRM_ROW_REPEATS
        } else {
            1
        }
    }
}

/// File name of the scenario written for catalog position `index`.
pub fn scenario_file_name(index: usize) -> String {
    format!("scenario_{:06}.txt", index)
}

/// File name of worker `worker`'s event listing.
pub fn listing_file_name(worker: usize) -> String {
    format!("events_worker_{}.csv", worker)
}

/// A rupture whose fields could not be computed.
#[derive(Debug, Clone, Serialize)]
pub struct RuptureFailure {
    pub index: usize,
    pub rupture_id: u64,
    pub message: String,
}

/// What one worker did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkerOutcome {
    pub worker: usize,
    
    /// Ruptures fully processed and written
    pub processed: usize,
    
    /// Ruptures skipped after a computation error
    pub failures: Vec<RuptureFailure>,
    
    /// Set when an I/O failure ended the worker early
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
    
    /// Set when the worker panicked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panicked: Option<String>,
    
    /// Claimed indices left unprocessed after an I/O failure
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub abandoned: Vec<usize>,
    
    /// Correlation factorizations the worker ran itself
    pub factorizations: usize,
}

impl WorkerOutcome {
    fn new(worker: usize) -> Self {
        Self {
            worker,
            ..Default::default()
        }
    }
    
    /// True if the worker drained the queue without stopping early.
    pub fn completed(&self) -> bool {
        self.aborted.is_none() && self.panicked.is_none()
    }
}

/// Result of a run.
#[derive(Debug)]
pub struct RunReport {
    /// PGA per site (rows) per rupture (columns)
    pub grid: MultiScenarioShakeMap,
    
    pub workers: Vec<WorkerOutcome>,
    
    /// Rupture indices whose grid column was never filled
    pub missing: Vec<usize>,
    
    /// Correlation factorizations run before the workers started
    pub shared_factorizations: usize,
}

impl RunReport {
    /// Ruptures processed across all workers.
    pub fn processed(&self) -> usize {
        self.workers.iter().map(|w| w.processed).sum()
    }
    
    /// All per-rupture computation failures, in worker order.
    pub fn failures(&self) -> impl Iterator<Item = &RuptureFailure> {
        self.workers.iter().flat_map(|w| w.failures.iter())
    }
    
    /// Correlation factorizations over the whole run.
    pub fn factorizations(&self) -> usize {
        self.shared_factorizations + self.workers.iter().map(|w| w.factorizations).sum::<usize>()
    }
    
    /// True if every rupture produced a grid column.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
    
    /// Serializable summary (the grid itself is omitted).
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            num_sites: self.grid.num_sites(),
            num_ruptures: self.grid.num_columns(),
            processed: self.processed(),
            factorizations: self.factorizations(),
            missing: self.missing.clone(),
            workers: self.workers.clone(),
        }
    }
}

/// JSON-friendly view of a [`RunReport`].
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub num_sites: usize,
    pub num_ruptures: usize,
    pub processed: usize,
    pub factorizations: usize,
    pub missing: Vec<usize>,
    pub workers: Vec<WorkerOutcome>,
}

/// State shared read-only (or write-once) by all workers.
struct Shared<'a> {
    ruptures: &'a [Rupture],
    sites: &'a [Site],
    queue: WorkQueue,
    slots: ColumnSlots,
    seeds: DeterministicSeeds,
    factors: Arc<CorrelationFactors>,
}

/// Runs a catalog over a fixed pool of worker threads.
#[derive(Debug, Clone)]
pub struct ParallelScenarioOrchestrator {
    config: OrchestratorConfig,
}

impl ParallelScenarioOrchestrator {
    /// Creates an orchestrator.
    pub fn new(config: OrchestratorConfig) -> Self {
        Self { config }
    }
    
    /// Returns the configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }
    
    /// Realizes every rupture in `catalog` at `sites`.
    ///
    /// Fails up front on an invalid configuration, an empty site list or an
    /// unusable output directory. Once workers start, per-rupture problems
    /// are reported in the returned [`RunReport`] instead.
    pub fn run<M>(
        &self,
        model: M,
        catalog: &RuptureCatalog,
        sites: &[Site],
    ) -> Result<RunReport, SimError>
    where
        M: GroundMotionModel + Clone + Send,
    {
        self.config.validate()?;
        if sites.is_empty() {
            return Err(SimError::config("no sites to compute"));
        }
        std::fs::create_dir_all(&self.config.output_dir)?;
        
        let ruptures = catalog.ruptures();
        let num_workers = self.config.num_workers;
        
        let locations: Vec<Location> = sites.iter().map(|s| s.location).collect();
        let factored_periods: &[f64] = if self.config.scenario.spatial_correlation {
            &self.config.periods
        } else {
            &[]
        };
        let factors = CorrelationFactors::build(&locations, factored_periods, self.config.scenario.correlation)?;
        let shared_factorizations = factors.attempts();
        
        let shared = Shared {
            ruptures,
            sites,
            queue: WorkQueue::new(ruptures.len(), num_workers),
            slots: ColumnSlots::new(sites.len(), ruptures.len()),
            seeds: DeterministicSeeds::new(self.config.seed),
            factors: Arc::new(factors),
        };
        
        info!(
            "Running {} ruptures x {} sites x {} periods on {} workers (seed={})",
            ruptures.len(),
            sites.len(),
            self.config.periods.len(),
            num_workers,
            self.config.seed
        );
        let start = Instant::now();
        
        let workers: Vec<WorkerOutcome> = thread::scope(|scope| {
            let handles: Vec<_> = (0..num_workers)
                .map(|k| {
                    let model = model.clone();
                    let shared = &shared;
                    scope.spawn(move || self.run_worker(k, model, shared))
                })
                .collect();
            
            handles
                .into_iter()
                .enumerate()
                .map(|(k, handle)| match handle.join() {
                    Ok(outcome) => outcome,
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!("Worker {} panicked: {}", k, message);
                        WorkerOutcome {
                            panicked: Some(message),
                            ..WorkerOutcome::new(k)
                        }
                    }
                })
                .collect()
        });
        
        let lons = sites.iter().map(|s| s.location.lon).collect();
        let lats = sites.iter().map(|s| s.location.lat).collect();
        let (grid, missing) = shared.slots.into_shake_map(lons, lats)?;
        
        let report = RunReport {
            grid,
            workers,
            missing,
            shared_factorizations,
        };
        info!(
            "✓ Processed {}/{} ruptures in {:.2?}",
            report.processed(),
            ruptures.len(),
            start.elapsed()
        );
        if !report.is_complete() {
            warn!("{} ruptures have no grid column", report.missing.len());
        }
        Ok(report)
    }
    
    fn run_worker<M: GroundMotionModel>(
        &self,
        worker: usize,
        mut model: M,
        shared: &Shared<'_>,
    ) -> WorkerOutcome {
        let mut outcome = WorkerOutcome::new(worker);
        
        let mut scenario = match ScenarioShakeMap::with_shared_factors(
            shared.sites.to_vec(),
            self.config.scenario,
            Arc::clone(&shared.factors),
        ) {
            Ok(s) => s,
            Err(e) => {
                error!("Worker {} could not start: {}", worker, e);
                outcome.aborted = Some(e.to_string());
                return outcome;
            }
        };
        
        let listing_path = self.config.output_dir.join(listing_file_name(worker));
        let mut listing = match create_event_listing(&listing_path) {
            Ok(l) => l,
            Err(e) => {
                error!("Worker {} could not create {}: {}", worker, listing_path.display(), e);
                outcome.aborted = Some(e.to_string());
                return outcome;
            }
        };
        
        while let Some(range) = shared.queue.claim_next() {
            debug!("Worker {} claimed ruptures {}..{}", worker, range.start, range.end);
            
            for index in range.indices() {
                let result = self.process_rupture(index, &mut model, &mut scenario, shared, &mut listing);
                outcome.factorizations = scenario.factorizations();
                match result {
                    Ok(()) => outcome.processed += 1,
                    Err(SimError::Io(e)) => {
                        error!(
                            "Worker {} stopping at rupture {} ({} left in its range): {}",
                            worker,
                            index,
                            range.end - index,
                            e
                        );
                        outcome.aborted = Some(format!("rupture {}: {}", index, e));
                        outcome.abandoned = (index..range.end).collect();
                        if let Err(e) = listing.flush() {
                            warn!("Worker {} could not flush {}: {}", worker, listing_path.display(), e);
                        }
                        return outcome;
                    }
                    Err(e) => {
                        let rupture_id = shared.ruptures[index].id;
                        warn!("Skipping rupture {} (id {}): {}", index, rupture_id, e);
                        outcome.failures.push(RuptureFailure {
                            index,
                            rupture_id,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
        
        if let Err(e) = listing.flush() {
            error!("Worker {} could not flush {}: {}", worker, listing_path.display(), e);
            outcome.aborted = Some(e.to_string());
        }
        debug!("Worker {} done: {} processed", worker, outcome.processed);
        outcome
    }
    
    fn process_rupture<M: GroundMotionModel, W: Write>(
        &self,
        index: usize,
        model: &mut M,
        scenario: &mut ScenarioShakeMap,
        shared: &Shared<'_>,
        listing: &mut W,
    ) -> Result<(), SimError> {
        let rupture = &shared.ruptures[index];
        let periods = &self.config.periods;
        
        let mut source = shared.seeds.rupture_stream(index);
        let realizations = scenario.realize_rupture(model, rupture, periods, &mut source)?;
        
        let mut holder = MultiScenarioShakeMap::for_sites(shared.sites, periods.len(), Some(periods.clone()))?;
        for (column, realization) in realizations.iter().enumerate() {
            holder.set(column, &realization.values())?;
        }
        
        let pga = self.config.pga_column();
        shared.slots.fill(index, realizations[pga].values())?;
        
        let file_name = scenario_file_name(index);
        write_scenario_file(
            &self.config.output_dir.join(&file_name),
            &holder,
            self.config.row_repeats(),
        )?;
        append_event_line(listing, &file_name, rupture.magnitude)?;
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
