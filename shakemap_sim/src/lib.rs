//! Scenario shake-map simulation over rupture catalogs.
//!
//! This crate drives [`shakemap_core`] across a whole catalog: it loads or
//! synthesizes ruptures, fans them out over a fixed pool of worker threads,
//! and writes one EQRM scenario file per rupture plus an event listing per
//! worker. The PGA layer of every rupture is gathered into one grid.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │               ParallelScenarioOrchestrator                    │
//! │                                                               │
//! │   RuptureCatalog ──► WorkQueue (Mutex cursor, shrinking chunks)│
//! │                          │            │            │          │
//! │                     ┌────▼───┐   ┌────▼───┐   ┌────▼───┐      │
//! │                     │Worker 0│   │Worker 1│   │Worker k│ ...  │
//! │                     │ model  │   │ model  │   │ model  │      │
//! │                     │ cache  │   │ cache  │   │ cache  │      │
//! │                     └──┬──┬──┘   └──┬──┬──┘   └──┬──┬──┘      │
//! │   scenario_NNNNNN.txt ◄┘  │         │  │         │  │         │
//! │                           ▼         ▼  ▼         ▼  ▼         │
//! │                ColumnSlots (write-once column per rupture)    │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use shakemap_sim::{OrchestratorConfig, ParallelScenarioOrchestrator, SimpleAttenuation};
//!
//! let config = OrchestratorConfig::default().with_workers(4).with_seed(7);
//! let report = ParallelScenarioOrchestrator::new(config)
//!     .run(SimpleAttenuation::default(), &catalog, &sites)?;
//! ```

mod error;
mod seeds;
mod work;
pub mod attenuation;
pub mod catalog;
pub mod orchestrator;
pub mod writer;

pub use attenuation::SimpleAttenuation;
pub use catalog::{RuptureCatalog, SyntheticCatalog};
pub use error::SimError;
pub use orchestrator::{
    listing_file_name, scenario_file_name, OrchestratorConfig, ParallelScenarioOrchestrator,
    RunReport, RunSummary, RuptureFailure, WorkerOutcome,
};
pub use seeds::DeterministicSeeds;
pub use work::{WorkQueue, WorkRange};
