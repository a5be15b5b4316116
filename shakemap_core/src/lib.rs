//! ShakeMap Core - Spatially-Correlated Ground-Motion Fields
//!
//! Turns a rupture, a ground-motion model and a site set into simulated
//! shaking, one realization at a time:
//! 1. **Gaussian sampling**: Box–Muller deviates with optional truncation
//! 2. **Spatial correlation**: distance-based covariance + Cholesky factor,
//!    computed once and reused for every draw
//! 3. **Scenario realization**: ln median + event-wide ε·σ + correlated
//!    intra-event field
//! 4. **Aggregation**: dense [site][column] tables with the legacy EQRM
//!    text layout

pub mod gauss;
pub mod correlation;
pub mod mean_field;
pub mod scenario;
pub mod multi;
mod error;

#[cfg(test)]
mod test_support;

// Re-export key types for convenience
pub use gauss::{BoxMuller, GaussianSource, Truncation};
pub use correlation::{correlation, correlation_range, CorrelationConfig, SpatialCorrelationModel};
pub use mean_field::MeanFieldCalculator;
pub use scenario::{CorrelationFactors, EpsilonPolicy, ScenarioConfig, ScenarioRealization, ScenarioShakeMap};
pub use multi::{ColumnSlots, MultiScenarioShakeMap, EQRM_ROW_REPEATS};
pub use error::{Result, ShakeMapError};
