//! Scenario shake maps: one realization of ground motion per rupture and period.
//!
//! For each site `i`:
//!
//! ```text
//! ln Y_i = ln median_i + ε · σ_i + η_i
//! ```
//!
//! where `ε` is a single event-wide deviate shared by all sites and `η` is
//! the intra-event residual field. With spatial correlation on, `σ` is the
//! inter-event σ and `η = diag(σ_intra) · L · z` from the site set's
//! correlation factor; with it off, `σ` is the total σ and `η = 0`.

use serde::{Deserialize, Serialize};
use shakemap_env::{GroundMotionModel, Location, Rupture, Site, StdDevType};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::correlation::{CorrelationConfig, SpatialCorrelationModel};
use crate::error::{Result, ShakeMapError};
use crate::gauss::{GaussianSource, Truncation};
use crate::mean_field::checked_sigma;

/// When the event-wide deviate ε is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpsilonPolicy {
    /// One ε per rupture, reused for every period (full inter-period correlation)
    PerRupture,
    
    /// A fresh ε for each period
    PerPeriod,
}

/// Options of the realization builder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Add a spatially-correlated intra-event field
    #[serde(default)]
    pub spatial_correlation: bool,
    
    /// Add the event-wide residual term
    #[serde(default = "default_true")]
    pub include_inter_event: bool,
    
    #[serde(default = "default_epsilon_policy")]
    pub epsilon_policy: EpsilonPolicy,
    
    #[serde(default)]
    pub correlation: CorrelationConfig,
    
    /// Resample the correlated field's deviates with the model's truncation
    #[serde(default)]
    pub truncate_intra_field: bool,
}

fn default_true() -> bool {
    true
}

fn default_epsilon_policy() -> EpsilonPolicy {
    EpsilonPolicy::PerRupture
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            spatial_correlation: false,
            include_inter_event: true,
            epsilon_policy: EpsilonPolicy::PerRupture,
            correlation: CorrelationConfig::default(),
            truncate_intra_field: false,
        }
    }
}

impl ScenarioConfig {
    /// Enables or disables the correlated intra-event field.
    pub fn with_spatial_correlation(mut self, enabled: bool) -> Self {
        self.spatial_correlation = enabled;
        self
    }
    
    /// Truncates the correlated field's deviates like the event-wide ε.
    pub fn with_truncated_intra_field(mut self, enabled: bool) -> Self {
        self.truncate_intra_field = enabled;
        self
    }
    
    /// Sets the ε policy.
    pub fn with_epsilon_policy(mut self, policy: EpsilonPolicy) -> Self {
        self.epsilon_policy = policy;
        self
    }
    
    /// Standard deviation paired with the event-wide ε.
    pub fn event_std_dev_type(&self) -> StdDevType {
        if self.spatial_correlation {
            StdDevType::Inter
        } else {
            StdDevType::Total
        }
    }
}

/// Ground motion at every site for one rupture and period.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioRealization {
    /// Rupture this realization belongs to
    pub rupture_id: u64,
    
    /// Spectral period (s), 0 for PGA
    pub period: f64,
    
    /// ln ground motion per site
    pub log_values: Vec<f64>,
}

impl ScenarioRealization {
    /// Ground motion in natural units.
    pub fn values(&self) -> Vec<f64> {
        self.log_values.iter().map(|v| v.exp()).collect()
    }
    
    /// Number of sites.
    pub fn len(&self) -> usize {
        self.log_values.len()
    }
    
    /// True when no sites are held.
    pub fn is_empty(&self) -> bool {
        self.log_values.is_empty()
    }
}

/// Unit-σ correlation factors of one site set, built up front for a list
/// of periods and then shared read-only between builders.
///
/// Periods whose covariance is not positive definite are remembered, so
/// every user sees the same failure without refactoring.
#[derive(Debug, Default)]
pub struct CorrelationFactors {
    num_sites: usize,
    models: HashMap<u64, SpatialCorrelationModel>,
    failed: HashSet<u64>,
}

impl CorrelationFactors {
    /// Factors every distinct period once.
    ///
    /// Only `NotPositiveDefinite` is recorded as a per-period failure; any
    /// other error (bad period, empty site set) is returned.
    pub fn build(locations: &[Location], periods: &[f64], config: CorrelationConfig) -> Result<Self> {
        let mut factors = Self {
            num_sites: locations.len(),
            ..Default::default()
        };
        for &period in periods {
            let key = period.to_bits();
            if factors.models.contains_key(&key) || factors.failed.contains(&key) {
                continue;
            }
            match SpatialCorrelationModel::new(locations, 1.0, period, config) {
                Ok(model) => {
                    factors.models.insert(key, model);
                }
                Err(e @ ShakeMapError::NotPositiveDefinite { .. }) => {
                    warn!("Correlation setup failed for T={}s: {}", period, e);
                    factors.failed.insert(key);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(factors)
    }
    
    /// Number of sites the factors were built for.
    pub fn num_sites(&self) -> usize {
        self.num_sites
    }
    
    /// Factorizations attempted, successful or not.
    pub fn attempts(&self) -> usize {
        self.models.len() + self.failed.len()
    }
    
    /// The factor for `period`, its recorded failure, or `None` if never built.
    pub fn get(&self, period: f64) -> Option<Result<&SpatialCorrelationModel>> {
        let key = period.to_bits();
        if self.failed.contains(&key) {
            return Some(Err(ShakeMapError::NotPositiveDefinite {
                num_sites: self.num_sites,
                period,
            }));
        }
        self.models.get(&key).map(Ok)
    }
}

/// Builds scenario realizations for a fixed site set.
///
/// Correlation factors are cached per period with unit σ, so the O(N³)
/// decomposition runs once per period for the lifetime of the builder no
/// matter how many ruptures or draws follow.
pub struct ScenarioShakeMap {
    sites: Vec<Site>,
    locations: Vec<Location>,
    config: ScenarioConfig,
    
    /// Unit-σ correlation models keyed by period bits
    correlation_cache: HashMap<u64, SpatialCorrelationModel>,
    
    /// Periods whose covariance failed to factor; never retried
    failed_periods: HashSet<u64>,
    
    /// Prebuilt factors consulted before the local cache
    shared: Option<Arc<CorrelationFactors>>,
    
    /// Factorizations this builder ran itself
    factorizations: usize,
}

impl ScenarioShakeMap {
    /// Creates a builder for the given sites.
    pub fn new(sites: Vec<Site>, config: ScenarioConfig) -> Result<Self> {
        if sites.is_empty() {
            return Err(ShakeMapError::invalid("site list must contain at least one site"));
        }
        let locations = sites.iter().map(|s| s.location).collect();
        Ok(Self {
            sites,
            locations,
            config,
            correlation_cache: HashMap::new(),
            failed_periods: HashSet::new(),
            shared: None,
            factorizations: 0,
        })
    }
    
    /// Creates a builder that takes correlation factors from `factors`.
    ///
    /// Periods missing from `factors` are still factored locally on demand.
    pub fn with_shared_factors(
        sites: Vec<Site>,
        config: ScenarioConfig,
        factors: Arc<CorrelationFactors>,
    ) -> Result<Self> {
        if factors.num_sites() != sites.len() {
            return Err(ShakeMapError::SiteCountMismatch {
                expected: sites.len(),
                got: factors.num_sites(),
            });
        }
        let mut builder = Self::new(sites, config)?;
        builder.shared = Some(factors);
        Ok(builder)
    }
    
    /// The site set.
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }
    
    /// The configuration.
    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }
    
    /// Number of correlation factors computed so far.
    pub fn cached_factors(&self) -> usize {
        self.correlation_cache.len()
    }
    
    /// Number of factorizations this builder ran itself (shared factors excluded).
    pub fn factorizations(&self) -> usize {
        self.factorizations
    }
    
    /// Returns the unit-σ correlation model for `period`, building it on first use.
    pub fn correlation_model(&mut self, period: f64) -> Result<&SpatialCorrelationModel> {
        if let Some(found) = self.shared.as_deref().and_then(|f| f.get(period)) {
            return found;
        }
        
        let key = period.to_bits();
        if self.failed_periods.contains(&key) {
            return Err(ShakeMapError::NotPositiveDefinite {
                num_sites: self.sites.len(),
                period,
            });
        }
        if !self.correlation_cache.contains_key(&key) {
            self.factorizations += 1;
            match SpatialCorrelationModel::new(&self.locations, 1.0, period, self.config.correlation) {
                Ok(model) => {
                    self.correlation_cache.insert(key, model);
                }
                Err(e) => {
                    warn!("Correlation setup failed for T={}s: {}", period, e);
                    self.failed_periods.insert(key);
                    return Err(e);
                }
            }
        }
        self.correlation_cache
            .get(&key)
            .ok_or_else(|| ShakeMapError::invalid(format!("no correlation model for T={}", period)))
    }
    
    /// Draws the event-wide ε using the model's truncation at the current period.
    pub fn draw_epsilon<M, S>(&self, model: &M, source: &mut S) -> Result<f64>
    where
        M: GroundMotionModel + ?Sized,
        S: GaussianSource + ?Sized,
    {
        Ok(Truncation::from_model(model)?.sample(source))
    }
    
    /// Realizes every requested period for one rupture.
    ///
    /// With [`EpsilonPolicy::PerRupture`] a single ε is drawn (at the first
    /// period's truncation) and shared by all periods.
    pub fn realize_rupture<M, S>(
        &mut self,
        model: &mut M,
        rupture: &Rupture,
        periods: &[f64],
        source: &mut S,
    ) -> Result<Vec<ScenarioRealization>>
    where
        M: GroundMotionModel + ?Sized,
        S: GaussianSource + ?Sized,
    {
        if periods.is_empty() {
            return Err(ShakeMapError::invalid("at least one period is required"));
        }
        rupture
            .validate()
            .map_err(|e| ShakeMapError::invalid(e.to_string()))?;
        
        let mut shared_epsilon = None;
        let mut out = Vec::with_capacity(periods.len());
        for &period in periods {
            model.set_period(period);
            let epsilon = match (self.config.epsilon_policy, shared_epsilon) {
                (EpsilonPolicy::PerRupture, Some(eps)) => eps,
                _ => {
                    let eps = self.draw_epsilon(&*model, source)?;
                    shared_epsilon = Some(eps);
                    eps
                }
            };
            out.push(self.realize(model, rupture, period, epsilon, source)?);
        }
        Ok(out)
    }
    
    /// Realizes one period with a given event-wide ε.
    pub fn realize<M, S>(
        &mut self,
        model: &mut M,
        rupture: &Rupture,
        period: f64,
        epsilon: f64,
        source: &mut S,
    ) -> Result<ScenarioRealization>
    where
        M: GroundMotionModel + ?Sized,
        S: GaussianSource + ?Sized,
    {
        let spatial = self.config.spatial_correlation;
        if spatial
            && !(model.supports_std_dev(StdDevType::Inter) && model.supports_std_dev(StdDevType::Intra))
        {
            return Err(ShakeMapError::invalid(
                "spatial correlation needs a model with inter- and intra-event standard deviations",
            ));
        }
        
        // Step 1: std-dev type paired with ε
        let event_type = self.config.event_std_dev_type();
        let event_epsilon = if self.config.include_inter_event { epsilon } else { 0.0 };
        
        // Step 2: ln median + ε·σ
        model.set_period(period);
        model.set_rupture(rupture);
        let mut log_values = Vec::with_capacity(self.sites.len());
        let mut intra_sigmas = Vec::with_capacity(if spatial { self.sites.len() } else { 0 });
        for (i, site) in self.sites.iter().enumerate() {
            model.set_site(site);
            let mean = model.mean();
            if mean.is_nan() {
                return Err(ShakeMapError::model_output(format!(
                    "NaN mean at site {} for rupture {} (T={}s)",
                    i, rupture.id, period
                )));
            }
            let sigma = checked_sigma(&*model, event_type, rupture)?;
            log_values.push(mean + event_epsilon * sigma);
            
            if spatial {
                intra_sigmas.push(checked_sigma(&*model, StdDevType::Intra, rupture)?);
            }
        }
        
        // Step 3: correlated intra-event field, scaled per site
        if spatial {
            let truncation = if self.config.truncate_intra_field {
                Truncation::from_model(&*model)?
            } else {
                Truncation::None
            };
            let field = self
                .correlation_model(period)?
                .draw_field_truncated(&truncation, source);
            for ((value, sigma), eta) in log_values.iter_mut().zip(&intra_sigmas).zip(field.iter()) {
                *value += sigma * eta;
            }
        }
        
        debug!(
            "Realized rupture {} at T={}s over {} sites (ε={:.3})",
            rupture.id,
            period,
            log_values.len(),
            event_epsilon
        );
        
        // Step 4 (exponentiation) is deferred to ScenarioRealization::values
        Ok(ScenarioRealization {
            rupture_id: rupture.id,
            period,
            log_values,
        })
    }
}
