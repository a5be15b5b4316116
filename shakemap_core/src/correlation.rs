//! Spatial correlation of intra-event residuals.
//!
//! Correlation model of Jayaram & Baker (2009): residuals at two sites `d`
//! km apart correlate as `exp(-3 d / range(T))`. The covariance matrix over
//! a site set is factored once (Cholesky, `Σ = L·Lᵀ`) and the factor is
//! reused for every draw: a correlated field is `L·z` for a fresh standard
//! normal vector `z`.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use shakemap_env::Location;
use std::time::Instant;
use tracing::debug;

use crate::error::{Result, ShakeMapError};
use crate::gauss::{gaussian_vector, GaussianSource, Truncation};

/// Options of the correlation model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Use the range for clustered Vs30 (40.7 - 15T for T < 1s)
    #[serde(default)]
    pub vs30_clustered: bool,
    
    /// Pairs farther apart than `factor * range(T)` get zero covariance
    #[serde(default)]
    pub truncation_factor: Option<f64>,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            vs30_clustered: false,
            truncation_factor: None,
        }
    }
}

/// Correlation range in km for spectral period `period` (s).
pub fn correlation_range(period: f64, vs30_clustered: bool) -> f64 {
    if period >= 1.0 {
        22.0 + 3.7 * period
    } else if vs30_clustered {
        40.7 - 15.0 * period
    } else {
        8.5 + 17.2 * period
    }
}

/// Correlation coefficient between residuals `distance_km` apart.
pub fn correlation(distance_km: f64, period: f64, vs30_clustered: bool) -> f64 {
    (-3.0 * distance_km / correlation_range(period, vs30_clustered)).exp()
}

/// Covariance matrix and its Cholesky factor for one site set, σ and period.
#[derive(Debug, Clone)]
pub struct SpatialCorrelationModel {
    /// Σ(i, j) = σᵢ σⱼ ρ(dᵢⱼ, T)
    covariance: DMatrix<f64>,
    
    /// Lower-triangular L with L·Lᵀ = Σ
    cholesky_l: DMatrix<f64>,
    
    /// Spectral period (s), 0 for PGA
    period: f64,
    
    config: CorrelationConfig,
}

impl SpatialCorrelationModel {
    /// Builds the model with one σ shared by all sites.
    ///
    /// # Arguments
    /// * `locations` - Site locations (must be distinct)
    /// * `sigma` - Intra-event standard deviation (ln units)
    /// * `period` - Spectral period in seconds (0 for PGA)
    /// * `config` - Correlation model options
    pub fn new(
        locations: &[Location],
        sigma: f64,
        period: f64,
        config: CorrelationConfig,
    ) -> Result<Self> {
        let sigmas = vec![sigma; locations.len()];
        Self::with_site_sigmas(locations, &sigmas, period, config)
    }
    
    /// Builds the model with a per-site σ.
    pub fn with_site_sigmas(
        locations: &[Location],
        sigmas: &[f64],
        period: f64,
        config: CorrelationConfig,
    ) -> Result<Self> {
        if locations.is_empty() {
            return Err(ShakeMapError::invalid("correlation model needs at least one site"));
        }
        if sigmas.len() != locations.len() {
            return Err(ShakeMapError::SiteCountMismatch {
                expected: locations.len(),
                got: sigmas.len(),
            });
        }
        if let Some(bad) = sigmas.iter().find(|s| !(s.is_finite() && **s > 0.0)) {
            return Err(ShakeMapError::invalid(format!(
                "intra-event sigma must be positive and finite, got {}",
                bad
            )));
        }
        if !(period.is_finite() && period >= 0.0) {
            return Err(ShakeMapError::invalid(format!("invalid period {}", period)));
        }
        
        let start = Instant::now();
        let covariance = build_covariance(locations, sigmas, period, &config);
        
        let n = locations.len();
        let cholesky_l = match covariance.clone().cholesky() {
            Some(chol) => chol.l(),
            None => {
                return Err(ShakeMapError::NotPositiveDefinite { num_sites: n, period });
            }
        };
        
        debug!(
            "Factored {}x{} covariance (T={}s) in {:?}",
            n,
            n,
            period,
            start.elapsed()
        );
        
        Ok(Self {
            covariance,
            cholesky_l,
            period,
            config,
        })
    }
    
    /// Returns the covariance matrix.
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }
    
    /// Returns the lower-triangular Cholesky factor.
    pub fn cholesky_factor(&self) -> &DMatrix<f64> {
        &self.cholesky_l
    }
    
    /// Spectral period this model was built for.
    pub fn period(&self) -> f64 {
        self.period
    }
    
    /// Options this model was built with.
    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }
    
    /// Number of sites.
    pub fn num_sites(&self) -> usize {
        self.cholesky_l.nrows()
    }
    
    /// Draws one correlated residual field `L·z`.
    pub fn draw_field<S: GaussianSource + ?Sized>(&self, source: &mut S) -> DVector<f64> {
        let z = gaussian_vector(source, self.num_sites());
        self.apply(&z)
    }
    
    /// Draws `L·z` with every component of `z` resampled per `truncation`.
    pub fn draw_field_truncated<S: GaussianSource + ?Sized>(
        &self,
        truncation: &Truncation,
        source: &mut S,
    ) -> DVector<f64> {
        let z = DVector::from_fn(self.num_sites(), |_, _| truncation.sample(source));
        self.apply(&z)
    }
    
    /// Applies the factor to a given standard-normal vector.
    pub fn apply(&self, z: &DVector<f64>) -> DVector<f64> {
        &self.cholesky_l * z
    }
}

/// Fills the symmetric covariance matrix, both triangles.
fn build_covariance(
    locations: &[Location],
    sigmas: &[f64],
    period: f64,
    config: &CorrelationConfig,
) -> DMatrix<f64> {
    let n = locations.len();
    let range = correlation_range(period, config.vs30_clustered);
    let cutoff = config.truncation_factor.map(|k| k * range);
    
    let mut cov = DMatrix::zeros(n, n);
    for i in 0..n {
        cov[(i, i)] = sigmas[i] * sigmas[i];
        for j in (i + 1)..n {
            let d = locations[i].horizontal_distance_km(&locations[j]);
            if cutoff.is_some_and(|c| d > c) {
                continue;
            }
            let value = sigmas[i] * sigmas[j] * (-3.0 * d / range).exp();
            cov[(i, j)] = value;
            cov[(j, i)] = value;
        }
    }
    cov
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gauss::BoxMuller;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    
    fn line_of_sites(n: usize, step_deg: f64) -> Vec<Location> {
        (0..n).map(|i| Location::new(0.0, i as f64 * step_deg)).collect()
    }
    
    #[test]
    fn test_correlation_range_branches() {
        assert_relative_eq!(correlation_range(0.0, false), 8.5);
        assert_relative_eq!(correlation_range(0.5, false), 8.5 + 8.6);
        assert_relative_eq!(correlation_range(0.5, true), 40.7 - 7.5);
        assert_relative_eq!(correlation_range(1.0, false), 25.7, epsilon = 1e-12);
        assert_relative_eq!(correlation_range(2.0, true), 29.4, epsilon = 1e-12);
    }
    
    #[test]
    fn test_correlation_is_one_at_zero_distance() {
        for t in [0.0, 0.3, 1.0, 3.0] {
            assert_relative_eq!(correlation(0.0, t, false), 1.0);
        }
    }
    
    proptest! {
        #[test]
        fn prop_correlation_non_increasing(
            d1 in 0.0f64..500.0,
            delta in 0.0f64..500.0,
            period in 0.0f64..5.0,
            clustered in any::<bool>(),
        ) {
            let near = correlation(d1, period, clustered);
            let far = correlation(d1 + delta, period, clustered);
            prop_assert!(far <= near);
            prop_assert!(near <= 1.0 && far >= 0.0);
        }
    }
    
    #[test]
    fn test_covariance_is_symmetric_with_sigma_squared_diagonal() {
        let sites = line_of_sites(4, 0.1);
        let model = SpatialCorrelationModel::new(&sites, 0.5, 0.0, CorrelationConfig::default())
            .unwrap();
        let cov = model.covariance();
        
        for i in 0..4 {
            assert_relative_eq!(cov[(i, i)], 0.25);
            for j in 0..4 {
                assert_eq!(cov[(i, j)], cov[(j, i)]);
            }
        }
        
        let d = sites[0].horizontal_distance_km(&sites[1]);
        assert_relative_eq!(cov[(0, 1)], 0.25 * correlation(d, 0.0, false), epsilon = 1e-15);
    }
    
    #[test]
    fn test_cholesky_reproduces_covariance() {
        let sites = line_of_sites(12, 0.05);
        let model = SpatialCorrelationModel::new(&sites, 0.6, 0.2, CorrelationConfig::default())
            .unwrap();
        let l = model.cholesky_factor();
        let rebuilt = l * l.transpose();
        
        for i in 0..12 {
            for j in 0..12 {
                assert_relative_eq!(
                    rebuilt[(i, j)],
                    model.covariance()[(i, j)],
                    max_relative = 1e-8,
                    epsilon = 1e-12
                );
                if j > i {
                    assert_eq!(l[(i, j)], 0.0, "factor must be lower triangular");
                }
            }
        }
    }
    
    #[test]
    fn test_per_site_sigmas_scale_entries() {
        let sites = line_of_sites(2, 0.1);
        let model = SpatialCorrelationModel::with_site_sigmas(
            &sites,
            &[0.5, 0.8],
            0.0,
            CorrelationConfig::default(),
        )
        .unwrap();
        let rho = correlation(sites[0].horizontal_distance_km(&sites[1]), 0.0, false);
        
        assert_relative_eq!(model.covariance()[(1, 1)], 0.64);
        assert_relative_eq!(model.covariance()[(0, 1)], 0.4 * rho, epsilon = 1e-15);
    }
    
    #[test]
    fn test_truncation_factor_zeroes_far_pairs() {
        // ~55 km apart, well beyond 2 * 8.5 km
        let sites = vec![Location::new(0.0, 0.0), Location::new(0.0, 0.5)];
        let config = CorrelationConfig {
            truncation_factor: Some(2.0),
            ..Default::default()
        };
        let model = SpatialCorrelationModel::new(&sites, 1.0, 0.0, config).unwrap();
        assert_eq!(model.covariance()[(0, 1)], 0.0);
    }
    
    #[test]
    fn test_duplicate_sites_are_not_positive_definite() {
        let sites = vec![
            Location::new(10.0, 45.0),
            Location::new(10.0, 45.0),
            Location::new(10.0, 45.1),
        ];
        let err = SpatialCorrelationModel::new(&sites, 0.5, 0.0, CorrelationConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ShakeMapError::NotPositiveDefinite { num_sites: 3, .. }
        ));
    }
    
    #[test]
    fn test_rejects_invalid_inputs() {
        let sites = line_of_sites(3, 0.1);
        assert!(SpatialCorrelationModel::new(&[], 0.5, 0.0, CorrelationConfig::default()).is_err());
        assert!(SpatialCorrelationModel::new(&sites, 0.0, 0.0, CorrelationConfig::default()).is_err());
        assert!(SpatialCorrelationModel::new(&sites, 0.5, -1.0, CorrelationConfig::default()).is_err());
        assert!(SpatialCorrelationModel::with_site_sigmas(
            &sites,
            &[0.5, 0.5],
            0.0,
            CorrelationConfig::default()
        )
        .is_err());
    }
    
    #[test]
    fn test_draws_reuse_factor_and_differ() {
        let sites = line_of_sites(5, 0.1);
        let model = SpatialCorrelationModel::new(&sites, 0.5, 0.0, CorrelationConfig::default())
            .unwrap();
        let factor_before = model.cholesky_factor().clone();
        
        let mut source = BoxMuller::seeded(11);
        let a = model.draw_field(&mut source);
        let b = model.draw_field(&mut source);
        
        assert_eq!(a.len(), 5);
        assert_ne!(a, b);
        assert_eq!(&factor_before, model.cholesky_factor());
    }
    
    #[test]
    fn test_truncated_draw_resamples_each_component() {
        struct Scripted(Vec<f64>, usize);
        impl GaussianSource for Scripted {
            fn next_gaussian(&mut self) -> f64 {
                let v = self.0[self.1];
                self.1 += 1;
                v
            }
        }
        
        let sites = line_of_sites(3, 0.1);
        let model = SpatialCorrelationModel::new(&sites, 0.5, 0.0, CorrelationConfig::default())
            .unwrap();
        let mut source = Scripted(vec![3.0, 0.5, -2.5, 0.2, 0.1], 0);
        let field = model.draw_field_truncated(&Truncation::TwoSided(1.0), &mut source);
        
        assert_eq!(source.1, 5);
        let expected = model.apply(&DVector::from_vec(vec![0.5, 0.2, 0.1]));
        assert_eq!(field, expected);
    }
    
    #[test]
    fn test_untruncated_policy_matches_plain_draw() {
        let sites = line_of_sites(4, 0.1);
        let model = SpatialCorrelationModel::new(&sites, 0.5, 0.0, CorrelationConfig::default())
            .unwrap();
        let a = model.draw_field(&mut BoxMuller::seeded(5));
        let b = model.draw_field_truncated(&Truncation::None, &mut BoxMuller::seeded(5));
        assert_eq!(a, b);
    }
    
    #[test]
    fn test_empirical_correlation_matches_model() {
        // Three sites 0.1 degrees apart along a meridian, PGA, sigma 0.5
        let sites = line_of_sites(3, 0.1);
        let sigma = 0.5;
        let model = SpatialCorrelationModel::new(&sites, sigma, 0.0, CorrelationConfig::default())
            .unwrap();
        
        let n = 10_000;
        let mut source = BoxMuller::seeded(2024);
        let draws: Vec<DVector<f64>> = (0..n).map(|_| model.draw_field(&mut source)).collect();
        
        let pearson = |i: usize, j: usize| {
            let mi = draws.iter().map(|d| d[i]).sum::<f64>() / n as f64;
            let mj = draws.iter().map(|d| d[j]).sum::<f64>() / n as f64;
            let mut sij = 0.0;
            let mut sii = 0.0;
            let mut sjj = 0.0;
            for d in &draws {
                sij += (d[i] - mi) * (d[j] - mj);
                sii += (d[i] - mi).powi(2);
                sjj += (d[j] - mj).powi(2);
            }
            sij / (sii * sjj).sqrt()
        };
        
        for (i, j) in [(0, 1), (0, 2), (1, 2)] {
            let d = sites[i].horizontal_distance_km(&sites[j]);
            let expected = correlation(d, 0.0, false);
            assert_relative_eq!(pearson(i, j), expected, epsilon = 0.05);
        }
    }
}
