//! Ground-motion model double shared by the unit tests.

use shakemap_env::{GroundMotionModel, Location, Rupture, Site, StdDevType, TruncationType};

/// Magnitude–distance model with fixed, configurable sigmas.
#[derive(Debug, Clone)]
pub struct TestModel {
    pub sigma_total: f64,
    pub sigma_inter: f64,
    pub sigma_intra: f64,
    pub truncation: (TruncationType, f64),
    pub total_only: bool,
    pub nan_mean: bool,
    pub(crate) rupture: Option<Rupture>,
    pub(crate) site: Option<Site>,
    pub(crate) period: f64,
    pub(crate) calls: usize,
}

impl Default for TestModel {
    fn default() -> Self {
        Self {
            sigma_total: 0.583,
            sigma_inter: 0.3,
            sigma_intra: 0.5,
            truncation: (TruncationType::None, 3.0),
            total_only: false,
            nan_mean: false,
            rupture: None,
            site: None,
            period: 0.0,
            calls: 0,
        }
    }
}

impl TestModel {
    /// Number of rupture/site updates received so far.
    pub fn calls(&self) -> usize {
        self.calls
    }
    
    /// The ln(median) this model reports for a rupture/site at the current period.
    pub fn mean_at(&self, rupture: &Rupture, site: &Site) -> f64 {
        let r = rupture.hypocenter.horizontal_distance_km(&site.location);
        0.3f64.ln() + 0.8 * (rupture.magnitude - 6.0) - 1.1 * ((r + 10.0) / 10.0).ln()
            - 0.2 * self.period
    }
}

impl GroundMotionModel for TestModel {
    fn set_rupture(&mut self, rupture: &Rupture) {
        self.calls += 1;
        self.rupture = Some(rupture.clone());
    }
    
    fn set_site(&mut self, site: &Site) {
        self.calls += 1;
        self.site = Some(site.clone());
    }
    
    fn set_period(&mut self, period: f64) {
        self.period = period;
    }
    
    fn mean(&self) -> f64 {
        if self.nan_mean {
            return f64::NAN;
        }
        match (&self.rupture, &self.site) {
            (Some(rup), Some(site)) => self.mean_at(rup, site),
            _ => f64::NAN,
        }
    }
    
    fn std_dev(&self, kind: StdDevType) -> f64 {
        match kind {
            StdDevType::Total => self.sigma_total,
            StdDevType::Inter if !self.total_only => self.sigma_inter,
            StdDevType::Intra if !self.total_only => self.sigma_intra,
            _ => f64::NAN,
        }
    }
    
    fn supports_std_dev(&self, kind: StdDevType) -> bool {
        kind == StdDevType::Total || !self.total_only
    }
    
    fn truncation_level(&self) -> f64 {
        self.truncation.1
    }
    
    fn truncation_type(&self) -> TruncationType {
        self.truncation.0
    }
}

pub fn test_rupture() -> Rupture {
    Rupture::new(1, 6.5, Location::with_depth(0.0, 0.0, 10.0))
}

pub fn sites_along_meridian(n: usize, step_deg: f64) -> Vec<Site> {
    (0..n)
        .map(|i| Site::new(Location::new(0.0, i as f64 * step_deg)))
        .collect()
}
