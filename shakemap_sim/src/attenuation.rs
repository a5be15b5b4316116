//! A small magnitude–distance attenuation model for demos and tests.
//!
//! This is not a published relationship. It gives the CLI and the
//! integration tests a plausible [`GroundMotionModel`] (PGA in g, a smooth
//! spectral shape, a Vs30 term and split inter/intra σ) without pulling in
//! a real attenuation library.

use serde::{Deserialize, Serialize};
use shakemap_env::{GroundMotionModel, Rupture, Site, StdDevType, TruncationType};

/// Coefficients and variability of the demo model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleAttenuation {
    /// ln PGA (g) at M6, 1 km, Vs30 = 760
    pub c0: f64,
    
    /// Linear magnitude scaling
    pub c1: f64,
    
    /// Geometric spreading coefficient
    pub c2: f64,
    
    /// Finite-fault saturation term (km)
    pub h: f64,
    
    /// Vs30 scaling exponent
    pub site_exponent: f64,
    
    /// Inter-event σ (ln units)
    pub sigma_inter: f64,
    
    /// Intra-event σ (ln units)
    pub sigma_intra: f64,
    
    pub truncation_type: TruncationType,
    pub truncation_level: f64,
    
    #[serde(skip)]
    state: ModelState,
}

#[derive(Debug, Clone, Default)]
struct ModelState {
    magnitude: f64,
    distance_km: f64,
    vs30: f64,
    period: f64,
    hypocenter: Option<shakemap_env::Location>,
}

impl Default for SimpleAttenuation {
    fn default() -> Self {
        Self {
            c0: -0.6,
            c1: 0.9,
            c2: 1.1,
            h: 6.0,
            site_exponent: -0.5,
            sigma_inter: 0.35,
            sigma_intra: 0.55,
            truncation_type: TruncationType::TwoSided,
            truncation_level: 3.0,
            state: ModelState {
                vs30: 760.0,
                ..Default::default()
            },
        }
    }
}

impl SimpleAttenuation {
    /// Sets the truncation applied to sampled residuals.
    pub fn with_truncation(mut self, kind: TruncationType, level: f64) -> Self {
        self.truncation_type = kind;
        self.truncation_level = level;
        self
    }
    
    /// Sets inter- and intra-event σ.
    pub fn with_sigmas(mut self, inter: f64, intra: f64) -> Self {
        self.sigma_inter = inter;
        self.sigma_intra = intra;
        self
    }
    
    /// ln spectral amplification relative to PGA.
    fn spectral_shape(period: f64) -> f64 {
        if period <= 0.0 {
            return 0.0;
        }
        let bump = 1.5 * (-0.5 * (period / 0.25).ln().powi(2)).exp();
        (1.0 + bump).ln() - 0.6 * (1.0 + period).ln()
    }
}

impl GroundMotionModel for SimpleAttenuation {
    fn set_rupture(&mut self, rupture: &Rupture) {
        self.state.magnitude = rupture.magnitude;
        self.state.hypocenter = Some(rupture.hypocenter);
    }
    
    fn set_site(&mut self, site: &Site) {
        self.state.vs30 = site.vs30;
        self.state.distance_km = match &self.state.hypocenter {
            Some(hypo) => hypo.distance_km(&site.location),
            None => f64::NAN,
        };
    }
    
    fn set_period(&mut self, period: f64) {
        self.state.period = period;
    }
    
    fn mean(&self) -> f64 {
        let s = &self.state;
        let r = (s.distance_km * s.distance_km + self.h * self.h).sqrt();
        self.c0 + self.c1 * (s.magnitude - 6.0) - self.c2 * r.ln()
            + self.site_exponent * (s.vs30 / 760.0).ln()
            + Self::spectral_shape(s.period)
    }
    
    fn std_dev(&self, kind: StdDevType) -> f64 {
        match kind {
            StdDevType::Inter => self.sigma_inter,
            StdDevType::Intra => self.sigma_intra,
            StdDevType::Total => self.sigma_inter.hypot(self.sigma_intra),
        }
    }
    
    fn supports_std_dev(&self, _kind: StdDevType) -> bool {
        true
    }
    
    fn truncation_level(&self) -> f64 {
        self.truncation_level
    }
    
    fn truncation_type(&self) -> TruncationType {
        self.truncation_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use shakemap_env::Location;
    
    fn mean_at(model: &mut SimpleAttenuation, magnitude: f64, lat: f64) -> f64 {
        let rupture = Rupture::new(0, magnitude, Location::with_depth(0.0, 0.0, 10.0));
        model.set_rupture(&rupture);
        model.set_site(&Site::new(Location::new(0.0, lat)));
        model.mean()
    }
    
    #[test]
    fn test_attenuates_with_distance_and_grows_with_magnitude() {
        let mut model = SimpleAttenuation::default();
        assert!(mean_at(&mut model, 6.0, 0.0) > mean_at(&mut model, 6.0, 0.5));
        assert!(mean_at(&mut model, 7.0, 0.1) > mean_at(&mut model, 6.0, 0.1));
    }
    
    #[test]
    fn test_total_sigma_combines_components() {
        let model = SimpleAttenuation::default().with_sigmas(0.3, 0.4);
        assert_relative_eq!(model.std_dev(StdDevType::Total), 0.5, epsilon = 1e-12);
    }
    
    #[test]
    fn test_mean_without_rupture_is_nan() {
        let mut model = SimpleAttenuation::default();
        model.set_site(&Site::new(Location::new(0.0, 0.0)));
        assert!(model.mean().is_nan());
    }
    
    #[test]
    fn test_spectral_shape_peaks_at_short_periods() {
        assert_eq!(SimpleAttenuation::spectral_shape(0.0), 0.0);
        assert!(SimpleAttenuation::spectral_shape(0.25) > SimpleAttenuation::spectral_shape(2.0));
    }
}
