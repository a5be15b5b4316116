//! Per-site ground motion without spatial correlation.
//!
//! The mean field is the model's ln(median) at each site. Stochastic fields
//! add Gaussian residuals drawn independently per site, truncated according
//! to the model's own truncation settings.

use shakemap_env::{GroundMotionModel, Rupture, Site, StdDevType};
use std::time::Instant;
use tracing::debug;

use crate::error::{Result, ShakeMapError};
use crate::gauss::{GaussianSource, Truncation};

/// Computes mean and uncorrelated stochastic fields for one rupture.
///
/// Inputs are validated once in [`MeanFieldCalculator::new`]; the per-site
/// loops assume them valid.
pub struct MeanFieldCalculator<'a, M: GroundMotionModel + ?Sized> {
    model: &'a mut M,
    rupture: &'a Rupture,
    sites: &'a [Site],
}

impl<'a, M: GroundMotionModel + ?Sized> MeanFieldCalculator<'a, M> {
    /// Validates the inputs and binds them to a calculator.
    pub fn new(model: &'a mut M, rupture: &'a Rupture, sites: &'a [Site]) -> Result<Self> {
        if sites.is_empty() {
            return Err(ShakeMapError::invalid("site list must contain at least one site"));
        }
        rupture
            .validate()
            .map_err(|e| ShakeMapError::invalid(e.to_string()))?;
        
        Ok(Self { model, rupture, sites })
    }
    
    /// Returns ln(median) ground motion per site.
    pub fn mean_field(&mut self) -> Result<Vec<f64>> {
        let start = Instant::now();
        self.model.set_rupture(self.rupture);
        
        let mut means = Vec::with_capacity(self.sites.len());
        for (i, site) in self.sites.iter().enumerate() {
            self.model.set_site(site);
            let mean = self.model.mean();
            if mean.is_nan() {
                return Err(ShakeMapError::model_output(format!(
                    "NaN mean at site {} for rupture {}",
                    i, self.rupture.id
                )));
            }
            means.push(mean);
        }
        
        debug!("Mean field over {} sites in {:?}", means.len(), start.elapsed());
        Ok(means)
    }
    
    /// Mean field plus an independent truncated deviate × total σ per site.
    pub fn stochastic_field<S: GaussianSource + ?Sized>(&mut self, source: &mut S) -> Result<Vec<f64>> {
        let mut field = self.mean_field()?;
        self.add_site_residuals(&mut field, StdDevType::Total, source)?;
        Ok(field)
    }
    
    /// Mean field plus residuals split by event and site when the model allows.
    ///
    /// Models exposing both inter- and intra-event σ get one inter-event
    /// residual shared by every site and an independent intra-event residual
    /// per site; other models get independent total residuals.
    pub fn uncorrelated_field<S: GaussianSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<Vec<f64>> {
        let mut field = self.mean_field()?;
        
        if self.model.supports_std_dev(StdDevType::Inter)
            && self.model.supports_std_dev(StdDevType::Intra)
        {
            let truncation = Truncation::from_model(&*self.model)?;
            let epsilon = truncation.sample(source);
            for (value, site) in field.iter_mut().zip(self.sites) {
                self.model.set_site(site);
                let sigma = checked_sigma(&*self.model, StdDevType::Inter, self.rupture)?;
                *value += epsilon * sigma;
            }
            self.add_site_residuals(&mut field, StdDevType::Intra, source)?;
        } else {
            self.add_site_residuals(&mut field, StdDevType::Total, source)?;
        }
        
        Ok(field)
    }
    
    fn add_site_residuals<S: GaussianSource + ?Sized>(
        &mut self,
        field: &mut [f64],
        kind: StdDevType,
        source: &mut S,
    ) -> Result<()> {
        let truncation = Truncation::from_model(&*self.model)?;
        self.model.set_rupture(self.rupture);
        for (value, site) in field.iter_mut().zip(self.sites) {
            self.model.set_site(site);
            let sigma = checked_sigma(&*self.model, kind, self.rupture)?;
            *value += truncation.sample(source) * sigma;
        }
        Ok(())
    }
}

/// Reads a standard deviation, rejecting NaN and negative values.
pub(crate) fn checked_sigma<M: GroundMotionModel + ?Sized>(
    model: &M,
    kind: StdDevType,
    rupture: &Rupture,
) -> Result<f64> {
    let sigma = model.std_dev(kind);
    if sigma.is_nan() || sigma < 0.0 {
        return Err(ShakeMapError::model_output(format!(
            "{} standard deviation {} for rupture {}",
            kind, sigma, rupture.id
        )));
    }
    Ok(sigma)
}

/// Shorthand for [`MeanFieldCalculator::mean_field`].
pub fn mean_field<M: GroundMotionModel + ?Sized>(
    model: &mut M,
    rupture: &Rupture,
    sites: &[Site],
) -> Result<Vec<f64>> {
    MeanFieldCalculator::new(model, rupture, sites)?.mean_field()
}

/// Shorthand for [`MeanFieldCalculator::stochastic_field`].
pub fn stochastic_field<M: GroundMotionModel + ?Sized, S: GaussianSource + ?Sized>(
    model: &mut M,
    rupture: &Rupture,
    sites: &[Site],
    source: &mut S,
) -> Result<Vec<f64>> {
    MeanFieldCalculator::new(model, rupture, sites)?.stochastic_field(source)
}
