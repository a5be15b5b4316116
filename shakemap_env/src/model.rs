//! The ground-motion-model capability consumed by the shake-map core.

use serde::{Deserialize, Serialize};

use crate::error::EnvError;
use crate::types::{Rupture, Site};

/// Which component of the model's aleatory variability to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StdDevType {
    /// Total standard deviation (inter and intra combined)
    Total,
    
    /// Inter-event (between-event) standard deviation
    Inter,
    
    /// Intra-event (within-event) standard deviation
    Intra,
}

impl StdDevType {
    /// Returns the parameter name.
    pub fn name(&self) -> &'static str {
        match self {
            StdDevType::Total => "total",
            StdDevType::Inter => "inter",
            StdDevType::Intra => "intra",
        }
    }
}

impl std::fmt::Display for StdDevType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How Gaussian deviates are truncated when sampling residuals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TruncationType {
    /// Unbounded normal distribution
    None,
    
    /// Deviates limited to [-level, level]
    TwoSided,
    
    /// Deviates limited to (-inf, level]
    OneSided,
}

impl TruncationType {
    /// Returns the parameter name.
    pub fn name(&self) -> &'static str {
        match self {
            TruncationType::None => "none",
            TruncationType::TwoSided => "2 sided",
            TruncationType::OneSided => "1 sided",
        }
    }
}

impl std::fmt::Display for TruncationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for TruncationType {
    type Err = EnvError;
    
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], " ").trim() {
            "none" | "" => Ok(TruncationType::None),
            "2 sided" | "2sided" | "two sided" | "twosided" => Ok(TruncationType::TwoSided),
            "1 sided" | "1sided" | "one sided" | "onesided" => Ok(TruncationType::OneSided),
            other => Err(EnvError::UnknownValue(format!("truncation type '{}'", other))),
        }
    }
}

/// An attenuation relationship, seen as an opaque capability.
///
/// The model is stateful in the classic way: callers set the rupture, the
/// site and the spectral period, then query the mean and standard deviation
/// for that combination. Every worker thread owns its own instance, hence
/// `Clone + Send` bounds at the call sites rather than interior locking.
///
/// All values are in natural-log units of the intensity measure.
pub trait GroundMotionModel {
    /// Sets the rupture for subsequent queries.
    fn set_rupture(&mut self, rupture: &Rupture);
    
    /// Sets the site for subsequent queries.
    fn set_site(&mut self, site: &Site);
    
    /// Selects the intensity measure: `0.0` is PGA, otherwise SA at this period (s).
    fn set_period(&mut self, period: f64);
    
    /// Returns ln(median) ground motion for the current rupture/site/period.
    fn mean(&self) -> f64;
    
    /// Returns the requested standard deviation for the current state.
    fn std_dev(&self, kind: StdDevType) -> f64;
    
    /// Whether the model can report the given standard-deviation component.
    ///
    /// Every model supports [`StdDevType::Total`].
    fn supports_std_dev(&self, kind: StdDevType) -> bool {
        matches!(kind, StdDevType::Total)
    }
    
    /// Truncation level in units of standard deviation.
    fn truncation_level(&self) -> f64;
    
    /// Truncation type applied to sampled deviates.
    fn truncation_type(&self) -> TruncationType;
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_truncation_type_parsing() {
        assert_eq!("none".parse::<TruncationType>().unwrap(), TruncationType::None);
        assert_eq!("2 Sided".parse::<TruncationType>().unwrap(), TruncationType::TwoSided);
        assert_eq!("two-sided".parse::<TruncationType>().unwrap(), TruncationType::TwoSided);
        assert_eq!("1_sided".parse::<TruncationType>().unwrap(), TruncationType::OneSided);
        assert!("three sided".parse::<TruncationType>().is_err());
    }
    
    #[test]
    fn test_truncation_type_display_round_trip() {
        for t in [TruncationType::None, TruncationType::TwoSided, TruncationType::OneSided] {
            assert_eq!(t.to_string().parse::<TruncationType>().unwrap(), t);
        }
    }
}
