//! Rupture catalogs: merged, time-ordered collections of ruptures.

use rand::Rng;
use rand_distr::{Distribution, Exp, Normal, Uniform};
use serde::{Deserialize, Serialize};
use shakemap_env::{Location, Rupture};
use std::path::Path;
use tracing::{debug, info};

use crate::error::SimError;

/// Ruptures ordered by origin time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RuptureCatalog {
    ruptures: Vec<Rupture>,
}

/// On-disk catalog: a flat rupture list or several sources to merge.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Flat(Vec<Rupture>),
    Sources { sources: Vec<Vec<Rupture>> },
}

impl RuptureCatalog {
    /// Merges several rupture sources into one time-ordered catalog.
    ///
    /// Ties keep source order, then in-source order.
    pub fn merge(sources: Vec<Vec<Rupture>>) -> Self {
        let mut ruptures: Vec<Rupture> = sources.into_iter().flatten().collect();
        ruptures.sort_by(|a, b| a.origin_time.total_cmp(&b.origin_time));
        Self { ruptures }
    }
    
    /// Builds a catalog from one source.
    pub fn from_ruptures(ruptures: Vec<Rupture>) -> Self {
        Self::merge(vec![ruptures])
    }
    
    /// Parses a JSON catalog (a rupture array, or `{"sources": [[...], ...]}`).
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let catalog = match file {
            CatalogFile::Flat(ruptures) => Self::from_ruptures(ruptures),
            CatalogFile::Sources { sources } => {
                debug!("Merging {} rupture sources", sources.len());
                Self::merge(sources)
            }
        };
        for rupture in &catalog.ruptures {
            rupture.validate()?;
        }
        Ok(catalog)
    }
    
    /// Loads a JSON catalog from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let catalog = Self::from_json(&text)?;
        info!("Loaded {} ruptures from {}", catalog.len(), path.as_ref().display());
        Ok(catalog)
    }
    
    pub fn ruptures(&self) -> &[Rupture] {
        &self.ruptures
    }
    
    pub fn get(&self, index: usize) -> Option<&Rupture> {
        self.ruptures.get(index)
    }
    
    pub fn len(&self) -> usize {
        self.ruptures.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.ruptures.is_empty()
    }
}

/// Generates random catalogs for demos and tests.
///
/// Origin times follow a Poisson process, magnitudes a doubly-truncated
/// Gutenberg–Richter law, epicenters are uniform in a lon/lat box.
#[derive(Debug, Clone)]
pub struct SyntheticCatalog {
    /// Number of ruptures to generate
    pub num_ruptures: usize,
    
    /// Mean event rate (events per second of catalog time)
    pub rate: f64,
    
    /// Magnitude bounds
    pub min_magnitude: f64,
    pub max_magnitude: f64,
    
    /// Gutenberg–Richter b-value
    pub b_value: f64,
    
    /// Epicenter box [lon_min, lon_max, lat_min, lat_max]
    pub region: [f64; 4],
    
    /// Mean and standard deviation of hypocentral depth (km)
    pub depth_mean: f64,
    pub depth_std: f64,
}

impl Default for SyntheticCatalog {
    fn default() -> Self {
        Self {
            num_ruptures: 100,
            rate: 1.0 / 86_400.0,
            min_magnitude: 5.0,
            max_magnitude: 7.5,
            b_value: 1.0,
            region: [-0.5, 0.5, -0.5, 0.5],
            depth_mean: 10.0,
            depth_std: 3.0,
        }
    }
}

impl SyntheticCatalog {
    /// Sets the number of ruptures.
    pub fn with_ruptures(mut self, n: usize) -> Self {
        self.num_ruptures = n;
        self
    }
    
    /// Sets the epicenter box.
    pub fn with_region(mut self, lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> Self {
        self.region = [lon_min, lon_max, lat_min, lat_max];
        self
    }
    
    /// Draws a magnitude by inverting the truncated Gutenberg–Richter CDF.
    pub fn sample_magnitude<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let u: f64 = rng.gen();
        let span = 1.0 - 10f64.powf(-self.b_value * (self.max_magnitude - self.min_magnitude));
        self.min_magnitude - (1.0 - u * span).log10() / self.b_value
    }
    
    /// Generates the catalog.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<RuptureCatalog, SimError> {
        if !(self.rate > 0.0) {
            return Err(SimError::config(format!("event rate must be positive, got {}", self.rate)));
        }
        if self.max_magnitude < self.min_magnitude || !(self.b_value > 0.0) {
            return Err(SimError::config("invalid magnitude-frequency parameters"));
        }
        let [lon_min, lon_max, lat_min, lat_max] = self.region;
        if lon_max < lon_min || lat_max < lat_min {
            return Err(SimError::config("invalid epicenter region"));
        }
        
        let gaps = Exp::new(self.rate).map_err(|e| SimError::config(e.to_string()))?;
        let depth = Normal::new(self.depth_mean, self.depth_std.max(0.0))
            .map_err(|e| SimError::config(e.to_string()))?;
        let lon = Uniform::new_inclusive(lon_min, lon_max);
        let lat = Uniform::new_inclusive(lat_min, lat_max);
        
        let mut time = 0.0;
        let mut ruptures = Vec::with_capacity(self.num_ruptures);
        for id in 0..self.num_ruptures {
            time += gaps.sample(rng);
            let hypocenter = Location::with_depth(
                lon.sample(rng),
                lat.sample(rng),
                depth.sample(rng).clamp(1.0, 40.0),
            );
            let mut rupture = Rupture::new(id as u64, self.sample_magnitude(rng), hypocenter)
                .at_time(time);
            rupture.rake = rng.gen_range(-180.0..180.0);
            ruptures.push(rupture);
        }
        
        Ok(RuptureCatalog::from_ruptures(ruptures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    
    fn rup(id: u64, t: f64) -> Rupture {
        Rupture::new(id, 6.0, Location::new(0.0, 0.0)).at_time(t)
    }
    
    #[test]
    fn test_merge_orders_by_time_and_is_stable() {
        let a = vec![rup(1, 10.0), rup(2, 30.0)];
        let b = vec![rup(3, 5.0), rup(4, 10.0), rup(5, 20.0)];
        let catalog = RuptureCatalog::merge(vec![a, b]);
        
        let ids: Vec<u64> = catalog.ruptures().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1, 4, 5, 2]);
    }
    
    #[test]
    fn test_from_json_flat_and_sources() {
        let flat = r#"[
            {"id": 7, "magnitude": 6.1, "hypocenter": {"lon": 1.0, "lat": 2.0}, "origin_time": 3.0},
            {"id": 8, "magnitude": 5.5, "hypocenter": {"lon": 1.0, "lat": 2.0, "depth": 8.0}}
        ]"#;
        let catalog = RuptureCatalog::from_json(flat).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(0).unwrap().id, 8);
        
        let sources = r#"{"sources": [
            [{"id": 1, "magnitude": 6.0, "hypocenter": {"lon": 0.0, "lat": 0.0}, "origin_time": 2.0}],
            [{"id": 2, "magnitude": 6.0, "hypocenter": {"lon": 0.0, "lat": 0.0}, "origin_time": 1.0}]
        ]}"#;
        let catalog = RuptureCatalog::from_json(sources).unwrap();
        assert_eq!(catalog.get(0).unwrap().id, 2);
    }
    
    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(RuptureCatalog::from_json("{\"nope\": 1}"), Err(SimError::Json(_))));
    }
    
    #[test]
    fn test_synthetic_catalog_is_reproducible_and_bounded() {
        let synthetic = SyntheticCatalog::default().with_ruptures(500);
        let a = synthetic.generate(&mut ChaCha8Rng::seed_from_u64(1)).unwrap();
        let b = synthetic.generate(&mut ChaCha8Rng::seed_from_u64(1)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 500);
        
        let mut last_time = 0.0;
        for r in a.ruptures() {
            assert!(r.magnitude >= synthetic.min_magnitude && r.magnitude <= synthetic.max_magnitude);
            assert!(r.origin_time >= last_time);
            assert!(r.hypocenter.lon >= -0.5 && r.hypocenter.lon <= 0.5);
            last_time = r.origin_time;
        }
    }
    
    #[test]
    fn test_gutenberg_richter_favours_small_events() {
        let synthetic = SyntheticCatalog::default();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let n = 20_000;
        let small = (0..n)
            .filter(|_| synthetic.sample_magnitude(&mut rng) < synthetic.min_magnitude + 1.0)
            .count();
        // b = 1: ~90% of events within one unit of the minimum
        let frac = small as f64 / n as f64;
        assert!((frac - 0.9).abs() < 0.02, "fraction {}", frac);
    }
    
    #[test]
    fn test_generate_rejects_bad_rate() {
        let synthetic = SyntheticCatalog {
            rate: 0.0,
            ..Default::default()
        };
        assert!(synthetic.generate(&mut ChaCha8Rng::seed_from_u64(1)).is_err());
    }
}
