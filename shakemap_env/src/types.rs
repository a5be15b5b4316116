//! Site and rupture descriptors.

use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};

use crate::error::EnvError;

/// Default Vs30 (m/s) for sites without a measured value (NEHRP B/C boundary).
pub const DEFAULT_VS30: f64 = 760.0;

/// A geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Longitude in degrees, [-180, 180]
    pub lon: f64,
    
    /// Latitude in degrees, [-90, 90]
    pub lat: f64,
    
    /// Depth below the surface in km (positive down)
    #[serde(default)]
    pub depth: f64,
}

impl Location {
    /// Creates a surface location.
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat, depth: 0.0 }
    }
    
    /// Creates a location with depth.
    pub fn with_depth(lon: f64, lat: f64, depth: f64) -> Self {
        Self { lon, lat, depth }
    }
    
    /// Creates a surface location, rejecting out-of-range coordinates.
    pub fn try_new(lon: f64, lat: f64) -> Result<Self, EnvError> {
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(EnvError::location(format!("longitude {} out of range", lon)));
        }
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(EnvError::location(format!("latitude {} out of range", lat)));
        }
        Ok(Self::new(lon, lat))
    }
    
    /// Great-circle surface distance to `other` in km, ignoring depth.
    pub fn horizontal_distance_km(&self, other: &Location) -> f64 {
        let a = Point::new(self.lon, self.lat);
        let b = Point::new(other.lon, other.lat);
        a.haversine_distance(&b) / 1000.0
    }
    
    /// Hypocentral-style distance in km (surface distance combined with depth difference).
    pub fn distance_km(&self, other: &Location) -> f64 {
        let h = self.horizontal_distance_km(other);
        let v = self.depth - other.depth;
        (h * h + v * v).sqrt()
    }
}

/// A site where ground motion is evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Surface location
    pub location: Location,
    
    /// Time-averaged shear-wave velocity of the top 30 m (m/s)
    #[serde(default = "default_vs30")]
    pub vs30: f64,
    
    /// Depth to the 2.5 km/s shear-wave horizon (km), if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_2_5: Option<f64>,
}

fn default_vs30() -> f64 {
    DEFAULT_VS30
}

impl Site {
    /// Creates a site with default site parameters.
    pub fn new(location: Location) -> Self {
        Self {
            location,
            vs30: DEFAULT_VS30,
            depth_2_5: None,
        }
    }
    
    /// Sets Vs30.
    pub fn with_vs30(mut self, vs30: f64) -> Self {
        self.vs30 = vs30;
        self
    }
    
    /// Builds a regular lon/lat grid of sites, row by row from `lat_min`.
    ///
    /// Bounds are inclusive; `spacing` is in degrees.
    pub fn grid(
        lon_min: f64,
        lon_max: f64,
        lat_min: f64,
        lat_max: f64,
        spacing: f64,
    ) -> Result<Vec<Site>, EnvError> {
        if !(spacing > 0.0) || lon_max < lon_min || lat_max < lat_min {
            return Err(EnvError::location(format!(
                "bad grid: lon [{}, {}], lat [{}, {}], spacing {}",
                lon_min, lon_max, lat_min, lat_max, spacing
            )));
        }
        
        let n_lon = grid_steps(lon_max - lon_min, spacing) + 1;
        let n_lat = grid_steps(lat_max - lat_min, spacing) + 1;
        
        let mut sites = Vec::with_capacity(n_lon * n_lat);
        for j in 0..n_lat {
            for i in 0..n_lon {
                // Clamp the last node against round-off past the bound
                let loc = Location::try_new(
                    (lon_min + i as f64 * spacing).min(lon_max),
                    (lat_min + j as f64 * spacing).min(lat_max),
                )?;
                sites.push(Site::new(loc));
            }
        }
        Ok(sites)
    }
}

/// Whole steps of `spacing` that fit in `span`, tolerating round-off.
fn grid_steps(span: f64, spacing: f64) -> usize {
    (span / spacing + 1e-9).floor() as usize
}

/// An earthquake rupture, as supplied by a rupture forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rupture {
    /// Identifier within the source catalog
    pub id: u64,
    
    /// Moment magnitude
    pub magnitude: f64,
    
    /// Rake angle in degrees (-180, 180]
    #[serde(default)]
    pub rake: f64,
    
    /// Hypocenter
    pub hypocenter: Location,
    
    /// Origin time in seconds since catalog start
    #[serde(default)]
    pub origin_time: f64,
}

impl Rupture {
    /// Creates a rupture at t=0 with pure strike-slip rake.
    pub fn new(id: u64, magnitude: f64, hypocenter: Location) -> Self {
        Self {
            id,
            magnitude,
            rake: 0.0,
            hypocenter,
            origin_time: 0.0,
        }
    }
    
    /// Sets the origin time.
    pub fn at_time(mut self, origin_time: f64) -> Self {
        self.origin_time = origin_time;
        self
    }
    
    /// Checks that the descriptor is usable by a ground-motion model.
    pub fn validate(&self) -> Result<(), EnvError> {
        if !self.magnitude.is_finite() {
            return Err(EnvError::rupture(format!(
                "rupture {} has non-finite magnitude {}",
                self.id, self.magnitude
            )));
        }
        if !self.hypocenter.lon.is_finite() || !self.hypocenter.lat.is_finite() {
            return Err(EnvError::rupture(format!(
                "rupture {} has non-finite hypocenter",
                self.id
            )));
        }
        Ok(())
    }
}
