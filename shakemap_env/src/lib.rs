//! ShakeMap Environment Layer
//!
//! This crate holds the descriptors and capabilities that the shake-map
//! core *consumes* but never computes itself:
//! - **Sites**: where ground motion is evaluated (location + site parameters)
//! - **Ruptures**: earthquake events supplied by a rupture forecast
//! - **Ground-motion models**: the attenuation relationship, seen only
//!   through the [`GroundMotionModel`] trait
//!
//! Keeping these behind a small trait boundary lets the core run against
//! any attenuation relationship (or a test double) without knowing its math.
//!
//! # Example
//!
//! ```ignore
//! use shakemap_env::{GroundMotionModel, Rupture, Site, StdDevType};
//!
//! fn median_at<M: GroundMotionModel>(model: &mut M, rup: &Rupture, site: &Site) -> f64 {
//!     model.set_rupture(rup);
//!     model.set_site(site);
//!     model.mean().exp()
//! }
//! ```

mod model;
mod types;
mod error;

pub use model::{GroundMotionModel, StdDevType, TruncationType};
pub use types::{Location, Rupture, Site};
pub use error::EnvError;
