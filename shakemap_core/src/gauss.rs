//! Standard-normal sampling.
//!
//! Every stochastic step in the core draws through [`GaussianSource`], so a
//! seeded generator (or a scripted stub in tests) fully determines a run.

use nalgebra::DVector;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shakemap_env::{GroundMotionModel, TruncationType};
use std::f64::consts::TAU;

use crate::error::{Result, ShakeMapError};

/// A stream of standard-normal deviates.
pub trait GaussianSource {
    /// Returns the next N(0, 1) deviate.
    fn next_gaussian(&mut self) -> f64;
}

impl<S: GaussianSource + ?Sized> GaussianSource for &mut S {
    fn next_gaussian(&mut self) -> f64 {
        (**self).next_gaussian()
    }
}

/// Box–Muller transform over any uniform RNG.
///
/// Each pair of uniforms yields two independent deviates; the second is
/// cached and returned by the following call.
#[derive(Debug, Clone)]
pub struct BoxMuller<R> {
    rng: R,
    spare: Option<f64>,
}

impl<R: RngCore> BoxMuller<R> {
    /// Wraps a uniform RNG.
    pub fn new(rng: R) -> Self {
        Self { rng, spare: None }
    }
    
    /// Returns the underlying RNG.
    pub fn into_inner(self) -> R {
        self.rng
    }
}

impl BoxMuller<ChaCha8Rng> {
    /// Creates a generator backed by a seeded ChaCha8 stream.
    pub fn seeded(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: RngCore> GaussianSource for BoxMuller<R> {
    fn next_gaussian(&mut self) -> f64 {
        if let Some(z) = self.spare.take() {
            return z;
        }
        
        // u1 in (0, 1] keeps ln(u1) finite
        let u1 = 1.0 - self.rng.gen::<f64>();
        let u2 = self.rng.gen::<f64>();
        let radius = (-2.0 * u1.ln()).sqrt();
        let theta = TAU * u2;
        
        self.spare = Some(radius * theta.sin());
        radius * theta.cos()
    }
}

/// Truncation policy for sampled deviates, in units of standard deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Truncation {
    /// No truncation
    None,
    
    /// Resample while |z| > level
    TwoSided(f64),
    
    /// Resample while z > level
    OneSided(f64),
}

impl Truncation {
    /// Builds a truncation policy, rejecting non-positive levels.
    pub fn new(kind: TruncationType, level: f64) -> Result<Self> {
        if kind != TruncationType::None && !(level.is_finite() && level > 0.0) {
            return Err(ShakeMapError::invalid(format!(
                "truncation level must be positive and finite, got {}",
                level
            )));
        }
        Ok(match kind {
            TruncationType::None => Truncation::None,
            TruncationType::TwoSided => Truncation::TwoSided(level),
            TruncationType::OneSided => Truncation::OneSided(level),
        })
    }
    
    /// Reads the truncation configuration from a ground-motion model.
    pub fn from_model<M: GroundMotionModel + ?Sized>(model: &M) -> Result<Self> {
        Self::new(model.truncation_type(), model.truncation_level())
    }
    
    /// Draws one deviate honoring the truncation.
    pub fn sample<S: GaussianSource + ?Sized>(&self, source: &mut S) -> f64 {
        let mut z = source.next_gaussian();
        match *self {
            Truncation::None => {}
            Truncation::TwoSided(level) => {
                while z.abs() > level {
                    z = source.next_gaussian();
                }
            }
            Truncation::OneSided(level) => {
                while z > level {
                    z = source.next_gaussian();
                }
            }
        }
        z
    }
}

/// Draws `n` i.i.d. standard-normal deviates.
pub fn gaussian_vector<S: GaussianSource + ?Sized>(source: &mut S, n: usize) -> DVector<f64> {
    DVector::from_fn(n, |_, _| source.next_gaussian())
}
