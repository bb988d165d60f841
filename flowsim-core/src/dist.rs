//! Sampling interfaces for arrival intervals, packet sizes, propagation
//! delays, loss probabilities and monitor intervals.
//!
//! Every component that needs a random quantity holds a boxed
//! [`Distribution`]. All samples draw from the single [`SimRng`] owned by
//! the [`Simulation`], so a run is fully reproducible from its seed.
//!
//! [`Simulation`]: crate::simulation::Simulation

use rand_chacha::ChaChaRng;
use rand_core::{Rng as _, SeedableRng as _};
use rand_distr::{Distribution as _, Exp, Normal, StandardUniform};
use thiserror::Error;

/// The random number generator shared by every component of a simulation.
///
/// This is a thin wrapper around a seeded [`ChaChaRng`]. Any
/// [`rand_distr`] distribution can be sampled from it with
/// [`draw`](SimRng::draw).
#[derive(Debug, Clone)]
pub struct SimRng(ChaChaRng);

impl SimRng {
    pub fn seed_from_u64(seed: u64) -> Self {
        Self(ChaChaRng::seed_from_u64(seed))
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.0.next_u64()
    }

    /// a uniform draw in `[0, 1)`
    #[inline]
    pub fn uniform(&mut self) -> f64 {
        self.draw(&StandardUniform)
    }

    /// one sample of `distr`
    ///
    /// ```
    /// # use flowsim_core::dist::SimRng;
    /// let mut rng = SimRng::seed_from_u64(0);
    /// let x = rng.draw(&rand_distr::Exp1);
    /// assert!(x >= 0.0);
    /// ```
    #[inline]
    pub fn draw<D>(&mut self, distr: &D) -> f64
    where
        D: rand_distr::Distribution<f64>,
    {
        distr.sample(&mut self.0)
    }
}

/// Produce one sample.
///
/// `packet_id` is the sequence id of the packet the sample is drawn for,
/// when there is one. A [`Channel`] passes it to its loss distribution so
/// loss curves can depend on the packet (for example: drop every tenth
/// packet). All other samplers receive `None`.
///
/// Closures with the signature `FnMut(&mut SimRng, Option<u64>) -> f64` are
/// distributions:
///
/// ```
/// # use flowsim_core::dist::{Distribution, SimRng};
/// let mut every_tenth = |_: &mut SimRng, id: Option<u64>| {
///     if id.unwrap_or(0) % 10 == 0 { 1.0 } else { 0.0 }
/// };
/// let mut rng = SimRng::seed_from_u64(0);
/// assert_eq!(every_tenth.sample(&mut rng, Some(20)), 1.0);
/// assert_eq!(every_tenth.sample(&mut rng, Some(21)), 0.0);
/// ```
///
/// [`Channel`]: crate::channel::Channel
pub trait Distribution {
    fn sample(&mut self, rng: &mut SimRng, packet_id: Option<u64>) -> f64;

    /// the value every sample takes, when known without sampling
    fn fixed_value(&self) -> Option<f64> {
        None
    }
}

impl<F> Distribution for F
where
    F: FnMut(&mut SimRng, Option<u64>) -> f64,
{
    fn sample(&mut self, rng: &mut SimRng, packet_id: Option<u64>) -> f64 {
        self(rng, packet_id)
    }
}

/// Error returned when constructing a distribution with invalid parameters.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum DistributionError {
    #[error("value must be finite, got {0}")]
    NotFinite(f64),
    #[error("exponential rate must be strictly positive, got {0}")]
    NonPositiveRate(f64),
    #[error("standard deviation must not be negative, got {0}")]
    NegativeStdDev(f64),
    #[error("uniform bounds are reversed: [{low}, {high})")]
    ReversedBounds { low: f64, high: f64 },
}

fn finite(value: f64) -> Result<f64, DistributionError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DistributionError::NotFinite(value))
    }
}

/// Always the same value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Constant(f64);

impl Constant {
    pub fn new(value: f64) -> Result<Self, DistributionError> {
        finite(value).map(Self)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Distribution for Constant {
    fn sample(&mut self, _: &mut SimRng, _: Option<u64>) -> f64 {
        self.0
    }

    fn fixed_value(&self) -> Option<f64> {
        Some(self.0)
    }
}

/// Exponential distribution of the given rate, i.e. Poisson arrivals when
/// used as an arrival interval.
#[derive(Debug, Clone)]
pub struct Exponential {
    rate: f64,
    inner: Exp<f64>,
}

impl Exponential {
    pub fn new(rate: f64) -> Result<Self, DistributionError> {
        let rate = finite(rate)?;
        if rate <= 0.0 {
            return Err(DistributionError::NonPositiveRate(rate));
        }
        let inner = Exp::new(rate).map_err(|_| DistributionError::NonPositiveRate(rate))?;
        Ok(Self { rate, inner })
    }

    /// exponential distribution with the given mean (`1 / rate`)
    pub fn with_mean(mean: f64) -> Result<Self, DistributionError> {
        Self::new(1.0 / finite(mean)?)
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl PartialEq for Exponential {
    fn eq(&self, other: &Self) -> bool {
        self.rate == other.rate
    }
}

impl Distribution for Exponential {
    fn sample(&mut self, rng: &mut SimRng, _: Option<u64>) -> f64 {
        rng.draw(&self.inner)
    }
}

/// Normal distribution.
///
/// Samples are not truncated. When used as a delay, a negative sample
/// behaves like a zero delay.
#[derive(Debug, Clone)]
pub struct Gaussian {
    mean: f64,
    std_dev: f64,
    inner: Normal<f64>,
}

impl Gaussian {
    pub fn new(mean: f64, std_dev: f64) -> Result<Self, DistributionError> {
        let mean = finite(mean)?;
        let std_dev = finite(std_dev)?;
        if std_dev < 0.0 {
            return Err(DistributionError::NegativeStdDev(std_dev));
        }
        let inner =
            Normal::new(mean, std_dev).map_err(|_| DistributionError::NegativeStdDev(std_dev))?;
        Ok(Self {
            mean,
            std_dev,
            inner,
        })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }
}

impl PartialEq for Gaussian {
    fn eq(&self, other: &Self) -> bool {
        self.mean == other.mean && self.std_dev == other.std_dev
    }
}

impl Distribution for Gaussian {
    fn sample(&mut self, rng: &mut SimRng, _: Option<u64>) -> f64 {
        rng.draw(&self.inner)
    }
}

/// Uniform distribution over `[low, high)`.
#[derive(Debug, Clone)]
pub struct Uniform {
    low: f64,
    high: f64,
    inner: rand_distr::Uniform<f64>,
}

impl Uniform {
    /// `low == high` degenerates to a constant
    pub fn new(low: f64, high: f64) -> Result<Self, DistributionError> {
        let low = finite(low)?;
        let high = finite(high)?;
        let inner = if low < high {
            rand_distr::Uniform::new(low, high)
        } else {
            rand_distr::Uniform::new_inclusive(low, high)
        }
        .map_err(|_| DistributionError::ReversedBounds { low, high })?;
        Ok(Self { low, high, inner })
    }
}

impl PartialEq for Uniform {
    fn eq(&self, other: &Self) -> bool {
        self.low == other.low && self.high == other.high
    }
}

impl Distribution for Uniform {
    fn sample(&mut self, rng: &mut SimRng, _: Option<u64>) -> f64 {
        rng.draw(&self.inner)
    }
}
