// 3.0: exogenous number generators. price shocks and fundamental values both
// come through the same one-method trait so distributions can be swapped
// without touching the market maker. every random generator takes an
// explicit seed: same seed, same trajectory.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::fmt;

/// Yields one value per call. called once per asset per tick.
pub trait Generator: fmt::Debug + Send {
    fn next(&mut self) -> f64;
}

/// Always the same value. `ConstantGenerator(0.0)` is "no shock".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantGenerator(pub f64);

impl Generator for ConstantGenerator {
    fn next(&mut self) -> f64 {
        self.0
    }
}

// Normal::new only rejects non-finite values, negative sigma slips through
fn check_std_dev(std_dev: f64) -> Result<(), GeneratorError> {
    if std_dev.is_finite() && std_dev >= 0.0 {
        Ok(())
    } else {
        Err(GeneratorError::InvalidStdDev(std_dev))
    }
}

/// i.i.d. normal draws.
#[derive(Debug, Clone)]
pub struct GaussianGenerator {
    normal: Normal<f64>,
    rng: StdRng,
}

impl GaussianGenerator {
    pub fn new(mean: f64, std_dev: f64, seed: u64) -> Result<Self, GeneratorError> {
        check_std_dev(std_dev)?;
        let normal = Normal::new(mean, std_dev).map_err(|_| GeneratorError::InvalidStdDev(std_dev))?;
        Ok(Self {
            normal,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl Generator for GaussianGenerator {
    fn next(&mut self) -> f64 {
        self.normal.sample(&mut self.rng)
    }
}

/// Level process: each call adds a normal step to the previous level.
/// Used for fundamental values.
#[derive(Debug, Clone)]
pub struct RandomWalkGenerator {
    level: f64,
    floor: f64,
    step: Normal<f64>,
    rng: StdRng,
}

impl RandomWalkGenerator {
    pub fn new(start: f64, step_std_dev: f64, seed: u64) -> Result<Self, GeneratorError> {
        check_std_dev(step_std_dev)?;
        let step = Normal::new(0.0, step_std_dev)
            .map_err(|_| GeneratorError::InvalidStdDev(step_std_dev))?;
        Ok(Self {
            level: start,
            floor: f64::MIN_POSITIVE,
            step,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Keep the level at or above `floor`.
    pub fn with_floor(mut self, floor: f64) -> Self {
        self.floor = floor;
        self
    }

    pub fn level(&self) -> f64 {
        self.level
    }
}

impl Generator for RandomWalkGenerator {
    fn next(&mut self) -> f64 {
        self.level = (self.level + self.step.sample(&mut self.rng)).max(self.floor);
        self.level
    }
}

/// Replays a fixed script, then yields zeros. handy for tests and what-if runs.
#[derive(Debug, Clone, Default)]
pub struct SequenceGenerator {
    values: Vec<f64>,
    cursor: usize,
}

impl SequenceGenerator {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, cursor: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.values.len().saturating_sub(self.cursor)
    }
}

impl Generator for SequenceGenerator {
    fn next(&mut self) -> f64 {
        let value = self.values.get(self.cursor).copied().unwrap_or(0.0);
        self.cursor += 1;
        value
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeneratorError {
    #[error("Standard deviation {0} must be finite and non-negative")]
    InvalidStdDev(f64),
}
