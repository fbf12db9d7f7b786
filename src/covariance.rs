//! Rolling mean / covariance of log-returns with a stressed-regime ratchet.
//!
//! The tracker follows a fixed window of `W` returns across every asset a
//! trader is active in. It stays inert until `W` returns exist, then computes
//! the full window once (cold start) and afterwards slides it in O(n²) per
//! tick by adding the newest return and removing the one that leaves the
//! window. The tick-0 return is a definition, not an observation, so the
//! first cold start happens at tick `W`.
//!
//! The stressed matrix is a copy of the current matrix taken whenever the
//! regime intensity (mean variance across assets) beats every earlier value.

use crate::market::{Market, MarketError};
use crate::stats::{self, StatsError};
use crate::types::{AssetId, Tick};
use serde::{Deserialize, Serialize};

/// Dense symmetric matrix keyed by asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovarianceMatrix {
    assets: Vec<AssetId>,
    values: Vec<f64>,
}

impl CovarianceMatrix {
    pub fn zeros(assets: Vec<AssetId>) -> Self {
        let n = assets.len();
        Self {
            assets,
            values: vec![0.0; n * n],
        }
    }

    pub fn assets(&self) -> &[AssetId] {
        &self.assets
    }

    pub fn dimension(&self) -> usize {
        self.assets.len()
    }

    pub fn index_of(&self, asset: &AssetId) -> Option<usize> {
        self.assets.iter().position(|a| a == asset)
    }

    pub fn at(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.dimension() + j]
    }

    /// Writes both (i, j) and (j, i).
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        let n = self.dimension();
        self.values[i * n + j] = value;
        self.values[j * n + i] = value;
    }

    pub fn get(&self, a: &AssetId, b: &AssetId) -> Option<f64> {
        Some(self.at(self.index_of(a)?, self.index_of(b)?))
    }

    pub fn variances(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.dimension()).map(move |i| self.at(i, i))
    }

    /// Mean of the diagonal. zero for an empty matrix.
    pub fn regime_intensity(&self) -> f64 {
        let n = self.dimension();
        if n == 0 {
            return 0.0;
        }
        self.variances().sum::<f64>() / n as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateMode {
    /// Fewer than `W` returns so far.
    Inert,
    /// Full-window computation.
    ColdStart,
    /// Sliding-window step from the previous tick.
    Incremental,
    /// Already updated for this tick.
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub mode: UpdateMode,
    pub stress_updated: bool,
    pub regime_intensity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CovarianceTracker {
    window: usize,
    means: Vec<f64>,
    current: CovarianceMatrix,
    stressed: CovarianceMatrix,
    max_intensity: Option<f64>,
    last_update: Option<Tick>,
}

impl CovarianceTracker {
    pub fn new(assets: Vec<AssetId>, window: usize) -> Result<Self, CovarianceError> {
        if window < 2 {
            return Err(CovarianceError::InvalidWindow(window));
        }
        Ok(Self {
            window,
            means: vec![0.0; assets.len()],
            current: CovarianceMatrix::zeros(assets.clone()),
            stressed: CovarianceMatrix::zeros(assets),
            max_intensity: None,
            last_update: None,
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn assets(&self) -> &[AssetId] {
        self.current.assets()
    }

    /// True once the first full window has been processed.
    pub fn is_ready(&self) -> bool {
        self.last_update.is_some()
    }

    pub fn last_update(&self) -> Option<Tick> {
        self.last_update
    }

    pub fn current(&self) -> &CovarianceMatrix {
        &self.current
    }

    pub fn stressed(&self) -> &CovarianceMatrix {
        &self.stressed
    }

    pub fn mean(&self, asset: &AssetId) -> Option<f64> {
        let i = self.current.index_of(asset)?;
        self.is_ready().then(|| self.means[i])
    }

    pub fn covariance(&self, a: &AssetId, b: &AssetId) -> Option<f64> {
        if !self.is_ready() {
            return None;
        }
        self.current.get(a, b)
    }

    pub fn stressed_intensity(&self) -> Option<f64> {
        self.max_intensity
    }

    /// Recompute statistics for `tick` from the market's return series.
    pub fn update(&mut self, tick: Tick, market: &Market) -> Result<UpdateOutcome, CovarianceError> {
        if self.last_update == Some(tick) {
            return Ok(self.outcome(UpdateMode::Unchanged, false));
        }

        let observations = tick.value() as usize;
        if observations < self.window {
            return Ok(self.outcome(UpdateMode::Inert, false));
        }

        let mode = if observations > self.window && self.last_update == tick.prev() {
            self.slide(tick, market)?;
            UpdateMode::Incremental
        } else {
            self.recompute(tick, market)?;
            UpdateMode::ColdStart
        };
        self.last_update = Some(tick);

        let stress_updated = self.ratchet_stress();
        Ok(self.outcome(mode, stress_updated))
    }

    fn outcome(&self, mode: UpdateMode, stress_updated: bool) -> UpdateOutcome {
        UpdateOutcome {
            mode,
            stress_updated,
            regime_intensity: self.current.regime_intensity(),
        }
    }

    // full pass over ticks (tick - W, tick]
    fn recompute(&mut self, tick: Tick, market: &Market) -> Result<(), CovarianceError> {
        let from = Tick(tick.value() + 1 - self.window as u64);
        let windows = self
            .assets()
            .iter()
            .map(|asset| Ok(market.asset(asset)?.log_returns.range(from, tick)?.to_vec()))
            .collect::<Result<Vec<Vec<f64>>, MarketError>>()?;

        let n = windows.len();
        for i in 0..n {
            self.means[i] = stats::mean(&windows[i]).unwrap_or(0.0);
            for j in i..n {
                let cov = stats::sample_covariance(&windows[i], &windows[j])?;
                self.current.set(i, j, cov);
            }
        }
        Ok(())
    }

    // Cov_t = Cov_{t-1} + k * (m_{t-1,a} m_{t-1,b} - m_{t,a} m_{t,b} + (r_a r_b - d_a d_b) / W)
    // with k = W / (W - 1) so the slide stays on the sample (n - 1) normalization
    fn slide(&mut self, tick: Tick, market: &Market) -> Result<(), CovarianceError> {
        let dropped_tick = Tick(tick.value() - self.window as u64);
        let mut newest = Vec::with_capacity(self.means.len());
        let mut dropped = Vec::with_capacity(self.means.len());
        for asset in self.assets() {
            newest.push(market.log_return(asset, tick)?);
            dropped.push(market.log_return(asset, dropped_tick)?);
        }

        let w = self.window as f64;
        let k = w / (w - 1.0);
        let old_means = self.means.clone();
        for i in 0..self.means.len() {
            self.means[i] = old_means[i] + (newest[i] - dropped[i]) / w;
        }

        let n = self.means.len();
        for i in 0..n {
            for j in i..n {
                let delta = old_means[i] * old_means[j] - self.means[i] * self.means[j]
                    + (newest[i] * newest[j] - dropped[i] * dropped[j]) / w;
                let updated = self.current.at(i, j) + k * delta;
                self.current.set(i, j, updated);
            }
        }
        Ok(())
    }

    fn ratchet_stress(&mut self) -> bool {
        let intensity = self.current.regime_intensity();
        let exceeds = match self.max_intensity {
            Some(max) => intensity > max,
            None => true,
        };
        if exceeds {
            self.max_intensity = Some(intensity);
            self.stressed = self.current.clone();
        }
        exceeds
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CovarianceError {
    #[error("Rolling window must be at least 2, got {0}")]
    InvalidWindow(usize),

    #[error("Market error: {0}")]
    Market(#[from] MarketError),

    #[error("Statistics error: {0}")]
    Stats(#[from] StatsError),
}
