//! Time-varying risk limits.
//!
//! The volatility index is the mean standard deviation across a trader's
//! assets, read off the current covariance matrix. A rolling mean of the
//! index over `window` observations is maintained the same way the
//! covariance tracker keeps its means: full pass once the window fills, then
//! a slide that adds the newest value and drops the oldest.

use crate::covariance::CovarianceMatrix;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How the dollar limit reacts to volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LimitPolicy {
    /// Always the base limit.
    #[default]
    Constant,
    /// base × rolling / current: tightens when volatility is above its history.
    Procyclical,
    /// base × current / rolling: loosens when volatility is above its history.
    Countercyclical,
}

/// Configured dollar limit for one risk measure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitSpec {
    pub base_limit: f64,
}

impl LimitSpec {
    pub fn new(base_limit: f64) -> Self {
        Self { base_limit }
    }

    pub fn is_valid(&self) -> bool {
        self.base_limit.is_finite() && self.base_limit >= 0.0
    }
}

/// Mean of sqrt(variance) over the diagonal. zero for an empty matrix.
pub fn volatility_index(matrix: &CovarianceMatrix) -> f64 {
    let n = matrix.dimension();
    if n == 0 {
        return 0.0;
    }
    matrix.variances().map(|v| v.max(0.0).sqrt()).sum::<f64>() / n as f64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityIndex {
    window: usize,
    values: VecDeque<f64>,
    rolling_mean: Option<f64>,
    current: Option<f64>,
}

impl VolatilityIndex {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            values: VecDeque::with_capacity(window.max(1) + 1),
            rolling_mean: None,
            current: None,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Latest index value.
    pub fn current(&self) -> Option<f64> {
        self.current
    }

    /// None until `window` values have been observed.
    pub fn rolling_mean(&self) -> Option<f64> {
        self.rolling_mean
    }

    pub fn is_ready(&self) -> bool {
        self.rolling_mean.is_some()
    }

    pub fn observe(&mut self, value: f64) {
        self.current = Some(value);
        self.values.push_back(value);

        let w = self.window as f64;
        if self.values.len() > self.window {
            let dropped = self.values.pop_front().unwrap_or(0.0);
            if let Some(mean) = self.rolling_mean.as_mut() {
                *mean += (value - dropped) / w;
            }
        } else if self.values.len() == self.window {
            self.rolling_mean = Some(self.values.iter().sum::<f64>() / w);
        }
    }

    /// Limit in force for `spec` under `policy` given the index so far.
    pub fn effective_limit(&self, spec: LimitSpec, policy: LimitPolicy) -> f64 {
        let base = spec.base_limit;
        let (Some(rolling), Some(current)) = (self.rolling_mean, self.current) else {
            return base;
        };
        match policy {
            LimitPolicy::Constant => base,
            LimitPolicy::Procyclical if current > 0.0 => base * rolling / current,
            LimitPolicy::Countercyclical if rolling > 0.0 => base * current / rolling,
            _ => base,
        }
    }
}
