//! Parametric-normal VaR and ES over gross dollar exposure.
//!
//! value      = Σ |position_i| · price_i
//! w_i        = |position_i| · price_i / value
//! variance   = Σ_i Σ_j w_i w_j Cov(i, j)
//! VaR(c)     = sqrt(variance) · z(c) · value
//! ES(c)      = value · sqrt(variance) · φ(z(c)) / (1 - c)
//!
//! Both measures are homogeneous of degree one in the positions: scaling
//! every position by k scales VaR and ES by k. The rebalance relies on that.

use crate::covariance::CovarianceMatrix;
use crate::stats::{normal_pdf, normal_quantile};
use crate::types::{AssetId, Price, Quantity};
use serde::{Deserialize, Serialize};

/// Absolute dollar exposure per asset, aligned with a covariance matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exposure {
    dollars: Vec<f64>,
}

impl Exposure {
    pub fn new(dollars: Vec<f64>) -> Self {
        Self { dollars }
    }

    /// Build from positions and prices, in the asset order of `matrix`.
    /// assets with no position or no price count as zero exposure.
    pub fn from_positions<P, Q>(matrix: &CovarianceMatrix, mut position: P, mut price: Q) -> Self
    where
        P: FnMut(&AssetId) -> Quantity,
        Q: FnMut(&AssetId) -> Option<Price>,
    {
        let dollars = matrix
            .assets()
            .iter()
            .map(|asset| match price(asset) {
                Some(p) => position(asset).to_f64().abs() * p.value(),
                None => 0.0,
            })
            .collect();
        Self { dollars }
    }

    /// Gross portfolio value.
    pub fn gross_value(&self) -> f64 {
        self.dollars.iter().sum()
    }

    pub fn dollars(&self) -> &[f64] {
        &self.dollars
    }

    /// Dollar weights, empty when the gross value is zero.
    pub fn weights(&self) -> Vec<f64> {
        let value = self.gross_value();
        if value <= 0.0 {
            return Vec::new();
        }
        self.dollars.iter().map(|d| d / value).collect()
    }
}

/// Σ w_i w_j Cov(i, j). zero exposure means zero variance, no division.
pub fn portfolio_variance(exposure: &Exposure, matrix: &CovarianceMatrix) -> f64 {
    let weights = exposure.weights();
    if weights.is_empty() {
        return 0.0;
    }
    let n = weights.len().min(matrix.dimension());
    let mut variance = 0.0;
    for i in 0..n {
        if weights[i] == 0.0 {
            continue;
        }
        for j in 0..n {
            variance += weights[i] * weights[j] * matrix.at(i, j);
        }
    }
    // rounding can leave a tiny negative value on a near-singular matrix
    variance.max(0.0)
}

pub fn value_at_risk(exposure: &Exposure, matrix: &CovarianceMatrix, confidence: f64) -> f64 {
    let value = exposure.gross_value();
    if value <= 0.0 {
        return 0.0;
    }
    portfolio_variance(exposure, matrix).sqrt() * normal_quantile(confidence) * value
}

pub fn expected_shortfall(exposure: &Exposure, matrix: &CovarianceMatrix, confidence: f64) -> f64 {
    let value = exposure.gross_value();
    if value <= 0.0 {
        return 0.0;
    }
    let z = normal_quantile(confidence);
    value * portfolio_variance(exposure, matrix).sqrt() * normal_pdf(z) / (1.0 - confidence)
}

/// VaR total: normal plus stressed.
pub fn total_var(post_trade: f64, stressed: f64) -> f64 {
    post_trade + stressed
}

/// ES total with a stress multiplier: post · max(1, stressed / post).
/// falls back to the stressed figure when the post-trade ES is zero.
pub fn total_es(post_trade: f64, stressed: f64) -> f64 {
    if post_trade == 0.0 {
        return stressed;
    }
    post_trade * (stressed / post_trade).max(1.0)
}
