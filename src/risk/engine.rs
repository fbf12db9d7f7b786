//! Per-trader risk engine.
//!
//! Owns the covariance tracker and the volatility index, turns positions
//! into VaR/ES figures and, when a total measure breaches its limit, scales
//! every position toward zero by `limit / total`. Corrective orders go
//! straight into the portfolio so the rest of the tick sees the reduced book.

use super::limit::{volatility_index, LimitPolicy, LimitSpec, VolatilityIndex};
use super::measures::{expected_shortfall, total_es, total_var, value_at_risk, Exposure};
use crate::covariance::{CovarianceError, CovarianceMatrix, CovarianceTracker, UpdateMode, UpdateOutcome};
use crate::market::{Market, MarketError};
use crate::order::Order;
use crate::portfolio::{Portfolio, PortfolioError};
use crate::series::{SeriesError, TimeSeries};
use crate::types::{AssetId, Quantity, Tick};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskMeasure {
    Var,
    Es,
}

impl fmt::Display for RiskMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskMeasure::Var => f.write_str("VaR"),
            RiskMeasure::Es => f.write_str("ES"),
        }
    }
}

/// Which measures a trader tracks and limits. `None` disables the measure.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskCapabilities {
    pub var: Option<LimitSpec>,
    pub es: Option<LimitSpec>,
}

impl RiskCapabilities {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn var(limit: f64) -> Self {
        Self {
            var: Some(LimitSpec::new(limit)),
            es: None,
        }
    }

    pub fn es(limit: f64) -> Self {
        Self {
            var: None,
            es: Some(LimitSpec::new(limit)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.var.is_some() || self.es.is_some()
    }

    pub fn limit(&self, measure: RiskMeasure) -> Option<LimitSpec> {
        match measure {
            RiskMeasure::Var => self.var,
            RiskMeasure::Es => self.es,
        }
    }

    /// Enabled measures in enforcement order.
    pub fn measures(&self) -> impl Iterator<Item = RiskMeasure> + '_ {
        [RiskMeasure::Var, RiskMeasure::Es]
            .into_iter()
            .filter(|m| self.limit(*m).is_some())
    }
}

/// One measure at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasureFigures {
    pub pre_trade: f64,
    pub post_trade: f64,
    pub stressed: f64,
    pub total: f64,
    pub limit: f64,
}

impl MeasureFigures {
    pub fn is_breached(&self) -> bool {
        self.total > self.limit && self.total > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitBreach {
    pub measure: RiskMeasure,
    pub total: f64,
    pub limit: f64,
    pub reduction_ratio: f64,
    pub orders: Vec<Order>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub tick: Tick,
    pub var: Option<MeasureFigures>,
    pub es: Option<MeasureFigures>,
    pub volatility_index: Option<f64>,
    /// True when a limit forced the book down this tick.
    pub rebalanced: bool,
}

/// Result of enforcing limits for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub snapshot: RiskSnapshot,
    pub breaches: Vec<LimitBreach>,
}

impl RiskAssessment {
    pub fn corrective_orders(&self) -> impl Iterator<Item = &Order> {
        self.breaches.iter().flat_map(|b| b.orders.iter())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEngine {
    tracker: CovarianceTracker,
    capabilities: RiskCapabilities,
    policy: LimitPolicy,
    vol_index: VolatilityIndex,
    history: TimeSeries<RiskSnapshot>,
}

impl RiskEngine {
    pub fn new(
        assets: Vec<AssetId>,
        window: usize,
        capabilities: RiskCapabilities,
        policy: LimitPolicy,
        vol_index_window: usize,
    ) -> Result<Self, RiskError> {
        for measure in capabilities.measures() {
            if let Some(spec) = capabilities.limit(measure) {
                if !spec.is_valid() {
                    return Err(RiskError::InvalidLimit {
                        measure,
                        limit: spec.base_limit,
                    });
                }
            }
        }
        Ok(Self {
            tracker: CovarianceTracker::new(assets, window)?,
            capabilities,
            policy,
            vol_index: VolatilityIndex::new(vol_index_window),
            history: TimeSeries::new(),
        })
    }

    pub fn tracker(&self) -> &CovarianceTracker {
        &self.tracker
    }

    pub fn capabilities(&self) -> RiskCapabilities {
        self.capabilities
    }

    pub fn policy(&self) -> LimitPolicy {
        self.policy
    }

    pub fn volatility(&self) -> &VolatilityIndex {
        &self.vol_index
    }

    pub fn history(&self) -> &TimeSeries<RiskSnapshot> {
        &self.history
    }

    /// Roll the covariance window and the volatility index forward to `tick`.
    pub fn update_statistics(&mut self, tick: Tick, market: &Market) -> Result<UpdateOutcome, RiskError> {
        let outcome = self.tracker.update(tick, market)?;
        if matches!(outcome.mode, UpdateMode::ColdStart | UpdateMode::Incremental) {
            self.vol_index.observe(volatility_index(self.tracker.current()));
        }
        Ok(outcome)
    }

    pub fn effective_limit(&self, measure: RiskMeasure) -> Option<f64> {
        let spec = self.capabilities.limit(measure)?;
        Some(self.vol_index.effective_limit(spec, self.policy))
    }

    fn exposure<F>(&self, market: &Market, tick: Tick, position: F) -> Exposure
    where
        F: FnMut(&AssetId) -> Quantity,
    {
        Exposure::from_positions(self.tracker.current(), position, |asset| market.price(asset, tick).ok())
    }

    fn evaluate(&self, measure: RiskMeasure, exposure: &Exposure, matrix: &CovarianceMatrix, market: &Market) -> f64 {
        if !self.tracker.is_ready() {
            return 0.0;
        }
        let confidence = market.confidence();
        match measure {
            RiskMeasure::Var => value_at_risk(exposure, matrix, confidence.var),
            RiskMeasure::Es => expected_shortfall(exposure, matrix, confidence.es),
        }
    }

    /// Risk of the book carried into `tick`, valued at `tick` prices.
    pub fn pre_trade(&self, measure: RiskMeasure, portfolio: &Portfolio, market: &Market, tick: Tick) -> f64 {
        let exposure = self.exposure(market, tick, |a| portfolio.prior_position(a));
        self.evaluate(measure, &exposure, self.tracker.current(), market)
    }

    pub fn post_trade(&self, measure: RiskMeasure, portfolio: &Portfolio, market: &Market, tick: Tick) -> f64 {
        let exposure = self.exposure(market, tick, |a| portfolio.position(a));
        self.evaluate(measure, &exposure, self.tracker.current(), market)
    }

    pub fn stressed(&self, measure: RiskMeasure, portfolio: &Portfolio, market: &Market, tick: Tick) -> f64 {
        let exposure = self.exposure(market, tick, |a| portfolio.position(a));
        self.evaluate(measure, &exposure, self.tracker.stressed(), market)
    }

    pub fn figures(&self, measure: RiskMeasure, portfolio: &Portfolio, market: &Market, tick: Tick) -> MeasureFigures {
        let post_trade = self.post_trade(measure, portfolio, market, tick);
        let stressed = self.stressed(measure, portfolio, market, tick);
        let total = match measure {
            RiskMeasure::Var => total_var(post_trade, stressed),
            RiskMeasure::Es => total_es(post_trade, stressed),
        };
        MeasureFigures {
            pre_trade: self.pre_trade(measure, portfolio, market, tick),
            post_trade,
            stressed,
            total,
            limit: self.effective_limit(measure).unwrap_or(f64::INFINITY),
        }
    }

    /// Check each enabled measure against its limit, VaR first, and shrink
    /// the portfolio in place when a limit is exceeded. The snapshot is
    /// appended to the engine's history.
    pub fn enforce(&mut self, tick: Tick, market: &Market, portfolio: &mut Portfolio) -> Result<RiskAssessment, RiskError> {
        let mut snapshot = RiskSnapshot {
            tick,
            var: None,
            es: None,
            volatility_index: self.vol_index.current(),
            rebalanced: false,
        };
        let mut breaches = Vec::new();

        let measures: Vec<RiskMeasure> = self.capabilities.measures().collect();
        for measure in measures {
            let figures = self.figures(measure, portfolio, market, tick);
            match measure {
                RiskMeasure::Var => snapshot.var = Some(figures),
                RiskMeasure::Es => snapshot.es = Some(figures),
            }
            if !figures.is_breached() {
                continue;
            }

            let ratio = figures.limit / figures.total;
            let orders = rebalance_orders(portfolio, ratio)?;
            for order in &orders {
                portfolio.apply(order)?;
            }
            tracing::info!(
                %tick,
                %measure,
                total = figures.total,
                limit = figures.limit,
                ratio,
                orders = orders.len(),
                "risk limit breached, rebalancing"
            );
            breaches.push(LimitBreach {
                measure,
                total: figures.total,
                limit: figures.limit,
                reduction_ratio: ratio,
                orders,
            });
        }

        snapshot.rebalanced = !breaches.is_empty();
        self.history.append(tick, snapshot.clone())?;
        Ok(RiskAssessment { snapshot, breaches })
    }
}

/// Orders that take every position to `ratio × position`.
pub fn rebalance_orders(portfolio: &Portfolio, ratio: f64) -> Result<Vec<Order>, RiskError> {
    let factor = Decimal::from_f64(ratio)
        .filter(|_| ratio.is_finite() && ratio >= 0.0)
        .ok_or(RiskError::InvalidReductionRatio(ratio))?;
    Ok(portfolio
        .positions()
        .filter(|(_, quantity)| !quantity.is_zero())
        .map(|(asset, quantity)| Order::new(asset.clone(), quantity.scale(factor).sub(quantity)))
        .filter(|order| !order.quantity.is_zero())
        .collect())
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RiskError {
    #[error("{measure} limit must be finite and non-negative, got {limit}")]
    InvalidLimit { measure: RiskMeasure, limit: f64 },

    #[error("Reduction ratio {0} cannot be applied")]
    InvalidReductionRatio(f64),

    #[error("Covariance error: {0}")]
    Covariance(#[from] CovarianceError),

    #[error("Portfolio error: {0}")]
    Portfolio(#[from] PortfolioError),

    #[error("Market error: {0}")]
    Market(#[from] MarketError),

    #[error("Series error: {0}")]
    Series(#[from] SeriesError),
}
