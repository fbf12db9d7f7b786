//! Market configuration and state.
//!
//! A market is a fixed set of assets. Each asset carries its own price,
//! log-return and fundamental-value series plus a liquidity constant that
//! scales price impact. Spreads are tracked against a designated reference
//! asset. The market also owns the confidence levels used for VaR and ES.

use crate::series::{SeriesError, TimeSeries};
use crate::types::{AssetId, Price, Tick};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Static asset configuration (immutable after creation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetConfig {
    pub id: AssetId,
    /// Seeded price at tick 0. clearing fails without it.
    pub initial_price: Option<f64>,
    /// Seeded spread against the reference asset at tick 0
    pub initial_spread: Option<f64>,
    /// Depth parameter: price impact = net flow / liquidity
    pub liquidity: f64,
    /// Fundamental value at tick 0, falls back to the initial price
    pub initial_fundamental: Option<f64>,
}

impl AssetConfig {
    pub fn new(id: impl Into<AssetId>, initial_price: f64, liquidity: f64) -> Self {
        Self {
            id: id.into(),
            initial_price: Some(initial_price),
            initial_spread: None,
            liquidity,
            initial_fundamental: None,
        }
    }

    pub fn with_initial_spread(mut self, spread: f64) -> Self {
        self.initial_spread = Some(spread);
        self
    }

    pub fn with_initial_fundamental(mut self, value: f64) -> Self {
        self.initial_fundamental = Some(value);
        self
    }

    pub fn validate(&self) -> Result<(), MarketError> {
        if !(self.liquidity.is_finite() && self.liquidity > 0.0) {
            return Err(MarketError::InvalidLiquidity {
                asset: self.id.clone(),
                liquidity: self.liquidity,
            });
        }
        if let Some(price) = self.initial_price {
            if Price::new(price).is_none() {
                return Err(MarketError::InvalidPrice {
                    asset: self.id.clone(),
                    price,
                });
            }
        }
        Ok(())
    }
}

/// Confidence levels shared by every trader's VaR and ES calculations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskConfidence {
    pub var: f64,
    pub es: f64,
}

impl Default for RiskConfidence {
    fn default() -> Self {
        Self { var: 0.99, es: 0.975 }
    }
}

impl RiskConfidence {
    pub fn validate(&self) -> Result<(), MarketError> {
        for level in [self.var, self.es] {
            if !(level > 0.0 && level < 1.0) {
                return Err(MarketError::InvalidConfidence(level));
            }
        }
        Ok(())
    }
}

/// Dynamic per-asset state (grows every tick)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetState {
    pub config: AssetConfig,
    pub prices: TimeSeries<f64>,
    pub log_returns: TimeSeries<f64>,
    pub fundamentals: TimeSeries<f64>,
}

impl AssetState {
    pub fn new(config: AssetConfig) -> Self {
        Self {
            config,
            prices: TimeSeries::new(),
            log_returns: TimeSeries::new(),
            fundamentals: TimeSeries::new(),
        }
    }

    pub fn latest_price(&self) -> Option<Price> {
        self.prices.last().copied().and_then(Price::new)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    assets: BTreeMap<AssetId, AssetState>,
    reference_asset: AssetId,
    /// spread(asset) = price(asset) - price(reference), one series per non-reference asset
    spreads: BTreeMap<AssetId, TimeSeries<f64>>,
    confidence: RiskConfidence,
    /// Clearing never sets a price below this
    min_price: f64,
}

impl Market {
    pub fn new(
        assets: Vec<AssetConfig>,
        reference_asset: AssetId,
        confidence: RiskConfidence,
        min_price: f64,
    ) -> Result<Self, MarketError> {
        confidence.validate()?;
        if !(min_price.is_finite() && min_price > 0.0) {
            return Err(MarketError::InvalidMinPrice(min_price));
        }

        let mut states = BTreeMap::new();
        for config in assets {
            config.validate()?;
            let id = config.id.clone();
            if states.insert(id.clone(), AssetState::new(config)).is_some() {
                return Err(MarketError::DuplicateAsset(id));
            }
        }

        if !states.contains_key(&reference_asset) {
            return Err(MarketError::UnknownReferenceAsset(reference_asset));
        }

        let spreads = states
            .keys()
            .filter(|id| **id != reference_asset)
            .map(|id| (id.clone(), TimeSeries::new()))
            .collect();

        Ok(Self {
            assets: states,
            reference_asset,
            spreads,
            confidence,
            min_price,
        })
    }

    pub fn asset_ids(&self) -> impl Iterator<Item = &AssetId> {
        self.assets.keys()
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn contains(&self, asset: &AssetId) -> bool {
        self.assets.contains_key(asset)
    }

    pub fn asset(&self, asset: &AssetId) -> Result<&AssetState, MarketError> {
        self.assets
            .get(asset)
            .ok_or_else(|| MarketError::UnknownAsset(asset.clone()))
    }

    pub(crate) fn asset_mut(&mut self, asset: &AssetId) -> Result<&mut AssetState, MarketError> {
        self.assets
            .get_mut(asset)
            .ok_or_else(|| MarketError::UnknownAsset(asset.clone()))
    }

    pub fn reference_asset(&self) -> &AssetId {
        &self.reference_asset
    }

    pub fn confidence(&self) -> RiskConfidence {
        self.confidence
    }

    pub fn min_price(&self) -> f64 {
        self.min_price
    }

    pub fn liquidity(&self, asset: &AssetId) -> Result<f64, MarketError> {
        Ok(self.asset(asset)?.config.liquidity)
    }

    pub fn price(&self, asset: &AssetId, tick: Tick) -> Result<Price, MarketError> {
        let value = *self.asset(asset)?.prices.at(tick)?;
        Ok(Price::new_unchecked(value))
    }

    pub fn latest_price(&self, asset: &AssetId) -> Option<Price> {
        self.assets.get(asset).and_then(AssetState::latest_price)
    }

    pub fn log_return(&self, asset: &AssetId, tick: Tick) -> Result<f64, MarketError> {
        Ok(*self.asset(asset)?.log_returns.at(tick)?)
    }

    pub fn fundamental(&self, asset: &AssetId, tick: Tick) -> Result<f64, MarketError> {
        Ok(*self.asset(asset)?.fundamentals.at(tick)?)
    }

    /// Spread of `asset` against the reference asset. zero for the reference itself.
    pub fn spread(&self, asset: &AssetId, tick: Tick) -> Result<f64, MarketError> {
        if *asset == self.reference_asset {
            self.asset(asset)?;
            return Ok(0.0);
        }
        let series = self
            .spreads
            .get(asset)
            .ok_or_else(|| MarketError::UnknownAsset(asset.clone()))?;
        Ok(*series.at(tick)?)
    }

    pub fn spread_series(&self, asset: &AssetId) -> Option<&TimeSeries<f64>> {
        self.spreads.get(asset)
    }

    /// Last tick with a cleared price, identical for all assets.
    pub fn last_cleared_tick(&self) -> Option<Tick> {
        self.assets.values().next().and_then(|s| s.prices.last_tick())
    }

    pub(crate) fn record_spread(&mut self, asset: &AssetId, tick: Tick, spread: f64) -> Result<(), MarketError> {
        let series = self
            .spreads
            .get_mut(asset)
            .ok_or_else(|| MarketError::UnknownAsset(asset.clone()))?;
        series.append(tick, spread)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MarketError {
    #[error("Asset {0} not found")]
    UnknownAsset(AssetId),

    #[error("Asset {0} configured twice")]
    DuplicateAsset(AssetId),

    #[error("Reference asset {0} is not part of the market")]
    UnknownReferenceAsset(AssetId),

    #[error("Asset {asset} has invalid liquidity {liquidity}")]
    InvalidLiquidity { asset: AssetId, liquidity: f64 },

    #[error("Asset {asset} has invalid price {price}")]
    InvalidPrice { asset: AssetId, price: f64 },

    #[error("Confidence level {0} must lie strictly between 0 and 1")]
    InvalidConfidence(f64),

    #[error("Minimum price {0} must be positive")]
    InvalidMinPrice(f64),

    #[error("Asset {0} has no initial price seeded before the first clearing")]
    MissingInitialPrice(AssetId),

    #[error("Asset {0} has no initial spread seeded before the first clearing")]
    MissingInitialSpread(AssetId),

    #[error("Series error: {0}")]
    Series(#[from] SeriesError),
}
