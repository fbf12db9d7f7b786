// 4.0 market_maker.rs: price formation. turns the previous tick's order flow
// into new prices, log-returns and spreads, and advances fundamental values.
//
// price_t = price_{t-1} + net_flow / liquidity + shock
// return_t = ln(price_t) - ln(price_{t-1}), defined as 0 at tick 0

use crate::generator::Generator;
use crate::market::{Market, MarketError};
use crate::order::OrderBook;
use crate::types::{AssetId, Price, Quantity, Tick};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of one clearing pass for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearedAsset {
    pub asset: AssetId,
    pub price: f64,
    pub log_return: f64,
    pub net_flow: Quantity,
    pub shock: f64,
    /// True when the raw price fell below the market floor.
    pub floored: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearingReport {
    pub tick: Tick,
    pub assets: Vec<ClearedAsset>,
    pub orders_consumed: usize,
}

/// 4.1: clears order flow into prices. owns the exogenous generators.
#[derive(Debug, Default)]
pub struct MarketMaker {
    shocks: BTreeMap<AssetId, Box<dyn Generator>>,
    fundamentals: BTreeMap<AssetId, Box<dyn Generator>>,
}

impl MarketMaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shock(mut self, asset: impl Into<AssetId>, generator: Box<dyn Generator>) -> Self {
        self.shocks.insert(asset.into(), generator);
        self
    }

    pub fn with_fundamental(mut self, asset: impl Into<AssetId>, generator: Box<dyn Generator>) -> Self {
        self.fundamentals.insert(asset.into(), generator);
        self
    }

    /// Every generator must belong to an asset of `market`.
    pub fn validate(&self, market: &Market) -> Result<(), MarketError> {
        for asset in self.shocks.keys().chain(self.fundamentals.keys()) {
            if !market.contains(asset) {
                return Err(MarketError::UnknownAsset(asset.clone()));
            }
        }
        Ok(())
    }

    /// 4.2: clearing pass for `tick`. all-or-nothing: prices are computed for
    /// every asset before anything is appended. empties the book.
    pub fn clear(
        &mut self,
        tick: Tick,
        market: &mut Market,
        book: &mut OrderBook,
    ) -> Result<ClearingReport, MarketError> {
        let assets: Vec<AssetId> = market.asset_ids().cloned().collect();
        let mut cleared = Vec::with_capacity(assets.len());

        match tick.prev() {
            None => {
                for asset in &assets {
                    let config = &market.asset(asset)?.config;
                    let price = config
                        .initial_price
                        .ok_or_else(|| MarketError::MissingInitialPrice(asset.clone()))?;
                    cleared.push(ClearedAsset {
                        asset: asset.clone(),
                        price,
                        log_return: 0.0,
                        net_flow: book.net_flow(asset),
                        shock: 0.0,
                        floored: false,
                    });
                }
            }
            Some(prev) => {
                let floor = market.min_price();
                for asset in &assets {
                    let previous = market.price(asset, prev)?;
                    let liquidity = market.liquidity(asset)?;
                    let net_flow = book.net_flow(asset);
                    let shock = self.shocks.get_mut(asset).map(|g| g.next()).unwrap_or(0.0);

                    let raw = previous.value() + net_flow.to_f64() / liquidity + shock;
                    let (price, floored) = if raw.is_finite() && raw >= floor {
                        (raw, false)
                    } else {
                        (floor, true)
                    };
                    let log_return = Price::new_unchecked(price).ln() - previous.ln();

                    cleared.push(ClearedAsset {
                        asset: asset.clone(),
                        price,
                        log_return,
                        net_flow,
                        shock,
                        floored,
                    });
                }
            }
        }

        let spreads = self.spreads(tick, market, &cleared)?;

        for entry in &cleared {
            let state = market.asset_mut(&entry.asset)?;
            state.prices.append(tick, entry.price)?;
            state.log_returns.append(tick, entry.log_return)?;
        }
        for (asset, spread) in spreads {
            market.record_spread(&asset, tick, spread)?;
        }

        let orders_consumed = book.len();
        book.drain();

        Ok(ClearingReport {
            tick,
            assets: cleared,
            orders_consumed,
        })
    }

    // spreads against the reference asset; seeded values at tick 0
    fn spreads(
        &self,
        tick: Tick,
        market: &Market,
        cleared: &[ClearedAsset],
    ) -> Result<Vec<(AssetId, f64)>, MarketError> {
        let reference = market.reference_asset();
        let reference_price = cleared
            .iter()
            .find(|c| &c.asset == reference)
            .map(|c| c.price)
            .ok_or_else(|| MarketError::UnknownAsset(reference.clone()))?;

        cleared
            .iter()
            .filter(|c| &c.asset != reference)
            .map(|c| {
                let spread = if tick.is_zero() {
                    market
                        .asset(&c.asset)?
                        .config
                        .initial_spread
                        .ok_or_else(|| MarketError::MissingInitialSpread(c.asset.clone()))?
                } else {
                    c.price - reference_price
                };
                Ok((c.asset.clone(), spread))
            })
            .collect()
    }

    /// 4.3: append this tick's fundamental value for every asset. assets
    /// without a generator carry their previous value forward.
    pub fn update_fundamentals(
        &mut self,
        tick: Tick,
        market: &mut Market,
    ) -> Result<Vec<(AssetId, f64)>, MarketError> {
        let assets: Vec<AssetId> = market.asset_ids().cloned().collect();
        let mut values = Vec::with_capacity(assets.len());

        for asset in &assets {
            let state = market.asset(asset)?;
            let value = match tick.prev() {
                None => state
                    .config
                    .initial_fundamental
                    .or(state.config.initial_price)
                    .ok_or_else(|| MarketError::MissingInitialPrice(asset.clone()))?,
                Some(prev) => match self.fundamentals.get_mut(asset) {
                    Some(generator) => generator.next(),
                    None => *state.fundamentals.at(prev)?,
                },
            };
            values.push((asset.clone(), value));
        }

        for (asset, value) in &values {
            market.asset_mut(asset)?.fundamentals.append(tick, *value)?;
        }

        Ok(values)
    }
}
