// 5.0: position ledger. one position series per asset the trader is active in.
// position(t) = position(t-1) + sum of orders applied at t, starting from zero.
// a tick is opened by carrying every position forward, then orders amend it.

use crate::market::{Market, MarketError};
use crate::order::Order;
use crate::series::{SeriesError, TimeSeries};
use crate::types::{AssetId, Quantity, Tick};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    positions: BTreeMap<AssetId, TimeSeries<Quantity>>,
    open_tick: Option<Tick>,
}

impl Portfolio {
    pub fn new(assets: impl IntoIterator<Item = AssetId>) -> Self {
        Self {
            positions: assets.into_iter().map(|a| (a, TimeSeries::new())).collect(),
            open_tick: None,
        }
    }

    pub fn asset_ids(&self) -> impl Iterator<Item = &AssetId> {
        self.positions.keys()
    }

    pub fn contains(&self, asset: &AssetId) -> bool {
        self.positions.contains_key(asset)
    }

    pub fn open_tick(&self) -> Option<Tick> {
        self.open_tick
    }

    /// Carry every position into `tick`. Reopening the current tick is a no-op.
    pub fn open(&mut self, tick: Tick) -> Result<(), PortfolioError> {
        if self.open_tick == Some(tick) {
            return Ok(());
        }
        for series in self.positions.values_mut() {
            let carried = series.last().copied().unwrap_or_default();
            series.append(tick, carried)?;
        }
        self.open_tick = Some(tick);
        Ok(())
    }

    // 5.1: amend the open tick's position
    pub fn apply(&mut self, order: &Order) -> Result<Quantity, PortfolioError> {
        let tick = self.open_tick.ok_or(PortfolioError::NoOpenTick)?;
        let series = self
            .positions
            .get_mut(&order.asset)
            .ok_or_else(|| PortfolioError::UnknownAsset(order.asset.clone()))?;
        let position = series.last_mut().ok_or(PortfolioError::NoOpenTick)?;
        *position = position.add(order.quantity);
        tracing::trace!(asset = %order.asset, %tick, quantity = %order.quantity, position = %position, "order applied");
        Ok(*position)
    }

    /// Position as of the open tick. zero before anything was opened.
    pub fn position(&self, asset: &AssetId) -> Quantity {
        self.positions
            .get(asset)
            .and_then(|s| s.last().copied())
            .unwrap_or_default()
    }

    /// Position at `tick`. Ticks before the first record are flat.
    pub fn position_at(&self, asset: &AssetId, tick: Tick) -> Result<Quantity, PortfolioError> {
        let series = self
            .positions
            .get(asset)
            .ok_or_else(|| PortfolioError::UnknownAsset(asset.clone()))?;
        match series.first_tick() {
            Some(first) if tick >= first => Ok(*series.at(tick)?),
            _ => Ok(Quantity::zero()),
        }
    }

    /// Position held coming into the open tick.
    pub fn prior_position(&self, asset: &AssetId) -> Quantity {
        match self.open_tick.and_then(|t| t.prev()) {
            Some(prev) => self.position_at(asset, prev).unwrap_or_default(),
            None => Quantity::zero(),
        }
    }

    pub fn positions(&self) -> impl Iterator<Item = (&AssetId, Quantity)> {
        self.positions
            .iter()
            .map(|(asset, series)| (asset, series.last().copied().unwrap_or_default()))
    }

    pub fn series(&self, asset: &AssetId) -> Option<&TimeSeries<Quantity>> {
        self.positions.get(asset)
    }

    pub fn is_flat(&self) -> bool {
        self.positions().all(|(_, q)| q.is_zero())
    }

    /// Σ |position| × price at `tick`.
    pub fn gross_value(&self, market: &Market, tick: Tick) -> Result<f64, PortfolioError> {
        let mut total = 0.0;
        for (asset, quantity) in self.positions() {
            if quantity.is_zero() {
                continue;
            }
            total += market.price(asset, tick)?.notional(quantity).abs();
        }
        Ok(total)
    }

    /// Mark-to-market P&L over (tick-1, tick] on the positions held at tick-1.
    pub fn pnl(&self, market: &Market, tick: Tick) -> Result<f64, PortfolioError> {
        let Some(prev) = tick.prev() else {
            return Ok(0.0);
        };
        let mut pnl = 0.0;
        for asset in self.positions.keys() {
            let held = self.position_at(asset, prev)?;
            if held.is_zero() {
                continue;
            }
            let price_move = market.price(asset, tick)?.value() - market.price(asset, prev)?.value();
            pnl += held.to_f64() * price_move;
        }
        Ok(pnl)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortfolioError {
    #[error("Asset {0} is not held by this portfolio")]
    UnknownAsset(AssetId),

    #[error("No tick is open for order application")]
    NoOpenTick,

    #[error("Series error: {0}")]
    Series(#[from] SeriesError),

    #[error("Market error: {0}")]
    Market(#[from] MarketError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn qty(v: rust_decimal::Decimal) -> Quantity {
        Quantity::new(v)
    }

    fn portfolio() -> Portfolio {
        Portfolio::new([AssetId::new("A"), AssetId::new("B")])
    }

    #[test]
    fn positions_accumulate_across_ticks() {
        let mut p = portfolio();
        p.open(Tick(0)).unwrap();
        p.apply(&Order::new("A", qty(dec!(10)))).unwrap();
        p.apply(&Order::new("A", qty(dec!(-3)))).unwrap();

        p.open(Tick(1)).unwrap();
        assert_eq!(p.position(&AssetId::new("A")).value(), dec!(7));
        p.apply(&Order::new("A", qty(dec!(5)))).unwrap();

        assert_eq!(p.position_at(&AssetId::new("A"), Tick(0)).unwrap().value(), dec!(7));
        assert_eq!(p.position_at(&AssetId::new("A"), Tick(1)).unwrap().value(), dec!(12));
        assert_eq!(p.prior_position(&AssetId::new("A")).value(), dec!(7));
        assert!(p.position(&AssetId::new("B")).is_zero());
    }

    #[test]
    fn apply_requires_open_tick() {
        let mut p = portfolio();
        assert_eq!(
            p.apply(&Order::new("A", qty(dec!(1)))),
            Err(PortfolioError::NoOpenTick)
        );
    }

    #[test]
    fn unknown_asset_rejected() {
        let mut p = portfolio();
        p.open(Tick(0)).unwrap();
        assert!(matches!(
            p.apply(&Order::new("Z", qty(dec!(1)))),
            Err(PortfolioError::UnknownAsset(_))
        ));
    }

    #[test]
    fn reopen_same_tick_is_noop() {
        let mut p = portfolio();
        p.open(Tick(3)).unwrap();
        p.apply(&Order::new("B", qty(dec!(-2)))).unwrap();
        p.open(Tick(3)).unwrap();
        assert_eq!(p.position(&AssetId::new("B")).value(), dec!(-2));
        assert_eq!(p.series(&AssetId::new("B")).unwrap().len(), 1);
    }

    #[test]
    fn ticks_before_first_record_are_flat() {
        let mut p = portfolio();
        p.open(Tick(4)).unwrap();
        p.apply(&Order::new("A", qty(dec!(1)))).unwrap();
        assert!(p.position_at(&AssetId::new("A"), Tick(2)).unwrap().is_zero());
        assert!(matches!(
            p.position_at(&AssetId::new("A"), Tick(9)),
            Err(PortfolioError::Series(_))
        ));
    }
}
