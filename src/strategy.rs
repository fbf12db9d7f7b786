// 7.0: strategies. the core only needs desired orders and the set of assets
// a strategy trades; what drives the decision is up to the strategy.
// three reference strategies ship for demos and tests.

use crate::market::Market;
use crate::order::Order;
use crate::portfolio::Portfolio;
use crate::types::{AssetId, Quantity, Tick};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub trait Strategy: fmt::Debug + Send {
    fn name(&self) -> &str;

    /// Assets this strategy may emit orders for.
    fn asset_ids(&self) -> BTreeSet<AssetId>;

    /// Desired orders for `tick`. prices for `tick` are already cleared.
    fn orders(&mut self, tick: Tick, market: &Market, portfolio: &Portfolio) -> Vec<Order>;
}

/// Same signed order every tick, per asset.
#[derive(Debug, Clone)]
pub struct FixedFlowStrategy {
    name: String,
    flows: BTreeMap<AssetId, Quantity>,
}

impl FixedFlowStrategy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flows: BTreeMap::new(),
        }
    }

    pub fn with_flow(mut self, asset: impl Into<AssetId>, quantity: Decimal) -> Self {
        self.flows.insert(asset.into(), Quantity::new(quantity));
        self
    }
}

impl Strategy for FixedFlowStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn asset_ids(&self) -> BTreeSet<AssetId> {
        self.flows.keys().cloned().collect()
    }

    fn orders(&mut self, _tick: Tick, _market: &Market, _portfolio: &Portfolio) -> Vec<Order> {
        self.flows
            .iter()
            .map(|(asset, quantity)| Order::new(asset.clone(), *quantity))
            .collect()
    }
}

/// Trades `size` in the direction of the latest log-return.
#[derive(Debug, Clone)]
pub struct MomentumStrategy {
    name: String,
    assets: BTreeSet<AssetId>,
    size: Decimal,
    /// Returns smaller than this in magnitude produce no order.
    threshold: f64,
}

impl MomentumStrategy {
    pub fn new(name: impl Into<String>, assets: impl IntoIterator<Item = AssetId>, size: Decimal) -> Self {
        Self {
            name: name.into(),
            assets: assets.into_iter().collect(),
            size: size.abs(),
            threshold: 0.0,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.abs();
        self
    }
}

impl Strategy for MomentumStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn asset_ids(&self) -> BTreeSet<AssetId> {
        self.assets.clone()
    }

    fn orders(&mut self, tick: Tick, market: &Market, _portfolio: &Portfolio) -> Vec<Order> {
        let mut orders = Vec::new();
        for asset in &self.assets {
            let Ok(r) = market.log_return(asset, tick) else {
                continue;
            };
            if r.abs() <= self.threshold {
                continue;
            }
            let quantity = if r > 0.0 { self.size } else { -self.size };
            orders.push(Order::new(asset.clone(), Quantity::new(quantity)));
        }
        orders
    }
}

/// Trades toward fundamental value: order = aggressiveness × (fundamental - price) / price,
/// capped at `max_order` units.
#[derive(Debug, Clone)]
pub struct FundamentalistStrategy {
    name: String,
    assets: BTreeSet<AssetId>,
    aggressiveness: f64,
    max_order: Decimal,
}

impl FundamentalistStrategy {
    pub fn new(
        name: impl Into<String>,
        assets: impl IntoIterator<Item = AssetId>,
        aggressiveness: f64,
        max_order: Decimal,
    ) -> Self {
        Self {
            name: name.into(),
            assets: assets.into_iter().collect(),
            aggressiveness,
            max_order: max_order.abs(),
        }
    }
}

impl Strategy for FundamentalistStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn asset_ids(&self) -> BTreeSet<AssetId> {
        self.assets.clone()
    }

    fn orders(&mut self, tick: Tick, market: &Market, _portfolio: &Portfolio) -> Vec<Order> {
        let mut orders = Vec::new();
        for asset in &self.assets {
            let (Ok(price), Ok(fundamental)) = (market.price(asset, tick), market.fundamental(asset, tick)) else {
                continue;
            };
            let mispricing = (fundamental - price.value()) / price.value();
            let Some(desired) = Decimal::from_f64(self.aggressiveness * mispricing) else {
                continue;
            };
            let quantity = desired.clamp(-self.max_order, self.max_order);
            if quantity.is_zero() {
                continue;
            }
            orders.push(Order::new(asset.clone(), Quantity::new(quantity)));
        }
        orders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{ConstantGenerator, SequenceGenerator};
    use crate::market::{AssetConfig, RiskConfidence};
    use crate::market_maker::MarketMaker;
    use crate::order::OrderBook;
    use rust_decimal_macros::dec;

    fn market(ticks: u64, shocks: Vec<f64>) -> Market {
        let mut market = Market::new(
            vec![AssetConfig::new("A", 100.0, 1000.0).with_initial_fundamental(110.0)],
            AssetId::new("A"),
            RiskConfidence::default(),
            0.01,
        )
        .unwrap();
        let mut mm = MarketMaker::new()
            .with_shock("A", Box::new(SequenceGenerator::new(shocks)))
            .with_fundamental("A", Box::new(ConstantGenerator(110.0)));
        let mut book = OrderBook::new(market.asset_ids());
        for t in 0..=ticks {
            mm.clear(Tick(t), &mut market, &mut book).unwrap();
            mm.update_fundamentals(Tick(t), &mut market).unwrap();
        }
        market
    }

    fn empty_portfolio() -> Portfolio {
        Portfolio::new([AssetId::new("A")])
    }

    #[test]
    fn fixed_flow_repeats() {
        let m = market(1, vec![]);
        let mut s = FixedFlowStrategy::new("flow").with_flow("A", dec!(10)).with_flow("B", dec!(-10));
        let orders = s.orders(Tick(1), &m, &empty_portfolio());
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[1].quantity.value(), dec!(-10));
        assert_eq!(s.asset_ids().len(), 2);
    }

    #[test]
    fn momentum_follows_last_return() {
        let m = market(2, vec![2.0, -3.0]);
        let mut s = MomentumStrategy::new("mom", [AssetId::new("A")], dec!(5));
        assert_eq!(s.orders(Tick(1), &m, &empty_portfolio())[0].quantity.value(), dec!(5));
        assert_eq!(s.orders(Tick(2), &m, &empty_portfolio())[0].quantity.value(), dec!(-5));
        // tick-0 return is zero
        assert!(s.orders(Tick(0), &m, &empty_portfolio()).is_empty());
    }

    #[test]
    fn fundamentalist_buys_below_value() {
        let m = market(0, vec![]);
        let mut s = FundamentalistStrategy::new("fund", [AssetId::new("A")], 100.0, dec!(5));
        // (110 - 100) / 100 * 100 = 10, capped at 5
        let orders = s.orders(Tick(0), &m, &empty_portfolio());
        assert_eq!(orders[0].quantity.value(), dec!(5));
    }
}
