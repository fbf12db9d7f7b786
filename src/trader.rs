// 8.0: trader. strategies propose, the risk engine disposes.
// per tick: open the ledger, roll risk statistics, apply strategy orders,
// enforce limits (which may shrink the book), mark wealth, check solvency.
// 8.1 solvency is a one-way switch: ALIVE until wealth + gross value < 0
// after the warm-up, DEAD forever after. dead traders freeze their book.

use crate::config::{ConfigError, TraderConfig};
use crate::market::{Market, MarketError};
use crate::order::{Order, OrderOrigin};
use crate::portfolio::{Portfolio, PortfolioError};
use crate::risk::{LimitBreach, RiskEngine, RiskError, RiskSnapshot};
use crate::series::{SeriesError, TimeSeries};
use crate::strategy::Strategy;
use crate::types::{AssetId, Quantity, Tick, TraderId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolvencyState {
    Alive,
    Dead,
}

/// An order the trader wants on the book for the next clearing pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderOrder {
    pub order: Order,
    pub origin: OrderOrigin,
}

/// Corrective trade the risk engine imposed on one asset this tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForcedSelloff {
    pub asset: AssetId,
    pub desired: Quantity,
    pub corrective: Quantity,
    pub against_desired: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraderTickReport {
    pub trader: TraderId,
    pub tick: Tick,
    pub orders: Vec<TraderOrder>,
    pub breaches: Vec<LimitBreach>,
    pub forced_selloffs: Vec<ForcedSelloff>,
    /// New stressed regime intensity, when the stress matrix ratcheted this tick.
    pub stress_update: Option<f64>,
    pub snapshot: Option<RiskSnapshot>,
    pub wealth: f64,
    pub gross_value: f64,
    /// True only on the tick the trader failed.
    pub failed: bool,
    /// Dead before this tick started: no orders, book carried forward.
    pub frozen: bool,
}

#[derive(Debug)]
pub struct Trader {
    id: TraderId,
    config: TraderConfig,
    strategies: Vec<Box<dyn Strategy>>,
    portfolio: Portfolio,
    risk: Option<RiskEngine>,
    state: SolvencyState,
    failure_tick: Option<Tick>,
    wealth: TimeSeries<f64>,
    gross_value: TimeSeries<f64>,
    forced_selloffs: u64,
}

impl Trader {
    /// The trader is active in the union of its strategies' assets.
    pub fn new(id: TraderId, config: TraderConfig, strategies: Vec<Box<dyn Strategy>>) -> Result<Self, TraderError> {
        config.validate()?;
        let assets: BTreeSet<AssetId> = strategies.iter().flat_map(|s| s.asset_ids()).collect();

        let risk = if config.capabilities.is_enabled() {
            Some(RiskEngine::new(
                assets.iter().cloned().collect(),
                config.covariance_window,
                config.capabilities,
                config.limit_policy,
                config.vol_index_window,
            )?)
        } else {
            None
        };

        Ok(Self {
            id,
            config,
            strategies,
            portfolio: Portfolio::new(assets),
            risk,
            state: SolvencyState::Alive,
            failure_tick: None,
            wealth: TimeSeries::new(),
            gross_value: TimeSeries::new(),
            forced_selloffs: 0,
        })
    }

    pub fn id(&self) -> TraderId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &TraderConfig {
        &self.config
    }

    pub fn asset_ids(&self) -> impl Iterator<Item = &AssetId> {
        self.portfolio.asset_ids()
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn risk(&self) -> Option<&RiskEngine> {
        self.risk.as_ref()
    }

    pub fn state(&self) -> SolvencyState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state == SolvencyState::Alive
    }

    pub fn failure_tick(&self) -> Option<Tick> {
        self.failure_tick
    }

    /// Cumulative mark-to-market P&L.
    pub fn wealth(&self) -> &TimeSeries<f64> {
        &self.wealth
    }

    pub fn gross_value(&self) -> &TimeSeries<f64> {
        &self.gross_value
    }

    /// Ticks on which the risk engine forced a corrective trade.
    pub fn forced_selloff_count(&self) -> u64 {
        self.forced_selloffs
    }

    /// 8.2: one trader-phase pass. prices for `tick` must already be cleared.
    pub fn trade(&mut self, tick: Tick, market: &Market) -> Result<TraderTickReport, TraderError> {
        self.portfolio.open(tick)?;

        let mut report = TraderTickReport {
            trader: self.id,
            tick,
            orders: Vec::new(),
            breaches: Vec::new(),
            forced_selloffs: Vec::new(),
            stress_update: None,
            snapshot: None,
            wealth: 0.0,
            gross_value: 0.0,
            failed: false,
            frozen: !self.is_alive(),
        };

        if self.is_alive() {
            self.trade_alive(tick, market, &mut report)?;
        }

        self.mark(tick, market, &mut report)?;
        Ok(report)
    }

    fn trade_alive(&mut self, tick: Tick, market: &Market, report: &mut TraderTickReport) -> Result<(), TraderError> {
        if let Some(risk) = self.risk.as_mut() {
            let outcome = risk.update_statistics(tick, market)?;
            if outcome.stress_updated {
                report.stress_update = Some(outcome.regime_intensity);
            }
        }

        let mut desired: BTreeMap<AssetId, Quantity> = BTreeMap::new();
        for strategy in self.strategies.iter_mut() {
            for order in strategy.orders(tick, market, &self.portfolio) {
                if !self.portfolio.contains(&order.asset) {
                    return Err(TraderError::UndeclaredAsset {
                        strategy: strategy.name().to_string(),
                        asset: order.asset,
                    });
                }
                self.portfolio.apply(&order)?;
                let entry = desired.entry(order.asset.clone()).or_default();
                *entry = entry.add(order.quantity);
                report.orders.push(TraderOrder {
                    order,
                    origin: OrderOrigin::Strategy,
                });
            }
        }

        let Some(risk) = self.risk.as_mut() else {
            return Ok(());
        };
        let assessment = risk.enforce(tick, market, &mut self.portfolio)?;

        let mut corrective: BTreeMap<AssetId, Quantity> = BTreeMap::new();
        for order in assessment.corrective_orders() {
            let entry = corrective.entry(order.asset.clone()).or_default();
            *entry = entry.add(order.quantity);
            report.orders.push(TraderOrder {
                order: order.clone(),
                origin: OrderOrigin::RiskReduction,
            });
        }
        for (asset, quantity) in corrective {
            if quantity.is_zero() {
                continue;
            }
            let wanted = desired.get(&asset).copied().unwrap_or_default();
            let against_desired = matches!(
                (wanted.side(), quantity.side()),
                (Some(w), Some(c)) if w != c
            );
            report.forced_selloffs.push(ForcedSelloff {
                asset,
                desired: wanted,
                corrective: quantity,
                against_desired,
            });
        }
        if !report.forced_selloffs.is_empty() {
            self.forced_selloffs += 1;
        }

        report.breaches = assessment.breaches;
        report.snapshot = Some(assessment.snapshot);
        Ok(())
    }

    // 8.3: wealth_t = wealth_{t-1} + Σ pos_{t-1} (p_t - p_{t-1}), then the failure test
    fn mark(&mut self, tick: Tick, market: &Market, report: &mut TraderTickReport) -> Result<(), TraderError> {
        let previous = self.wealth.last().copied().unwrap_or(0.0);
        let wealth = previous + self.portfolio.pnl(market, tick)?;
        let gross = self.portfolio.gross_value(market, tick)?;
        self.wealth.append(tick, wealth)?;
        self.gross_value.append(tick, gross)?;
        report.wealth = wealth;
        report.gross_value = gross;

        if self.is_alive() && tick.value() > self.config.failure_warmup && wealth + gross < 0.0 {
            self.state = SolvencyState::Dead;
            self.failure_tick = Some(tick);
            report.failed = true;
            tracing::warn!(trader = %self.id, %tick, wealth, gross, "trader failed");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TraderError {
    #[error("Strategy {strategy} emitted an order for undeclared asset {asset}")]
    UndeclaredAsset { strategy: String, asset: AssetId },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Risk error: {0}")]
    Risk(#[from] RiskError),

    #[error("Portfolio error: {0}")]
    Portfolio(#[from] PortfolioError),

    #[error("Market error: {0}")]
    Market(#[from] MarketError),

    #[error("Series error: {0}")]
    Series(#[from] SeriesError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::SequenceGenerator;
    use crate::market::{AssetConfig, RiskConfidence};
    use crate::market_maker::MarketMaker;
    use crate::order::OrderBook;
    use crate::risk::RiskCapabilities;
    use crate::strategy::FixedFlowStrategy;
    use rust_decimal_macros::dec;

    struct Harness {
        market: Market,
        book: OrderBook,
        mm: MarketMaker,
    }

    impl Harness {
        fn new(shocks_a: Vec<f64>, shocks_b: Vec<f64>) -> Self {
            let market = Market::new(
                vec![
                    AssetConfig::new("A", 100.0, 1000.0),
                    AssetConfig::new("B", 100.0, 1000.0).with_initial_spread(0.0),
                ],
                AssetId::new("A"),
                RiskConfidence::default(),
                0.01,
            )
            .unwrap();
            let book = OrderBook::new(market.asset_ids());
            let mm = MarketMaker::new()
                .with_shock("A", Box::new(SequenceGenerator::new(shocks_a)))
                .with_shock("B", Box::new(SequenceGenerator::new(shocks_b)));
            Self { market, book, mm }
        }

        fn step(&mut self, tick: Tick, trader: &mut Trader) -> TraderTickReport {
            self.mm.clear(tick, &mut self.market, &mut self.book).unwrap();
            let report = trader.trade(tick, &self.market).unwrap();
            for o in &report.orders {
                self.book.submit(trader.id(), o.order.clone(), o.origin).unwrap();
            }
            report
        }
    }

    fn flow_trader(config: TraderConfig) -> Trader {
        let strategy = FixedFlowStrategy::new("flow").with_flow("A", dec!(10)).with_flow("B", dec!(-10));
        Trader::new(TraderId(1), config, vec![Box::new(strategy)]).unwrap()
    }

    #[test]
    fn unconstrained_trader_accumulates() {
        let mut h = Harness::new(vec![], vec![]);
        let mut trader = flow_trader(TraderConfig::default());
        for t in 0..4 {
            let report = h.step(Tick(t), &mut trader);
            assert!(report.breaches.is_empty());
            assert!(report.snapshot.is_none());
        }
        assert_eq!(trader.portfolio().position(&AssetId::new("A")).value(), dec!(40));
        assert_eq!(trader.portfolio().position(&AssetId::new("B")).value(), dec!(-40));
    }

    #[test]
    fn wealth_marks_prior_positions() {
        let mut h = Harness::new(vec![], vec![]);
        let mut trader = flow_trader(TraderConfig::default());
        h.step(Tick(0), &mut trader);
        // flow of +10 A / -10 B moves A up 0.01 and B down 0.01 at tick 1
        let report = h.step(Tick(1), &mut trader);
        let expected = 10.0 * 0.01 + (-10.0) * (-0.01);
        assert!((report.wealth - expected).abs() < 1e-9);
        assert_eq!(trader.wealth().len(), 2);
    }

    #[test]
    fn var_limit_forces_selloffs() {
        let shocks_a: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 2.0 } else { -1.5 }).collect();
        let shocks_b: Vec<f64> = (0..30).map(|i| if i % 3 == 0 { -1.0 } else { 1.2 }).collect();
        let mut h = Harness::new(shocks_a, shocks_b);
        let config = TraderConfig::default().with_capabilities(RiskCapabilities::var(100.0));
        let mut trader = flow_trader(config);

        let mut saw_breach = false;
        for t in 0..30 {
            let report = h.step(Tick(t), &mut trader);
            if t < 5 {
                assert!(report.breaches.is_empty());
            }
            if !report.breaches.is_empty() {
                saw_breach = true;
                assert!(!report.forced_selloffs.is_empty());
                assert!(report
                    .orders
                    .iter()
                    .any(|o| o.origin == OrderOrigin::RiskReduction));
            }
        }
        assert!(saw_breach);
        assert!(trader.forced_selloff_count() > 0);
        assert_eq!(trader.risk().unwrap().history().len(), 30);
    }

    #[test]
    fn failure_is_single_shot_and_freezes() {
        // a crash in A against a long A book
        let mut shocks_a = vec![0.0; 3];
        shocks_a.extend([-60.0, -35.0]);
        let mut h = Harness::new(shocks_a, vec![]);
        let strategy = FixedFlowStrategy::new("long").with_flow("A", dec!(100));
        let config = TraderConfig::default().with_failure_warmup(1);
        let mut trader = Trader::new(TraderId(7), config, vec![Box::new(strategy)]).unwrap();

        let mut failures = 0;
        for t in 0..10 {
            let report = h.step(Tick(t), &mut trader);
            if report.failed {
                failures += 1;
            }
            if let Some(failed_at) = trader.failure_tick() {
                if t > failed_at.value() {
                    assert!(report.frozen);
                    assert!(report.orders.is_empty());
                }
            }
        }
        assert_eq!(failures, 1);
        assert_eq!(trader.state(), SolvencyState::Dead);
        let failed_at = trader.failure_tick().unwrap();
        let frozen = trader.portfolio().position_at(&AssetId::new("A"), failed_at).unwrap();
        assert_eq!(trader.portfolio().position(&AssetId::new("A")), frozen);
    }

    #[test]
    fn undeclared_asset_is_an_error() {
        #[derive(Debug)]
        struct Rogue;
        impl Strategy for Rogue {
            fn name(&self) -> &str {
                "rogue"
            }
            fn asset_ids(&self) -> BTreeSet<AssetId> {
                [AssetId::new("A")].into_iter().collect()
            }
            fn orders(&mut self, _: Tick, _: &Market, _: &Portfolio) -> Vec<Order> {
                vec![Order::new("B", Quantity::new(dec!(1)))]
            }
        }
        let mut h = Harness::new(vec![], vec![]);
        let mut trader = Trader::new(TraderId(1), TraderConfig::default(), vec![Box::new(Rogue)]).unwrap();
        h.mm.clear(Tick(0), &mut h.market, &mut h.book).unwrap();
        assert!(matches!(
            trader.trade(Tick(0), &h.market),
            Err(TraderError::UndeclaredAsset { .. })
        ));
    }
}
