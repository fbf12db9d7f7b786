//! Property-based tests for the statistics and ledger invariants.
//!
//! These tests verify invariants hold under random inputs.

use proptest::prelude::*;
use rust_decimal::Decimal;
use varmarket_core::stats::sample_covariance;
use varmarket_core::{
    expected_shortfall, value_at_risk, AssetConfig, AssetId, CovarianceMatrix, CovarianceTracker, Exposure, Market,
    MarketMaker, Order, OrderBook, Portfolio, Quantity, RiskConfidence, SequenceGenerator, Tick, UpdateMode,
};

// Strategies for generating test data
fn shock_strategy(len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-2.0f64..2.0, len)
}

fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (-10_000i64..10_000i64).prop_map(|x| Decimal::new(x, 2)) // -100.00 to 100.00
}

fn two_asset_market(shocks_a: Vec<f64>, shocks_b: Vec<f64>, ticks: u64) -> Market {
    let mut market = Market::new(
        vec![
            AssetConfig::new("A", 100.0, 1000.0),
            AssetConfig::new("B", 80.0, 1000.0).with_initial_spread(-20.0),
        ],
        AssetId::new("A"),
        RiskConfidence::default(),
        0.01,
    )
    .unwrap();
    let mut book = OrderBook::new(market.asset_ids());
    let mut mm = MarketMaker::new()
        .with_shock("A", Box::new(SequenceGenerator::new(shocks_a)))
        .with_shock("B", Box::new(SequenceGenerator::new(shocks_b)));
    for t in 0..=ticks {
        mm.clear(Tick(t), &mut market, &mut book).unwrap();
    }
    market
}

fn window_returns(market: &Market, asset: &str, to: u64, window: usize) -> Vec<f64> {
    let from = to + 1 - window as u64;
    (from..=to)
        .map(|t| market.log_return(&AssetId::new(asset), Tick(t)).unwrap())
        .collect()
}

proptest! {
    /// Sliding the window gives the same covariance as recomputing it
    #[test]
    fn incremental_matches_full_recompute(
        window in 2usize..8,
        shocks_a in shock_strategy(40),
        shocks_b in shock_strategy(40),
    ) {
        let market = two_asset_market(shocks_a, shocks_b, 40);
        let mut tracker = CovarianceTracker::new(vec![AssetId::new("A"), AssetId::new("B")], window).unwrap();
        let (a, b) = (AssetId::new("A"), AssetId::new("B"));

        for t in 0..=40u64 {
            let outcome = tracker.update(Tick(t), &market).unwrap();
            if (t as usize) < window {
                prop_assert_eq!(outcome.mode, UpdateMode::Inert);
                continue;
            }
            let ra = window_returns(&market, "A", t, window);
            let rb = window_returns(&market, "B", t, window);
            let expected_ab = sample_covariance(&ra, &rb).unwrap();
            let expected_bb = sample_covariance(&rb, &rb).unwrap();
            prop_assert!((tracker.covariance(&a, &b).unwrap() - expected_ab).abs() < 1e-10);
            prop_assert!((tracker.covariance(&b, &b).unwrap() - expected_bb).abs() < 1e-10);
        }
    }

    /// position(t) = position(t-1) + sum of orders applied at t
    #[test]
    fn position_is_sum_of_orders(
        orders in prop::collection::vec(prop::collection::vec(quantity_strategy(), 0..5), 1..20),
    ) {
        let asset = AssetId::new("A");
        let mut portfolio = Portfolio::new([asset.clone()]);
        let mut expected = Decimal::ZERO;

        for (t, batch) in orders.iter().enumerate() {
            let tick = Tick(t as u64);
            portfolio.open(tick).unwrap();
            let before = portfolio.prior_position(&asset);
            prop_assert_eq!(before.value(), expected);

            for q in batch {
                portfolio.apply(&Order::new(asset.clone(), Quantity::new(*q))).unwrap();
            }
            let applied: Decimal = batch.iter().sum();
            expected += applied;
            prop_assert_eq!(portfolio.position_at(&asset, tick).unwrap().value(), before.value() + applied);
        }
    }

    /// No exposure, no risk, whatever the covariance
    #[test]
    fn zero_exposure_zero_risk(
        var_a in 0.0f64..1.0,
        var_b in 0.0f64..1.0,
        cov in -1.0f64..1.0,
    ) {
        let mut matrix = CovarianceMatrix::zeros(vec![AssetId::new("A"), AssetId::new("B")]);
        matrix.set(0, 0, var_a);
        matrix.set(1, 1, var_b);
        matrix.set(0, 1, cov);
        let flat = Exposure::new(vec![0.0, 0.0]);
        prop_assert_eq!(value_at_risk(&flat, &matrix, 0.99), 0.0);
        prop_assert_eq!(expected_shortfall(&flat, &matrix, 0.975), 0.0);
    }

    /// Stressed intensity never falls and only moves to a new maximum
    #[test]
    fn stress_ratchet_is_monotone(
        window in 2usize..6,
        shocks_a in shock_strategy(30),
        shocks_b in shock_strategy(30),
    ) {
        let market = two_asset_market(shocks_a, shocks_b, 30);
        let mut tracker = CovarianceTracker::new(vec![AssetId::new("A"), AssetId::new("B")], window).unwrap();
        let mut max_seen: Option<f64> = None;

        for t in 0..=30u64 {
            let outcome = tracker.update(Tick(t), &market).unwrap();
            let Some(stressed) = tracker.stressed_intensity() else {
                continue;
            };
            if let Some(prev) = max_seen {
                prop_assert!(stressed >= prev);
                prop_assert_eq!(outcome.stress_updated, outcome.regime_intensity > prev);
            }
            prop_assert!(stressed >= outcome.regime_intensity);
            prop_assert_eq!(tracker.stressed().regime_intensity(), stressed);
            max_seen = Some(stressed);
        }
    }

    /// VaR and ES scale linearly with the book
    #[test]
    fn risk_is_homogeneous(
        dollars_a in 1.0f64..1e6,
        dollars_b in 1.0f64..1e6,
        k in 0.01f64..10.0,
    ) {
        let mut matrix = CovarianceMatrix::zeros(vec![AssetId::new("A"), AssetId::new("B")]);
        matrix.set(0, 0, 0.0004);
        matrix.set(1, 1, 0.0009);
        matrix.set(0, 1, 0.0002);
        let base = Exposure::new(vec![dollars_a, dollars_b]);
        let scaled = Exposure::new(vec![dollars_a * k, dollars_b * k]);
        let var = value_at_risk(&base, &matrix, 0.99);
        let es = expected_shortfall(&base, &matrix, 0.975);
        prop_assert!((value_at_risk(&scaled, &matrix, 0.99) - k * var).abs() <= 1e-9 * k * var);
        prop_assert!((expected_shortfall(&scaled, &matrix, 0.975) - k * es).abs() <= 1e-9 * k * es);
    }
}
