//! Risk limit enforcement: rebalance, limit policies, ES stress multiplier.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use varmarket_core::*;

const TICKS: u64 = 12;

fn volatile_market() -> Market {
    let mut market = SimulationConfig::two_asset_example().build_market().unwrap();
    let shocks_a: Vec<f64> = (0..TICKS).map(|i| [1.2, -0.8, 2.5, -1.9][i as usize % 4]).collect();
    let shocks_b: Vec<f64> = (0..TICKS).map(|i| [-0.4, 1.1, -1.6, 0.3, 0.9][i as usize % 5]).collect();
    let mut mm = MarketMaker::new()
        .with_shock("A", Box::new(SequenceGenerator::new(shocks_a)))
        .with_shock("B", Box::new(SequenceGenerator::new(shocks_b)));
    let mut book = OrderBook::new(market.asset_ids());
    for t in 0..=TICKS {
        mm.clear(Tick(t), &mut market, &mut book).unwrap();
    }
    market
}

fn warmed_engine(market: &Market, capabilities: RiskCapabilities, policy: LimitPolicy) -> RiskEngine {
    let mut engine = RiskEngine::new(vec![AssetId::new("A"), AssetId::new("B")], 5, capabilities, policy, 3).unwrap();
    for t in 0..=TICKS {
        engine.update_statistics(Tick(t), market).unwrap();
    }
    engine
}

fn book(a: Decimal, b: Decimal) -> Portfolio {
    let mut portfolio = Portfolio::new([AssetId::new("A"), AssetId::new("B")]);
    portfolio.open(Tick(TICKS)).unwrap();
    portfolio.apply(&Order::new("A", Quantity::new(a))).unwrap();
    portfolio.apply(&Order::new("B", Quantity::new(b))).unwrap();
    portfolio
}

mod rebalance {
    use super::*;

    #[test]
    fn var_rebalance_lands_on_limit() {
        let market = volatile_market();
        for (a, b, limit) in [(dec!(50), dec!(-30), 100.0), (dec!(-80), dec!(80), 250.0), (dec!(10), dec!(0), 5.0)] {
            let mut engine = warmed_engine(&market, RiskCapabilities::var(limit), LimitPolicy::Constant);
            let mut portfolio = book(a, b);
            let before = engine.figures(RiskMeasure::Var, &portfolio, &market, Tick(TICKS));
            assert!(before.total > limit, "scenario must start in breach");

            let assessment = engine.enforce(Tick(TICKS), &market, &mut portfolio).unwrap();
            let breach = &assessment.breaches[0];
            assert!((breach.reduction_ratio - limit / before.total).abs() < 1e-12);

            let after = engine.figures(RiskMeasure::Var, &portfolio, &market, Tick(TICKS));
            assert!((after.total - limit).abs() < 1e-6 * limit, "{} vs {}", after.total, limit);
        }
    }

    #[test]
    fn es_rebalance_lands_on_limit() {
        let market = volatile_market();
        let mut engine = warmed_engine(&market, RiskCapabilities::es(120.0), LimitPolicy::Constant);
        let mut portfolio = book(dec!(60), dec!(45));
        assert!(engine.figures(RiskMeasure::Es, &portfolio, &market, Tick(TICKS)).is_breached());

        engine.enforce(Tick(TICKS), &market, &mut portfolio).unwrap();
        let after = engine.figures(RiskMeasure::Es, &portfolio, &market, Tick(TICKS));
        assert!((after.total - 120.0).abs() < 1e-6);
    }

    #[test]
    fn both_measures_end_within_limits() {
        let market = volatile_market();
        let capabilities = RiskCapabilities {
            var: Some(LimitSpec::new(150.0)),
            es: Some(LimitSpec::new(100.0)),
        };
        let mut engine = warmed_engine(&market, capabilities, LimitPolicy::Constant);
        let mut portfolio = book(dec!(70), dec!(-70));

        let assessment = engine.enforce(Tick(TICKS), &market, &mut portfolio).unwrap();
        assert!(!assessment.breaches.is_empty());
        let var = engine.figures(RiskMeasure::Var, &portfolio, &market, Tick(TICKS));
        let es = engine.figures(RiskMeasure::Es, &portfolio, &market, Tick(TICKS));
        assert!(var.total <= 150.0 * (1.0 + 1e-9));
        assert!(es.total <= 100.0 * (1.0 + 1e-9));
    }

    #[test]
    fn within_limit_is_untouched() {
        let market = volatile_market();
        let mut engine = warmed_engine(&market, RiskCapabilities::var(1e9), LimitPolicy::Constant);
        let mut portfolio = book(dec!(5), dec!(5));
        let assessment = engine.enforce(Tick(TICKS), &market, &mut portfolio).unwrap();
        assert!(assessment.breaches.is_empty());
        assert!(!assessment.snapshot.rebalanced);
        assert_eq!(portfolio.position(&AssetId::new("A")).value(), dec!(5));
    }
}

mod limits {
    use super::*;

    #[test]
    fn policies_follow_the_volatility_index() {
        let market = volatile_market();
        let spec = LimitSpec::new(1_000.0);
        let capabilities = RiskCapabilities {
            var: Some(spec),
            es: None,
        };

        let constant = warmed_engine(&market, capabilities, LimitPolicy::Constant);
        let pro = warmed_engine(&market, capabilities, LimitPolicy::Procyclical);
        let counter = warmed_engine(&market, capabilities, LimitPolicy::Countercyclical);

        let vol = pro.volatility();
        assert!(vol.is_ready());
        let (rolling, current) = (vol.rolling_mean().unwrap(), vol.current().unwrap());
        assert!(current > 0.0);

        assert_eq!(constant.effective_limit(RiskMeasure::Var), Some(1_000.0));
        let pro_limit = pro.effective_limit(RiskMeasure::Var).unwrap();
        let counter_limit = counter.effective_limit(RiskMeasure::Var).unwrap();
        assert!((pro_limit - 1_000.0 * rolling / current).abs() < 1e-9);
        assert!((counter_limit - 1_000.0 * current / rolling).abs() < 1e-9);
        // the two policies are reciprocal around the base
        assert!((pro_limit * counter_limit - 1_000.0 * 1_000.0).abs() < 1e-6);
        assert_eq!(pro.effective_limit(RiskMeasure::Es), None);
    }

    #[test]
    fn volatility_index_uses_current_matrix() {
        let market = volatile_market();
        let engine = warmed_engine(&market, RiskCapabilities::var(1.0), LimitPolicy::Procyclical);
        let expected = volatility_index(engine.tracker().current());
        assert_eq!(engine.volatility().current(), Some(expected));
    }

    #[test]
    fn base_limit_before_index_window_fills() {
        let market = volatile_market();
        let mut engine = RiskEngine::new(
            vec![AssetId::new("A"), AssetId::new("B")],
            5,
            RiskCapabilities::var(400.0),
            LimitPolicy::Procyclical,
            50,
        )
        .unwrap();
        for t in 0..=TICKS {
            engine.update_statistics(Tick(t), &market).unwrap();
        }
        assert!(!engine.volatility().is_ready());
        assert_eq!(engine.effective_limit(RiskMeasure::Var), Some(400.0));
    }
}

mod shortfall {
    use super::*;

    #[test]
    fn es_total_applies_stress_multiplier() {
        let market = volatile_market();
        let engine = warmed_engine(&market, RiskCapabilities::es(1e9), LimitPolicy::Constant);
        let portfolio = book(dec!(20), dec!(-10));
        let figures = engine.figures(RiskMeasure::Es, &portfolio, &market, Tick(TICKS));
        assert!(figures.post_trade > 0.0);
        let multiplier = (figures.stressed / figures.post_trade).max(1.0);
        assert!((figures.total - figures.post_trade * multiplier).abs() < 1e-9);
        assert!(figures.total >= figures.post_trade);
    }

    #[test]
    fn es_exceeds_var_at_same_confidence() {
        let market = volatile_market();
        let engine = warmed_engine(&market, RiskCapabilities::var(1e9), LimitPolicy::Constant);
        let portfolio = book(dec!(20), dec!(-10));
        let exposure = Exposure::from_positions(
            engine.tracker().current(),
            |a| portfolio.position(a),
            |a| market.price(a, Tick(TICKS)).ok(),
        );
        let var = value_at_risk(&exposure, engine.tracker().current(), 0.975);
        let es = expected_shortfall(&exposure, engine.tracker().current(), 0.975);
        assert!(es > var);
    }

    #[test]
    fn var_total_is_normal_plus_stressed() {
        let market = volatile_market();
        let engine = warmed_engine(&market, RiskCapabilities::var(1e9), LimitPolicy::Constant);
        let portfolio = book(dec!(20), dec!(-10));
        let figures = engine.figures(RiskMeasure::Var, &portfolio, &market, Tick(TICKS));
        assert_eq!(figures.total, figures.post_trade + figures.stressed);
        assert!(figures.stressed >= 0.0);
    }
}
