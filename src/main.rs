//! Risk-constrained market simulation.
//!
//! Runs the reference scenarios: the two-asset VaR example, a comparison of
//! limit policies under shared shocks, and an ES-constrained book trading
//! against drifting fundamentals.

use rust_decimal_macros::dec;
use varmarket_core::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .init();

    println!("VaR/ES Constrained Market Simulation");
    println!("Market maker price formation, rolling covariance, forced de-risking\n");

    scenario_1_two_asset_example()?;
    scenario_2_limit_policies()?;
    scenario_3_es_fundamentalists()?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

/// +10 A / -10 B every tick against a VaR limit of 500.
fn scenario_1_two_asset_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("Scenario 1: Two-Asset VaR Example\n");

    let mm = MarketMaker::new()
        .with_shock("A", Box::new(GaussianGenerator::new(0.0, 0.5, 1)?))
        .with_shock("B", Box::new(GaussianGenerator::new(0.0, 0.5, 2)?));
    let mut sim = Simulation::new(SimulationConfig::two_asset_example(), mm)?;

    let strategy = FixedFlowStrategy::new("pair").with_flow("A", dec!(10)).with_flow("B", dec!(-10));
    let id = sim.add_trader(TraderConfig::var_constrained(), vec![Box::new(strategy)])?;

    for _ in 0..=5 {
        sim.step()?;
    }
    let trader = sim.trader(id)?;
    let (a, b) = (AssetId::new("A"), AssetId::new("B"));
    if let Some(risk) = trader.risk() {
        println!("  First window filled at tick 5");
        println!(
            "  Cov(A,B) = {:.3e}, Var(A) = {:.3e}",
            risk.tracker().covariance(&a, &b).unwrap_or(0.0),
            risk.tracker().covariance(&a, &a).unwrap_or(0.0)
        );
    }

    let report = sim.run(25)?;
    let trader = sim.trader(id)?;
    if let Some(snapshot) = trader.risk().and_then(|r| r.history().last()) {
        if let Some(var) = snapshot.var {
            println!(
                "  Tick {}: post-trade VaR {:.2}, stressed {:.2}, total {:.2}, limit {:.2}",
                snapshot.tick, var.post_trade, var.stressed, var.total, var.limit
            );
        }
    }
    println!(
        "  Positions: A {}, B {}",
        trader.portfolio().position(&a),
        trader.portfolio().position(&b)
    );
    println!(
        "  Forced sell-offs on {} ticks, events retained: {}\n",
        trader.forced_selloff_count(),
        report.events_retained
    );
    Ok(())
}

/// Same book under constant, procyclical and countercyclical VaR limits.
fn scenario_2_limit_policies() -> Result<(), Box<dyn std::error::Error>> {
    println!("Scenario 2: Limit Policies Under Shared Shocks\n");

    let config = SimulationConfig::three_asset_stress();
    let mut mm = MarketMaker::new();
    for (seed, asset) in ["A", "B", "C"].into_iter().enumerate() {
        mm = mm.with_shock(asset, Box::new(GaussianGenerator::new(0.0, 1.0, 100 + seed as u64)?));
    }
    let mut sim = Simulation::new(config, mm)?;

    let assets = || [AssetId::new("A"), AssetId::new("B"), AssetId::new("C")];
    for policy in [LimitPolicy::Constant, LimitPolicy::Procyclical, LimitPolicy::Countercyclical] {
        let trader = TraderConfig::var_constrained()
            .named(format!("{policy:?}").to_lowercase())
            .with_capabilities(RiskCapabilities::var(2_000.0))
            .with_policy(policy)
            .with_window(10)
            .with_vol_index_window(10);
        let momentum = MomentumStrategy::new("momentum", assets(), dec!(20));
        let anchor = FixedFlowStrategy::new("anchor").with_flow("A", dec!(5)).with_flow("C", dec!(-5));
        sim.add_trader(trader, vec![Box::new(momentum), Box::new(anchor)])?;
    }

    let report = sim.run(200)?;
    for outcome in &report.traders {
        let status = match outcome.failure_tick {
            Some(t) => format!("failed at {t}"),
            None => "alive".to_string(),
        };
        println!(
            "  {:<16} forced sell-offs {:>3}, wealth {:>10.2}, gross {:>10.2}, {}",
            outcome.name, outcome.forced_selloffs, outcome.wealth, outcome.gross_value, status
        );
    }
    for asset in sim.market().asset_ids() {
        if let Some(price) = sim.market().latest_price(asset) {
            println!("  {} closes at {}", asset, price);
        }
    }
    println!();
    Ok(())
}

/// Fundamentalists under an ES limit while fundamentals random-walk.
fn scenario_3_es_fundamentalists() -> Result<(), Box<dyn std::error::Error>> {
    println!("Scenario 3: ES-Constrained Fundamentalists\n");

    let mm = MarketMaker::new()
        .with_shock("A", Box::new(GaussianGenerator::new(0.0, 0.3, 7)?))
        .with_shock("B", Box::new(GaussianGenerator::new(0.0, 0.3, 8)?))
        .with_fundamental("A", Box::new(RandomWalkGenerator::new(100.0, 1.0, 9)?.with_floor(1.0)))
        .with_fundamental("B", Box::new(RandomWalkGenerator::new(100.0, 1.0, 10)?.with_floor(1.0)));
    let mut sim = Simulation::new(SimulationConfig::two_asset_example(), mm)?;

    let mut breaches = 0usize;
    sim.add_observer(Box::new(move |report: &TickReport, _: &Market, _: &[Trader]| {
        breaches += report.traders.iter().map(|t| t.breaches.len()).sum::<usize>();
        if report.tick.value() % 50 == 49 {
            println!("  Through tick {}: {} ES breaches", report.tick, breaches);
        }
    }));

    for i in 0..3 {
        let fundamentalist = FundamentalistStrategy::new(
            "value",
            [AssetId::new("A"), AssetId::new("B")],
            200.0 + 100.0 * i as f64,
            dec!(25),
        );
        sim.add_trader(
            TraderConfig::es_constrained().named(format!("value-{i}")),
            vec![Box::new(fundamentalist)],
        )?;
    }

    let report = sim.run(150)?;
    println!(
        "  {} of {} traders survived, {} events retained",
        report.survivors().count(),
        report.traders.len(),
        report.events_retained
    );
    Ok(())
}
