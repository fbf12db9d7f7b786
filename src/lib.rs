// varmarket-core: multi-asset agent market with VaR/ES-constrained traders.
// risk-feedback architecture: forced de-risking feeds back into prices.
// all computation is deterministic given seeded generators, no external I/O.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: AssetId, TraderId, Tick, Quantity, Price
//   1.5  series.rs: append-only tick-indexed TimeSeries
//   1.6  context.rs: SimulationContext, tick clock + ID registry
//   2.x  market.rs: asset config, per-asset series, spreads, confidence
//   2.5  order.rs: market orders + per-tick order book
//   3.x  generator.rs: seeded shock / fundamental generators
//   4.x  market_maker.rs: price formation + fundamental updates
//   5.x  portfolio.rs: position ledger
//   5.5  stats.rs: normal quantile/density, sample covariance
//   5.6  covariance.rs: rolling covariance tracker + stress ratchet
//   6.x  risk/: VaR/ES measures, limit policies, rebalance engine
//   7.x  strategy.rs: strategy trait + reference strategies
//   8.x  trader.rs: per-tick orchestration, solvency
//   9.x  config.rs: simulation + trader config, presets
//   10.x simulation/: two-phase tick loop, reports
//   11.x events.rs: audit events

// market modules
pub mod context;
pub mod generator;
pub mod market;
pub mod market_maker;
pub mod order;
pub mod series;
pub mod types;

// risk modules
pub mod covariance;
pub mod portfolio;
pub mod risk;
pub mod stats;

// agent and run modules
pub mod config;
pub mod events;
pub mod simulation;
pub mod strategy;
pub mod trader;

// re exports for convenience
pub use config::*;
pub use context::*;
pub use covariance::*;
pub use events::*;
pub use generator::*;
pub use market::*;
pub use market_maker::*;
pub use order::*;
pub use portfolio::*;
pub use risk::*;
pub use series::*;
pub use simulation::*;
pub use strategy::*;
pub use trader::*;
pub use types::*;
