// 6.0: risk layer. parametric VaR/ES from the tracked covariance matrix,
// a volatility-driven limit, and the proportional rebalance that pulls a
// breached book back to its limit.

mod engine;
mod limit;
mod measures;

pub use engine::{
    rebalance_orders, LimitBreach, MeasureFigures, RiskAssessment, RiskCapabilities, RiskEngine, RiskError,
    RiskMeasure, RiskSnapshot,
};
pub use limit::{volatility_index, LimitPolicy, LimitSpec, VolatilityIndex};
pub use measures::{expected_shortfall, portfolio_variance, total_es, total_var, value_at_risk, Exposure};
