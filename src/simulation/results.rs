// 10.0.2: result types and errors for simulation runs.

use crate::config::ConfigError;
use crate::market::MarketError;
use crate::market_maker::ClearingReport;
use crate::order::OrderError;
use crate::trader::{SolvencyState, TraderError, TraderTickReport};
use crate::types::{AssetId, Tick, TraderId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick: Tick,
    pub clearing: Option<ClearingReport>,
    pub fundamentals: Vec<(AssetId, f64)>,
    pub traders: Vec<TraderTickReport>,
    pub orders_submitted: usize,
    pub failures: Vec<TraderId>,
}

/// Where one trader ended up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderOutcome {
    pub trader: TraderId,
    pub name: String,
    pub state: SolvencyState,
    pub failure_tick: Option<Tick>,
    pub wealth: f64,
    pub gross_value: f64,
    pub forced_selloffs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub first_tick: Option<Tick>,
    pub last_tick: Option<Tick>,
    pub ticks_run: u64,
    pub traders: Vec<TraderOutcome>,
    pub failures: usize,
    pub events_retained: usize,
}

impl SimulationReport {
    pub fn survivors(&self) -> impl Iterator<Item = &TraderOutcome> {
        self.traders.iter().filter(|t| t.state == SolvencyState::Alive)
    }

    pub fn elapsed_millis(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SimulationError {
    #[error("Trader {0} not found")]
    TraderNotFound(TraderId),

    #[error("Trader {trader} trades {asset}, which is not part of the market")]
    UnknownTraderAsset { trader: String, asset: AssetId },

    #[error("Clearing schedule must run every task once, starting with a price clearing pass")]
    InvalidClearingSchedule,

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Market error: {0}")]
    Market(#[from] MarketError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Trader error: {0}")]
    Trader(#[from] TraderError),
}
