// 2.0: per-run simulation context. owns the tick clock and the ID registry.
// passed explicitly to everything that needs the current tick, so several
// simulations can live in one process without sharing state.

use crate::types::{Tick, TraderId};
use serde::{Deserialize, Serialize};

/// Monotonic tick counter for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeSource {
    current: Option<Tick>,
}

impl TimeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to the next tick. The first call yields tick 0.
    pub fn advance(&mut self) -> Tick {
        let next = match self.current {
            Some(tick) => tick.next(),
            None => Tick::ZERO,
        };
        self.current = Some(next);
        next
    }

    /// None before the first `advance`.
    pub fn current(&self) -> Option<Tick> {
        self.current
    }
}

// 2.1: sequential IDs scoped to one run. no reset needed before construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdRegistry {
    next_trader_id: u64,
}

impl Default for IdRegistry {
    fn default() -> Self {
        Self { next_trader_id: 1 }
    }
}

impl IdRegistry {
    pub fn next_trader_id(&mut self) -> TraderId {
        let id = TraderId(self.next_trader_id);
        self.next_trader_id += 1;
        id
    }

    pub fn traders_issued(&self) -> u64 {
        self.next_trader_id - 1
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationContext {
    clock: TimeSource,
    ids: IdRegistry,
}

impl SimulationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self) -> Tick {
        self.clock.advance()
    }

    pub fn tick(&self) -> Option<Tick> {
        self.clock.current()
    }

    /// Tick that the next `advance` will produce.
    pub fn upcoming_tick(&self) -> Tick {
        self.clock.current().map(|t| t.next()).unwrap_or(Tick::ZERO)
    }

    pub fn ids(&mut self) -> &mut IdRegistry {
        &mut self.ids
    }
}
