// 10.1 simulation/core.rs: main simulation. holds the market, the book, the
// market maker and every trader. one call to step() is one tick.

use super::clearing::ClearingTask;
use super::results::{SimulationError, SimulationReport, TickReport, TraderOutcome};
use crate::config::{SimulationConfig, TraderConfig};
use crate::context::SimulationContext;
use crate::events::{Event, EventCollector, EventPayload};
use crate::market::Market;
use crate::market_maker::MarketMaker;
use crate::order::OrderBook;
use crate::strategy::Strategy;
use crate::trader::Trader;
use crate::types::{Tick, TraderId};
use chrono::Utc;
use std::fmt;

/// Called after the trader phase of every tick.
pub trait TickObserver: Send {
    fn on_tick(&mut self, report: &TickReport, market: &Market, traders: &[Trader]);
}

impl<F> TickObserver for F
where
    F: FnMut(&TickReport, &Market, &[Trader]) + Send,
{
    fn on_tick(&mut self, report: &TickReport, market: &Market, traders: &[Trader]) {
        self(report, market, traders)
    }
}

/** 10.1: main simulation struct. all state lives here */
pub struct Simulation {
    pub(super) config: SimulationConfig,
    pub(super) ctx: SimulationContext,
    pub(super) market: Market,
    pub(super) book: OrderBook,
    pub(super) market_maker: MarketMaker,
    pub(super) clearing: Vec<ClearingTask>,
    pub(super) traders: Vec<Trader>,
    pub(super) events: EventCollector,
    pub(super) observers: Vec<Box<dyn TickObserver>>,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.ctx.tick())
            .field("market", &self.market)
            .field("traders", &self.traders)
            .field("events", &self.events.events().len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Simulation {
    pub fn new(config: SimulationConfig, market_maker: MarketMaker) -> Result<Self, SimulationError> {
        let market = config.build_market()?;
        market_maker.validate(&market)?;
        let book = OrderBook::new(market.asset_ids());
        let events = EventCollector::with_capacity(config.run.max_events);
        Ok(Self {
            config,
            ctx: SimulationContext::new(),
            market,
            book,
            market_maker,
            clearing: ClearingTask::default_schedule(),
            traders: Vec::new(),
            events,
            observers: Vec::new(),
        })
    }

    /// Replace the clearing-phase task list. Every task runs exactly once
    /// and prices must clear first.
    pub fn with_clearing_schedule(mut self, schedule: Vec<ClearingTask>) -> Result<Self, SimulationError> {
        let required = ClearingTask::default_schedule();
        let each_once = schedule.len() == required.len()
            && required
                .iter()
                .all(|task| schedule.iter().filter(|t| *t == task).count() == 1);
        if !each_once || schedule.first() != Some(&ClearingTask::ClearPrices) {
            return Err(SimulationError::InvalidClearingSchedule);
        }
        self.clearing = schedule;
        Ok(self)
    }

    /// Register a trader. It takes part from the next tick onward.
    pub fn add_trader(
        &mut self,
        config: TraderConfig,
        strategies: Vec<Box<dyn Strategy>>,
    ) -> Result<TraderId, SimulationError> {
        for strategy in &strategies {
            for asset in strategy.asset_ids() {
                if !self.market.contains(&asset) {
                    return Err(SimulationError::UnknownTraderAsset {
                        trader: config.name.clone(),
                        asset,
                    });
                }
            }
        }
        let id = self.ctx.ids().next_trader_id();
        let trader = Trader::new(id, config, strategies)?;
        tracing::debug!(trader = %id, name = trader.name(), "trader registered");
        self.traders.push(trader);
        Ok(id)
    }

    pub fn add_observer(&mut self, observer: Box<dyn TickObserver>) {
        self.observers.push(observer);
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    pub fn current_tick(&self) -> Option<Tick> {
        self.ctx.tick()
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn clearing_schedule(&self) -> &[ClearingTask] {
        &self.clearing
    }

    pub fn traders(&self) -> &[Trader] {
        &self.traders
    }

    pub fn trader(&self, id: TraderId) -> Result<&Trader, SimulationError> {
        self.traders
            .iter()
            .find(|t| t.id() == id)
            .ok_or(SimulationError::TraderNotFound(id))
    }

    pub fn events(&self) -> &[Event] {
        self.events.events()
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        self.events.recent(count)
    }

    /// Advance one tick: clearing phase, then trader phase, then observers.
    pub fn step(&mut self) -> Result<TickReport, SimulationError> {
        let tick = self.ctx.advance();

        let (clearing, fundamentals) = self.run_clearing_phase(tick)?;
        let (traders, orders_submitted) = self.run_trader_phase(tick)?;

        let failures = traders.iter().filter(|r| r.failed).map(|r| r.trader).collect();
        let report = TickReport {
            tick,
            clearing,
            fundamentals,
            traders,
            orders_submitted,
            failures,
        };

        tracing::debug!(
            %tick,
            orders = report.orders_submitted,
            failures = report.failures.len(),
            "tick complete"
        );

        for observer in self.observers.iter_mut() {
            observer.on_tick(&report, &self.market, &self.traders);
        }
        Ok(report)
    }

    /// Run `ticks` steps and summarize.
    pub fn run(&mut self, ticks: u64) -> Result<SimulationReport, SimulationError> {
        let started_at = Utc::now();
        let first_tick = if ticks > 0 { Some(self.ctx.upcoming_tick()) } else { None };

        for _ in 0..ticks {
            self.step()?;
        }

        let traders: Vec<TraderOutcome> = self
            .traders
            .iter()
            .map(|t| TraderOutcome {
                trader: t.id(),
                name: t.name().to_string(),
                state: t.state(),
                failure_tick: t.failure_tick(),
                wealth: t.wealth().last().copied().unwrap_or(0.0),
                gross_value: t.gross_value().last().copied().unwrap_or(0.0),
                forced_selloffs: t.forced_selloff_count(),
            })
            .collect();
        let failures = traders.iter().filter(|t| t.failure_tick.is_some()).count();

        let report = SimulationReport {
            started_at,
            finished_at: Utc::now(),
            first_tick,
            last_tick: self.ctx.tick(),
            ticks_run: ticks,
            traders,
            failures,
            events_retained: self.events.events().len(),
        };
        tracing::info!(ticks, failures, "run complete");
        Ok(report)
    }
}

pub(super) fn emit_event(events: &mut EventCollector, verbose: bool, tick: Tick, payload: EventPayload) {
    if verbose {
        tracing::info!(%tick, ?payload, "event");
    } else {
        tracing::trace!(%tick, ?payload, "event");
    }
    events.record(tick, payload);
}
