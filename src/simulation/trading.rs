//! Trader phase: each trader acts on the freshly cleared prices, in
//! registration order, and its orders are queued for the next clearing pass.

use super::core::{emit_event, Simulation};
use super::results::SimulationError;
use crate::events::{
    EventPayload, ForcedSelloffEvent, OrderSubmittedEvent, RiskLimitBreachedEvent, StressRegimeUpdatedEvent,
    TraderFailedEvent,
};
use crate::trader::TraderTickReport;
use crate::types::Tick;

impl Simulation {
    pub(super) fn run_trader_phase(&mut self, tick: Tick) -> Result<(Vec<TraderTickReport>, usize), SimulationError> {
        let verbose = self.config.run.verbose;
        let mut reports = Vec::with_capacity(self.traders.len());
        let mut submitted = 0;

        for trader in self.traders.iter_mut() {
            let report = trader.trade(tick, &self.market)?;
            let id = report.trader;

            for entry in &report.orders {
                if !self.book.submit(id, entry.order.clone(), entry.origin)? {
                    continue;
                }
                submitted += 1;
                emit_event(
                    &mut self.events,
                    verbose,
                    tick,
                    EventPayload::OrderSubmitted(OrderSubmittedEvent {
                        trader: id,
                        asset: entry.order.asset.clone(),
                        quantity: entry.order.quantity,
                        origin: entry.origin,
                    }),
                );
            }

            if let Some(intensity) = report.stress_update {
                emit_event(
                    &mut self.events,
                    verbose,
                    tick,
                    EventPayload::StressRegimeUpdated(StressRegimeUpdatedEvent {
                        trader: id,
                        regime_intensity: intensity,
                    }),
                );
            }

            for breach in &report.breaches {
                emit_event(
                    &mut self.events,
                    verbose,
                    tick,
                    EventPayload::RiskLimitBreached(RiskLimitBreachedEvent {
                        trader: id,
                        measure: breach.measure,
                        total: breach.total,
                        limit: breach.limit,
                        reduction_ratio: breach.reduction_ratio,
                    }),
                );
            }

            for selloff in &report.forced_selloffs {
                emit_event(
                    &mut self.events,
                    verbose,
                    tick,
                    EventPayload::ForcedSelloff(ForcedSelloffEvent {
                        trader: id,
                        asset: selloff.asset.clone(),
                        desired: selloff.desired,
                        corrective: selloff.corrective,
                        against_desired: selloff.against_desired,
                    }),
                );
            }

            if report.failed {
                emit_event(
                    &mut self.events,
                    verbose,
                    tick,
                    EventPayload::TraderFailed(TraderFailedEvent {
                        trader: id,
                        wealth: report.wealth,
                        gross_value: report.gross_value,
                    }),
                );
            }

            reports.push(report);
        }

        Ok((reports, submitted))
    }
}
