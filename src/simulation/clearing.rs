//! Clearing phase: market-wide updates that every trader must see before
//! it acts on a tick.

use super::core::{emit_event, Simulation};
use super::results::SimulationError;
use crate::events::{EventPayload, FundamentalUpdatedEvent, PriceClearedEvent};
use crate::market_maker::ClearingReport;
use crate::types::{AssetId, Tick};
use serde::{Deserialize, Serialize};

/// One clearing-phase callback. Tasks run in list order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClearingTask {
    /// Turn the previous tick's order flow into prices, returns and spreads.
    ClearPrices,
    /// Append this tick's fundamental values.
    UpdateFundamentals,
}

impl ClearingTask {
    pub fn default_schedule() -> Vec<ClearingTask> {
        vec![ClearingTask::ClearPrices, ClearingTask::UpdateFundamentals]
    }
}

impl Simulation {
    pub(super) fn run_clearing_phase(
        &mut self,
        tick: Tick,
    ) -> Result<(Option<ClearingReport>, Vec<(AssetId, f64)>), SimulationError> {
        let verbose = self.config.run.verbose;
        let mut clearing = None;
        let mut fundamentals = Vec::new();

        for task in self.clearing.clone() {
            match task {
                ClearingTask::ClearPrices => {
                    let report = self.market_maker.clear(tick, &mut self.market, &mut self.book)?;
                    for asset in &report.assets {
                        emit_event(
                            &mut self.events,
                            verbose,
                            tick,
                            EventPayload::PriceCleared(PriceClearedEvent {
                                asset: asset.asset.clone(),
                                price: asset.price,
                                log_return: asset.log_return,
                                net_flow: asset.net_flow,
                                floored: asset.floored,
                            }),
                        );
                        if asset.floored {
                            tracing::warn!(%tick, asset = %asset.asset, price = asset.price, "price hit the floor");
                        }
                    }
                    clearing = Some(report);
                }
                ClearingTask::UpdateFundamentals => {
                    fundamentals = self.market_maker.update_fundamentals(tick, &mut self.market)?;
                    for (asset, value) in &fundamentals {
                        emit_event(
                            &mut self.events,
                            verbose,
                            tick,
                            EventPayload::FundamentalUpdated(FundamentalUpdatedEvent {
                                asset: asset.clone(),
                                value: *value,
                            }),
                        );
                    }
                }
            }
        }

        Ok((clearing, fundamentals))
    }
}
