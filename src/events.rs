// 11.0: every observable state change produces an event. used for audit trails
// and for external reporting. the EventPayload enum lists all event types.

use crate::order::OrderOrigin;
use crate::risk::RiskMeasure;
use crate::types::{AssetId, Quantity, Tick, TraderId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub tick: Tick,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, tick: Tick, payload: EventPayload) -> Self {
        Self { id, tick, payload }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    // Clearing events
    PriceCleared(PriceClearedEvent),
    FundamentalUpdated(FundamentalUpdatedEvent),

    // Order events
    OrderSubmitted(OrderSubmittedEvent),

    // Risk events
    RiskLimitBreached(RiskLimitBreachedEvent),
    ForcedSelloff(ForcedSelloffEvent),
    StressRegimeUpdated(StressRegimeUpdatedEvent),

    // Solvency events
    TraderFailed(TraderFailedEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceClearedEvent {
    pub asset: AssetId,
    pub price: f64,
    pub log_return: f64,
    pub net_flow: Quantity,
    pub floored: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalUpdatedEvent {
    pub asset: AssetId,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSubmittedEvent {
    pub trader: TraderId,
    pub asset: AssetId,
    pub quantity: Quantity,
    pub origin: OrderOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLimitBreachedEvent {
    pub trader: TraderId,
    pub measure: RiskMeasure,
    pub total: f64,
    pub limit: f64,
    pub reduction_ratio: f64,
}

/// A corrective order the risk engine forced on top of the strategy's trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForcedSelloffEvent {
    pub trader: TraderId,
    pub asset: AssetId,
    /// What the strategies wanted this tick (zero when they were silent).
    pub desired: Quantity,
    pub corrective: Quantity,
    /// Corrective order runs against the desired direction.
    pub against_desired: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressRegimeUpdatedEvent {
    pub trader: TraderId,
    pub regime_intensity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderFailedEvent {
    pub trader: TraderId,
    pub wealth: f64,
    pub gross_value: f64,
}

pub trait EventEmitter {
    fn emit(&mut self, event: Event);
}

/// Bounded in-memory event log. oldest events are evicted past `capacity`.
#[derive(Debug, Clone)]
pub struct EventCollector {
    events: Vec<Event>,
    next_id: u64,
    capacity: usize,
}

impl Default for EventCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl EventCollector {
    pub fn new() -> Self {
        Self::with_capacity(usize::MAX)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::new(),
            next_id: 1,
            capacity,
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn recent(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    /// Events emitted during `tick` that are still retained.
    pub fn at_tick(&self, tick: Tick) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.tick == tick)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn next_id(&mut self) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Stamp `payload` with the next id and record it.
    pub fn record(&mut self, tick: Tick, payload: EventPayload) -> EventId {
        let id = self.next_id();
        self.emit(Event::new(id, tick, payload));
        id
    }
}

impl EventEmitter for EventCollector {
    fn emit(&mut self, event: Event) {
        self.events.push(event);
        if self.events.len() > self.capacity {
            let drain_count = self.events.len() - self.capacity;
            self.events.drain(0..drain_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fundamental(value: f64) -> EventPayload {
        EventPayload::FundamentalUpdated(FundamentalUpdatedEvent {
            asset: AssetId::new("A"),
            value,
        })
    }

    #[test]
    fn event_collector() {
        let mut collector = EventCollector::new();
        let id = collector.record(Tick(3), fundamental(101.0));
        assert_eq!(id, EventId(1));
        assert_eq!(collector.events().len(), 1);
        assert_eq!(collector.at_tick(Tick(3)).count(), 1);

        collector.clear();
        assert!(collector.events().is_empty());
        assert_eq!(collector.next_id(), EventId(2));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut collector = EventCollector::with_capacity(2);
        for t in 0..5 {
            collector.record(Tick(t), fundamental(t as f64));
        }
        let ids: Vec<u64> = collector.events().iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![4, 5]);
        assert_eq!(collector.recent(1)[0].tick, Tick(4));
    }

    #[test]
    fn forced_selloff_event() {
        let event = ForcedSelloffEvent {
            trader: TraderId(1),
            asset: AssetId::new("B"),
            desired: Quantity::new(dec!(-10)),
            corrective: Quantity::new(dec!(4)),
            against_desired: true,
        };
        assert_eq!(event.corrective.value(), dec!(4));
        assert!(event.against_desired);
    }
}
