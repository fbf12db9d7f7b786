//! Orders and the per-tick order book.
//!
//! Orders are signed market orders with no price: positive buys, negative
//! sells. Traders append to the book during the trader phase and the market
//! maker drains it in full on the next clearing pass. There is no queue
//! priority, only the net flow per asset matters for price formation.

use crate::types::{AssetId, Quantity, TraderId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A market order for one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub asset: AssetId,
    pub quantity: Quantity,
}

impl Order {
    pub fn new(asset: impl Into<AssetId>, quantity: Quantity) -> Self {
        Self {
            asset: asset.into(),
            quantity,
        }
    }

    pub fn is_dust(&self) -> bool {
        self.quantity.is_dust()
    }
}

/// Why an order was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderOrigin {
    /// Desired trade emitted by a strategy.
    Strategy,
    /// Corrective trade emitted by the risk engine to get back under a limit.
    RiskReduction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookEntry {
    pub trader: TraderId,
    pub order: Order,
    pub origin: OrderOrigin,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    known_assets: BTreeSet<AssetId>,
    pending: BTreeMap<AssetId, Vec<BookEntry>>,
}

impl OrderBook {
    pub fn new<'a>(assets: impl IntoIterator<Item = &'a AssetId>) -> Self {
        Self {
            known_assets: assets.into_iter().cloned().collect(),
            pending: BTreeMap::new(),
        }
    }

    /// Append an order. Dust orders are dropped and reported as `Ok(false)`.
    pub fn submit(
        &mut self,
        trader: TraderId,
        order: Order,
        origin: OrderOrigin,
    ) -> Result<bool, OrderError> {
        if !self.known_assets.contains(&order.asset) {
            return Err(OrderError::UnknownAsset(order.asset));
        }
        if order.is_dust() {
            return Ok(false);
        }
        self.pending
            .entry(order.asset.clone())
            .or_default()
            .push(BookEntry {
                trader,
                order,
                origin,
            });
        Ok(true)
    }

    pub fn pending(&self, asset: &AssetId) -> &[BookEntry] {
        self.pending.get(asset).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Signed sum of all pending quantities for `asset`.
    pub fn net_flow(&self, asset: &AssetId) -> Quantity {
        self.pending(asset).iter().map(|e| e.order.quantity).sum()
    }

    pub fn len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.values().all(Vec::is_empty)
    }

    /// Take every pending order, leaving the book empty.
    pub fn drain(&mut self) -> BTreeMap<AssetId, Vec<BookEntry>> {
        std::mem::take(&mut self.pending)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("Order for unknown asset {0}")]
    UnknownAsset(AssetId),
}
