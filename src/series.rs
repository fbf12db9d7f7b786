//! Append-only, tick-indexed time series.
//!
//! Every market and trader record (prices, returns, positions, risk metrics)
//! is a `TimeSeries`. A tick can be written exactly once and only in
//! increasing order. The newest entry may still be amended while its tick is
//! open, which is how same-tick order application works.

use crate::types::Tick;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries<T> {
    /// Tick of the first value; unset until the first append.
    start: Option<Tick>,
    values: Vec<T>,
}

impl<T> Default for TimeSeries<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TimeSeries<T> {
    pub fn new() -> Self {
        Self {
            start: None,
            values: Vec::new(),
        }
    }

    /// Append the value for `tick`. The first append fixes the start tick;
    /// afterwards only the next consecutive tick is accepted.
    pub fn append(&mut self, tick: Tick, value: T) -> Result<(), SeriesError> {
        if let Some(expected) = self.next_tick() {
            if tick != expected {
                return Err(SeriesError::OutOfOrder { expected, got: tick });
            }
        } else {
            self.start = Some(tick);
        }
        self.values.push(value);
        Ok(())
    }

    pub fn get(&self, tick: Tick) -> Option<&T> {
        let start = self.start?;
        let offset = tick.value().checked_sub(start.value())?;
        self.values.get(offset as usize)
    }

    /// Like `get`, but a missing tick is an error.
    pub fn at(&self, tick: Tick) -> Result<&T, SeriesError> {
        self.get(tick).ok_or(SeriesError::NotRecorded {
            tick,
            last: self.last_tick(),
        })
    }

    pub fn last(&self) -> Option<&T> {
        self.values.last()
    }

    /// Mutable access to the newest entry only; recorded history is frozen.
    pub fn last_mut(&mut self) -> Option<&mut T> {
        self.values.last_mut()
    }

    pub fn first_tick(&self) -> Option<Tick> {
        self.start
    }

    pub fn last_tick(&self) -> Option<Tick> {
        let start = self.start?;
        let len = self.values.len() as u64;
        (len > 0).then(|| Tick(start.value() + len - 1))
    }

    fn next_tick(&self) -> Option<Tick> {
        self.last_tick().map(|t| t.next())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Values for ticks `from..=to`, both ends must be recorded.
    pub fn range(&self, from: Tick, to: Tick) -> Result<&[T], SeriesError> {
        let start = self.start.ok_or(SeriesError::NotRecorded {
            tick: from,
            last: None,
        })?;
        if from < start || from > to {
            return Err(SeriesError::NotRecorded {
                tick: from,
                last: self.last_tick(),
            });
        }
        if self.get(to).is_none() {
            return Err(SeriesError::NotRecorded {
                tick: to,
                last: self.last_tick(),
            });
        }
        let lo = (from.value() - start.value()) as usize;
        let hi = (to.value() - start.value()) as usize;
        Ok(&self.values[lo..=hi])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tick, &T)> {
        let start = self.start.map(|t| t.value()).unwrap_or(0);
        self.values
            .iter()
            .enumerate()
            .map(move |(i, v)| (Tick(start + i as u64), v))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeriesError {
    #[error("Out of order append: expected {expected}, got {got}")]
    OutOfOrder { expected: Tick, got: Tick },

    #[error("No value recorded at {tick} (last recorded: {last:?})")]
    NotRecorded { tick: Tick, last: Option<Tick> },
}
