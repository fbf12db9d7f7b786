//! Run-level options.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
    /// Log every event at info level instead of trace.
    pub verbose: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_events: 100_000,
            verbose: false,
        }
    }
}
