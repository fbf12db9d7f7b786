// 10.0: simulation loop. explicit two-phase schedule per tick: clearing tasks
// (prices, then fundamentals) run in full before any trader sees the tick.
// deterministic given seeded generators, no external I/O.

mod clearing;
mod config;
mod core;
mod results;
mod trading;

pub use clearing::ClearingTask;
pub use config::RunConfig;
pub use self::core::{Simulation, TickObserver};
pub use results::{SimulationError, SimulationReport, TickReport, TraderOutcome};
