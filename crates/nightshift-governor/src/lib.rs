//! Budget Governor, Trend Analyzer, and SnapshotCollector: the components
//! that decide whether a tick may run and keep the historical data that
//! decision is forecast from.

mod budget;
mod snapshot_collector;
mod trend;

pub use budget::{BudgetGovernor, GovernorConfig};
pub use snapshot_collector::SnapshotCollector;
pub use trend::TrendAnalyzer;
