//! Time-driven tick source: cron expression OR fixed interval, optional
//! allowed-time window, `{Stopped -> Running -> Stopped}`.

mod error;
mod scheduler;
mod window;

pub use error::{SchedulerError, SchedulerResult};
pub use scheduler::{normalize_cron_expression, RunState, Scheduler};
pub use window::TimeWindow;
