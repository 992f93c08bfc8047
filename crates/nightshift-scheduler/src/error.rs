use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),

    #[error("interval must be positive")]
    NonPositiveInterval,

    #[error("invalid time of day: {0}")]
    InvalidTimeOfDay(String),

    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("scheduler already running")]
    AlreadyRunning,

    #[error("scheduler already stopped")]
    AlreadyStopped,
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
