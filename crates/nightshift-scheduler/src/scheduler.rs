use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{SchedulerError, SchedulerResult};
use crate::window::TimeWindow;

#[derive(Clone)]
enum Trigger {
    Cron(cron::Schedule),
    Interval(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
}

/// Time-driven tick source: cron expression OR fixed interval, never both,
/// with an optional allowed-time window.
pub struct Scheduler {
    trigger: Trigger,
    window: Option<TimeWindow>,
    state: Arc<Mutex<RunState>>,
    cancel: Mutex<Option<CancellationToken>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Pads a 5- or 6-field cron expression to the 7-field form the `cron` crate
/// requires: seconds fixed at `0`, years left unconstrained (`*`) when the
/// field isn't given. A 7-field expression passes through unchanged.
pub fn normalize_cron_expression(expression: &str) -> String {
    let field_count = expression.split_whitespace().count();
    match field_count {
        5 => format!("0 {expression} *"),
        6 => format!("0 {expression}"),
        _ => expression.to_string(),
    }
}

impl Scheduler {
    pub fn cron(expression: &str, window: Option<TimeWindow>) -> SchedulerResult<Self> {
        let normalized = normalize_cron_expression(expression);
        let schedule = cron::Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidCron(e.to_string()))?;
        Ok(Self::new(Trigger::Cron(schedule), window))
    }

    pub fn interval(interval: Duration, window: Option<TimeWindow>) -> SchedulerResult<Self> {
        if interval.is_zero() {
            return Err(SchedulerError::NonPositiveInterval);
        }
        Ok(Self::new(Trigger::Interval(interval), window))
    }

    fn new(trigger: Trigger, window: Option<TimeWindow>) -> Self {
        Self {
            trigger,
            window,
            state: Arc::new(Mutex::new(RunState::Stopped)),
            cancel: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap()
    }

    /// Registers `callback` and begins ticking. Non-blocking: the tick loop
    /// runs on a spawned task.
    pub fn start<F, Fut>(&self, callback: F) -> SchedulerResult<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        {
            let mut state = self.state.lock().unwrap();
            if *state == RunState::Running {
                return Err(SchedulerError::AlreadyRunning);
            }
            *state = RunState::Running;
        }

        let token = CancellationToken::new();
        *self.cancel.lock().unwrap() = Some(token.clone());

        let trigger = self.trigger.clone();
        let window = self.window.clone();
        let state_handle = self.state.clone();
        let callback = Arc::new(callback);

        let join = tokio::spawn(async move {
            run_loop(trigger, window, token, callback).await;
            *state_handle.lock().unwrap() = RunState::Stopped;
        });
        *self.handle.lock().unwrap() = Some(join);
        Ok(())
    }

    /// Cancels the tick loop and waits for any in-flight callback to return.
    pub async fn stop(&self) -> SchedulerResult<()> {
        {
            let state = self.state.lock().unwrap();
            if *state == RunState::Stopped {
                return Err(SchedulerError::AlreadyStopped);
            }
        }

        let token = self.cancel.lock().unwrap().take();
        if let Some(token) = token {
            token.cancel();
        }
        let handle = self.handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        *self.state.lock().unwrap() = RunState::Stopped;
        Ok(())
    }
}

fn next_trigger_instant(trigger: &Trigger, now: chrono::DateTime<Utc>, window: Option<&TimeWindow>) -> chrono::DateTime<Utc> {
    match trigger {
        Trigger::Interval(interval) => {
            let mut next = now + chrono::Duration::from_std(*interval).unwrap_or(chrono::Duration::seconds(1));
            if let Some(window) = window {
                if !window.contains(next) {
                    next = window.next_start_after(next);
                }
            }
            next
        }
        Trigger::Cron(schedule) => schedule.after(&now).next().unwrap_or(now + chrono::Duration::days(1)),
    }
}

async fn run_loop<F, Fut>(trigger: Trigger, window: Option<TimeWindow>, cancel: CancellationToken, callback: Arc<F>)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        let now = Utc::now();
        let next = next_trigger_instant(&trigger, now, window.as_ref());
        let sleep_for = (next - now).to_std().unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(sleep_for) => {}
        }

        let fired_at = Utc::now();
        if let Some(window) = &window {
            if !window.contains(fired_at) {
                tracing::debug!("tick fired outside window, skipping callback");
                continue;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = callback() => {}
        }
    }
}
