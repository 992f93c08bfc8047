use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lifecycle event emitted at every orchestrator phase/iteration boundary.
/// Fire-and-forget: publishing never blocks on a slow or absent subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NightshiftEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub phase: Option<String>,
    pub iteration: Option<u32>,
    pub task_id: Option<String>,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

impl NightshiftEvent {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            phase: None,
            iteration: None,
            task_id: None,
            duration_ms: None,
            error: None,
            at: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<NightshiftEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(2048);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NightshiftEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: NightshiftEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
