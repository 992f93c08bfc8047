use tokio_util::sync::CancellationToken;

/// Parent cancellation handle for the whole process. Child tokens are derived
/// per-tick and per-agent-call so a single Ctrl-C cancels the tick, any
/// in-flight agent subprocess, and prevents further scheduler ticks, without
/// needing to thread a cancelled flag through every call signature.
#[derive(Clone)]
pub struct ShutdownHandle {
    root: CancellationToken,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
        }
    }

    pub fn child_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    pub fn is_cancelled(&self) -> bool {
        self.root.is_cancelled()
    }

    pub fn cancel(&self) {
        self.root.cancel();
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}
