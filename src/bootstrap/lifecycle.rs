use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Lifecycle state machine
///
/// States:
/// 1. Initializing - configuration loaded, components constructed
/// 2. Running - bridge subscribed, messages flowing
/// 3. ShuttingDown - signal received, bridge disconnecting, forwarder draining
/// 4. Stopped - all tasks finished or abandoned
///
/// Transitions only move forward; repeating one is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Initializing,
    Running,
    ShuttingDown,
    Stopped,
}

/// Publishes the current [`Phase`] to interested tasks.
#[derive(Debug)]
pub struct Lifecycle {
    phase: watch::Sender<Phase>,
}

impl Lifecycle {
    pub fn new() -> Arc<Self> {
        let (phase, _) = watch::channel(Phase::Initializing);
        Arc::new(Self { phase })
    }

    /// Get current phase
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Subscribe to phase changes
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Move forward to `to`. Returns false if already there or past it.
    fn advance(&self, to: Phase) -> bool {
        let advanced = self.phase.send_if_modified(|phase| {
            if *phase < to {
                *phase = to;
                true
            } else {
                false
            }
        });

        if advanced {
            info!(phase = ?to, "lifecycle transition");
        }
        advanced
    }

    pub fn mark_running(&self) -> bool {
        self.advance(Phase::Running)
    }

    /// Start shutting down. Only the first call returns true.
    pub fn begin_shutdown(&self) -> bool {
        self.advance(Phase::ShuttingDown)
    }

    pub fn mark_stopped(&self) -> bool {
        self.advance(Phase::Stopped)
    }

    /// Wait until the phase reaches `phase` or later.
    pub async fn wait_for(&self, phase: Phase) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|current| *current >= phase).await;
    }
}
