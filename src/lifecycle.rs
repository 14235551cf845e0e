//! LifecycleController - Session State Machine
//!
//! ## Responsibilities
//!
//! - Own the Stopped -> Running -> Stopping -> Stopped state machine
//! - Accept an asynchronous stop request from any task at any point
//! - Feed external termination signals into the state machine
//!
//! The state lives in an atomic cell so a stop request landing between two
//! instructions of the frame loop is observed on the next state check.
//! Every state-sensitive operation re-checks `is_running` itself instead of
//! trusting a check performed earlier in the same turn.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No session active
    Stopped,
    /// Frame loop running, alerts and snapshots allowed
    Running,
    /// Shutdown requested, no new alert or snapshot work may begin
    Stopping,
}

const STOPPED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPING: u8 = 2;

/// Lifecycle state cell shared across the session
pub struct LifecycleController {
    state: AtomicU8,
}

impl LifecycleController {
    /// Create a new controller in the Stopped state
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(STOPPED),
        }
    }

    /// Current state
    pub fn state(&self) -> LifecycleState {
        match self.state.load(Ordering::SeqCst) {
            RUNNING => LifecycleState::Running,
            STOPPING => LifecycleState::Stopping,
            _ => LifecycleState::Stopped,
        }
    }

    /// True only while the session is actively running
    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::SeqCst) == RUNNING
    }

    /// Transition Stopped -> Running at session start
    pub fn begin(&self) -> Result<()> {
        self.state
            .compare_exchange(STOPPED, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| {
                Error::Lifecycle(format!(
                    "cannot start monitoring from state {:?}",
                    self.state()
                ))
            })?;
        tracing::info!("Lifecycle: Stopped -> Running");
        Ok(())
    }

    /// Request a stop: Running -> Stopping.
    ///
    /// Safe to call from any task, any number of times. Does not wait for
    /// the current frame iteration to finish; the loop and every guarded
    /// operation observe the new state on their next check.
    pub fn request_stop(&self) {
        if self
            .state
            .compare_exchange(RUNNING, STOPPING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tracing::info!("Lifecycle: Running -> Stopping");
        }
    }

    /// Transition Stopping -> Stopped after terminal cleanup
    pub fn finish(&self) {
        if self
            .state
            .compare_exchange(STOPPING, STOPPED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tracing::info!("Lifecycle: Stopping -> Stopped");
        } else {
            tracing::warn!(state = ?self.state(), "finish() called outside Stopping state");
        }
    }

    /// Spawn a task that turns SIGINT/SIGTERM into a stop request
    pub fn spawn_signal_listener(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let lifecycle = Arc::clone(self);
        tokio::spawn(async move {
            wait_for_termination_signal().await;
            lifecycle.request_stop();
        })
    }
}

impl Default for LifecycleController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
async fn wait_for_termination_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler registration failed, falling back to SIGINT only");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "SIGINT wait failed");
            }
            tracing::info!("Received SIGINT, stopping monitoring");
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "SIGINT wait failed");
            }
            tracing::info!("Received SIGINT, stopping monitoring");
        }
        _ = term.recv() => {
            tracing::info!("Received SIGTERM, stopping monitoring");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_termination_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "SIGINT wait failed");
    }
    tracing::info!("Received interrupt, stopping monitoring");
}
