//! Process diagnostics
//!
//! PID marker file bracketing a monitoring run, for external liveness
//! inspection. Both operations are best-effort: failures are logged and
//! never abort the session.

use std::path::PathBuf;

/// Writes and removes the PID marker file
#[derive(Debug, Clone)]
pub struct ProcessDiagnostics {
    pid_path: PathBuf,
}

impl ProcessDiagnostics {
    /// Create diagnostics for the given marker path
    pub fn new(pid_path: PathBuf) -> Self {
        Self { pid_path }
    }

    /// Marker path
    pub fn pid_path(&self) -> &PathBuf {
        &self.pid_path
    }

    /// Write the current process id to the marker file
    pub async fn write_pid_file(&self) {
        if let Some(parent) = self.pid_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(error = %e, path = %parent.display(), "Failed to create PID file directory");
                return;
            }
        }
        match tokio::fs::write(&self.pid_path, std::process::id().to_string()).await {
            Ok(()) => tracing::info!(path = %self.pid_path.display(), "PID file written"),
            Err(e) => {
                tracing::warn!(error = %e, path = %self.pid_path.display(), "Failed to write PID file")
            }
        }
    }

    /// Remove the marker file if present
    pub async fn remove_pid_file(&self) {
        match tokio::fs::remove_file(&self.pid_path).await {
            Ok(()) => tracing::info!(path = %self.pid_path.display(), "PID file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(error = %e, path = %self.pid_path.display(), "Failed to remove PID file")
            }
        }
    }
}
