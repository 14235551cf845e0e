//! SnapshotWriter - Durable Alert Snapshots
//!
//! ## Responsibilities
//!
//! - Persist one JPEG per alert under a crash-safe protocol
//! - Refuse work once shutdown has begun or the frame is malformed
//! - Bound every lock wait so a save can never block shutdown forever
//!
//! The final filename only ever appears via an atomic rename of a fully
//! written, fsynced temporary file in the same directory, so a reader of
//! the snapshot directory can never observe a partial image.

use crate::analysis::SuspicionLevel;
use crate::capture::Frame;
use crate::error::{Error, Result};
use crate::lifecycle::LifecycleController;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Keep only filesystem-safe characters in a filename token
pub fn sanitize_token(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// SnapshotWriter instance
pub struct SnapshotWriter {
    lifecycle: Arc<LifecycleController>,
    snapshot_dir: PathBuf,
    /// Guards in-flight writes so shutdown can wait for them
    pub(crate) write_lock: Mutex<()>,
    lock_timeout: Duration,
    jpeg_quality: u8,
}

impl SnapshotWriter {
    /// Create a writer targeting `snapshot_dir`
    pub fn new(
        lifecycle: Arc<LifecycleController>,
        snapshot_dir: PathBuf,
        lock_timeout: Duration,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            lifecycle,
            snapshot_dir,
            write_lock: Mutex::new(()),
            lock_timeout,
            jpeg_quality,
        }
    }

    /// Snapshot directory
    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    /// Persist a snapshot for one subject.
    ///
    /// Returns the final path, or None when the save was refused or failed.
    /// Failures are logged here; the caller records the alert either way.
    pub async fn save(
        &self,
        frame: &Frame,
        subject_id: &str,
        level: SuspicionLevel,
    ) -> Option<PathBuf> {
        if !self.lifecycle.is_running() {
            tracing::debug!(
                subject_id = %subject_id,
                "Skipping snapshot, session is not running"
            );
            return None;
        }
        if frame.is_empty() {
            tracing::warn!(subject_id = %subject_id, "Skipping snapshot of empty frame");
            return None;
        }

        match self.try_save(frame, subject_id, level).await {
            Ok(path) => {
                tracing::info!(
                    subject_id = %subject_id,
                    level = %level,
                    path = %path.display(),
                    "Snapshot saved"
                );
                Some(path)
            }
            Err(e) => {
                tracing::warn!(
                    subject_id = %subject_id,
                    error = %e,
                    "Snapshot save failed"
                );
                None
            }
        }
    }

    /// Wait for any in-flight write to finish, up to `timeout`.
    ///
    /// Called during terminal cleanup; returns false when the wait timed
    /// out and shutdown should proceed anyway.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.write_lock.lock()).await {
            Ok(_guard) => true,
            Err(_) => false,
        }
    }

    async fn try_save(
        &self,
        frame: &Frame,
        subject_id: &str,
        level: SuspicionLevel,
    ) -> Result<PathBuf> {
        let safe_subject = sanitize_token(subject_id);
        let safe_level = sanitize_token(level.as_str());
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let final_path = self
            .snapshot_dir
            .join(format!("{}_{}_{}.jpg", safe_level, safe_subject, stamp));
        let temp_path = self
            .snapshot_dir
            .join(format!(".{}.tmp", Uuid::new_v4().simple()));

        // Bounded wait: abort the save rather than block shutdown
        let _guard = tokio::time::timeout(self.lock_timeout, self.write_lock.lock())
            .await
            .map_err(|_| {
                Error::LockTimeout(format!(
                    "snapshot write lock not acquired within {:?}",
                    self.lock_timeout
                ))
            })?;

        // Directory may have been cleaned externally mid-session
        tokio::fs::create_dir_all(&self.snapshot_dir).await?;

        // Encode fully in memory first; an encode failure creates no file
        let jpeg = frame.encode_jpeg(self.jpeg_quality)?;

        if let Err(e) = self.write_temp(&temp_path, &jpeg).await {
            remove_best_effort(&temp_path).await;
            return Err(e);
        }

        // An asynchronous stop may have landed while encoding or writing;
        // never publish the final path once the session is stopping
        if !self.lifecycle.is_running() {
            remove_best_effort(&temp_path).await;
            return Err(Error::Internal(
                "session stopped during snapshot write".to_string(),
            ));
        }

        if let Err(e) = tokio::fs::rename(&temp_path, &final_path).await {
            remove_best_effort(&temp_path).await;
            return Err(e.into());
        }

        Ok(final_path)
    }

    /// Write bytes to the temporary path with a durability barrier
    async fn write_temp(&self, temp_path: &Path, bytes: &[u8]) -> Result<()> {
        let mut file = tokio::fs::File::create(temp_path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

async fn remove_best_effort(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove temporary snapshot file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("examwatch-snap-{}", Uuid::new_v4()))
    }

    fn running_lifecycle() -> Arc<LifecycleController> {
        let lifecycle = Arc::new(LifecycleController::new());
        lifecycle.begin().unwrap();
        lifecycle
    }

    fn writer(lifecycle: Arc<LifecycleController>, dir: PathBuf) -> SnapshotWriter {
        SnapshotWriter::new(lifecycle, dir, Duration::from_secs(5), 90)
    }

    fn temp_artifacts(dir: &Path) -> Vec<PathBuf> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.extension().map(|ext| ext == "tmp").unwrap_or(false)
                })
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    #[test]
    fn test_sanitize_token() {
        assert_eq!(sanitize_token("student-0"), "student-0");
        assert_eq!(sanitize_token("Student 0"), "Student_0");
        assert_eq!(sanitize_token("../../etc/passwd"), "______etc_passwd");
        assert_eq!(sanitize_token("a_b-C9"), "a_b-C9");
    }

    #[tokio::test]
    async fn test_save_produces_complete_decodable_image() {
        let dir = temp_dir();
        let writer = writer(running_lifecycle(), dir.clone());
        let frame = Frame::solid(32, 24, [120, 10, 10]);

        let path = writer
            .save(&frame, "student-0", SuspicionLevel::Cheating)
            .await
            .expect("save should succeed");

        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("Cheating_student-0_"));
        assert!(name.ends_with(".jpg"));

        // Immediately decodable upon return
        let bytes = std::fs::read(&path).unwrap();
        let decoded = Frame::from_jpeg(&bytes).unwrap();
        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.height(), 24);

        // No dangling temp artifacts
        assert!(temp_artifacts(&dir).is_empty());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_save_refused_when_not_running() {
        let dir = temp_dir();
        let lifecycle = Arc::new(LifecycleController::new());
        let writer = writer(lifecycle.clone(), dir.clone());
        let frame = Frame::solid(8, 8, [0, 0, 0]);

        assert!(writer
            .save(&frame, "student-0", SuspicionLevel::Suspect)
            .await
            .is_none());

        lifecycle.begin().unwrap();
        lifecycle.request_stop();
        assert!(writer
            .save(&frame, "student-0", SuspicionLevel::Suspect)
            .await
            .is_none());

        // Refusal has no side effect: the directory was never created
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_save_refused_for_empty_frame() {
        let dir = temp_dir();
        let writer = writer(running_lifecycle(), dir.clone());
        let frame = Frame::new(0, 0, Vec::new());

        assert!(writer
            .save(&frame, "student-0", SuspicionLevel::Cheating)
            .await
            .is_none());
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_no_final_file_once_stopping() {
        let dir = temp_dir();
        let lifecycle = running_lifecycle();
        let writer = writer(lifecycle.clone(), dir.clone());
        let frame = Frame::solid(16, 16, [1, 2, 3]);

        // Once stopping, no save path may publish a final file or leave
        // a temp artifact behind
        lifecycle.request_stop();
        assert!(writer
            .save(&frame, "student-0", SuspicionLevel::Cheating)
            .await
            .is_none());
        assert!(temp_artifacts(&dir).is_empty());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_stop_flipped_while_save_waits_for_lock() {
        let dir = temp_dir();
        let lifecycle = running_lifecycle();
        let writer = Arc::new(SnapshotWriter::new(
            lifecycle.clone(),
            dir.clone(),
            Duration::from_secs(5),
            90,
        ));

        // Block the save on the write lock, flip the state while it waits,
        // then let it proceed: the pre-rename re-check must discard the
        // temp file and publish nothing
        let guard = writer.write_lock.lock().await;
        let task = {
            let writer = writer.clone();
            tokio::spawn(async move {
                let frame = Frame::solid(16, 16, [1, 2, 3]);
                writer.save(&frame, "student-0", SuspicionLevel::Cheating).await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        lifecycle.request_stop();
        drop(guard);

        assert!(task.await.unwrap().is_none());
        let entries: Vec<PathBuf> = std::fs::read_dir(&dir)
            .map(|it| it.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default();
        assert!(entries.is_empty());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_lock_timeout_aborts_save() {
        let dir = temp_dir();
        let lifecycle = running_lifecycle();
        let writer = Arc::new(SnapshotWriter::new(
            lifecycle,
            dir.clone(),
            Duration::from_millis(50),
            90,
        ));

        // Hold the write lock so the save cannot acquire it in time
        let guard = writer.write_lock.lock().await;
        let frame = Frame::solid(8, 8, [9, 9, 9]);
        let result = writer
            .save(&frame, "student-0", SuspicionLevel::Suspect)
            .await;
        drop(guard);

        assert!(result.is_none());
        assert!(temp_artifacts(&dir).is_empty());

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn test_wait_idle_times_out_under_held_lock() {
        let dir = temp_dir();
        let writer = Arc::new(SnapshotWriter::new(
            running_lifecycle(),
            dir,
            Duration::from_secs(5),
            90,
        ));

        assert!(writer.wait_idle(Duration::from_millis(10)).await);

        let guard = writer.write_lock.lock().await;
        assert!(!writer.wait_idle(Duration::from_millis(10)).await);
        drop(guard);
    }
}
