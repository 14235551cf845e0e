//! AlertThrottle - Rate-Limited Alert Records
//!
//! ## Responsibilities
//!
//! - Decide whether a suspicious observation becomes an alert
//! - Enforce the per-subject cooldown window
//! - Construct immutable alert records with an attached snapshot path
//! - Mirror every record to the durable append-only alert log
//!
//! Snapshot failure degrades the record to a null path; it never prevents
//! the alert itself from being recorded and logged.

use crate::analysis::{KeypointSet, SuspicionLevel};
use crate::capture::Frame;
use crate::error::Result;
use crate::lifecycle::LifecycleController;
use crate::snapshot::SnapshotWriter;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// One recorded alert, immutable once created
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub subject_id: String,
    pub timestamp: DateTime<Utc>,
    pub activities: Vec<String>,
    pub level: SuspicionLevel,
    /// Snapshot persistence may fail independently of the record
    pub snapshot_path: Option<PathBuf>,
    /// The triggering pose
    pub keypoints: KeypointSet,
}

/// Append-only session history, newest last
#[derive(Debug, Default)]
struct AlertHistory {
    records: Vec<AlertRecord>,
}

impl AlertHistory {
    fn push(&mut self, record: AlertRecord) {
        self.records.push(record);
    }

    /// Most recent alert time for a subject, scanning from the end
    fn last_timestamp_for(&self, subject_id: &str) -> Option<DateTime<Utc>> {
        self.records
            .iter()
            .rev()
            .find(|r| r.subject_id == subject_id)
            .map(|r| r.timestamp)
    }
}

/// AlertThrottle instance
pub struct AlertThrottle {
    lifecycle: Arc<LifecycleController>,
    snapshots: Arc<SnapshotWriter>,
    history: RwLock<AlertHistory>,
    log_path: PathBuf,
    cooldown: chrono::Duration,
}

impl AlertThrottle {
    /// Create a throttle writing its durable log to `log_path`
    pub fn new(
        lifecycle: Arc<LifecycleController>,
        snapshots: Arc<SnapshotWriter>,
        log_path: PathBuf,
        cooldown: Duration,
    ) -> Self {
        Self {
            lifecycle,
            snapshots,
            history: RwLock::new(AlertHistory::default()),
            log_path,
            cooldown: chrono::Duration::from_std(cooldown)
                .unwrap_or_else(|_| chrono::Duration::seconds(5)),
        }
    }

    /// Consider one suspicious observation for alerting.
    ///
    /// No-op unless the session is running and the subject is outside its
    /// cooldown window.
    pub async fn consider(
        &self,
        subject_id: &str,
        activities: &[String],
        level: SuspicionLevel,
        frame: &Frame,
        keypoints: &KeypointSet,
    ) {
        if !self.lifecycle.is_running() {
            tracing::debug!(
                subject_id = %subject_id,
                "Skipping alert processing, session is not running"
            );
            return;
        }

        let now = Utc::now();
        {
            let history = self.history.read().await;
            if let Some(last) = history.last_timestamp_for(subject_id) {
                if now - last <= self.cooldown {
                    tracing::trace!(
                        subject_id = %subject_id,
                        "Alert suppressed within cooldown window"
                    );
                    return;
                }
            }
        }

        let snapshot_path = self.snapshots.save(frame, subject_id, level).await;

        // The asynchronous stop may have landed while the snapshot was in
        // flight; a record assembled during shutdown is discarded
        if !self.lifecycle.is_running() {
            tracing::debug!(
                subject_id = %subject_id,
                "Discarding alert assembled during shutdown"
            );
            return;
        }

        let record = AlertRecord {
            subject_id: subject_id.to_string(),
            timestamp: now,
            activities: activities.to_vec(),
            level,
            snapshot_path,
            keypoints: keypoints.clone(),
        };

        {
            let mut history = self.history.write().await;
            history.push(record.clone());
        }

        if let Err(e) = self.append_log_line(&record).await {
            tracing::warn!(
                subject_id = %subject_id,
                error = %e,
                "Alert log append failed, record kept in memory only"
            );
        }

        tracing::info!(
            subject_id = %record.subject_id,
            level = %record.level,
            activities = ?record.activities,
            snapshot = ?record.snapshot_path,
            "Alert recorded"
        );
    }

    /// Durable log line: `timestamp - subjectId - levelName - activities`
    async fn append_log_line(&self, record: &AlertRecord) -> Result<()> {
        if let Some(parent) = self.log_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let line = format!(
            "{} - {} - {} - {}\n",
            record.timestamp.to_rfc3339(),
            record.subject_id,
            record.level,
            record.activities.join(", ")
        );

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Snapshot of the session history, oldest first
    pub async fn history(&self) -> Vec<AlertRecord> {
        self.history.read().await.records.clone()
    }

    /// Number of recorded alerts
    pub async fn count(&self) -> usize {
        self.history.read().await.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Keypoint;
    use std::collections::BTreeMap;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("examwatch-alert-{}", uuid::Uuid::new_v4()))
    }

    fn sample_keypoints() -> KeypointSet {
        let mut kps = BTreeMap::new();
        kps.insert(
            "nose".to_string(),
            Keypoint {
                x: 100.0,
                y: 60.0,
                visible: true,
            },
        );
        kps
    }

    fn throttle(root: &PathBuf, cooldown: Duration) -> (Arc<LifecycleController>, AlertThrottle) {
        let lifecycle = Arc::new(LifecycleController::new());
        lifecycle.begin().unwrap();
        let snapshots = Arc::new(SnapshotWriter::new(
            lifecycle.clone(),
            root.join("snapshots"),
            Duration::from_secs(5),
            90,
        ));
        let throttle = AlertThrottle::new(
            lifecycle.clone(),
            snapshots,
            root.join("alerts.log"),
            cooldown,
        );
        (lifecycle, throttle)
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_repeat_alerts() {
        let root = temp_root();
        let (_lifecycle, throttle) = throttle(&root, Duration::from_secs(5));
        let frame = Frame::solid(16, 16, [40, 40, 40]);
        let kps = sample_keypoints();
        let activities = vec!["looking away".to_string()];

        for _ in 0..3 {
            throttle
                .consider("student-0", &activities, SuspicionLevel::Cheating, &frame, &kps)
                .await;
        }

        assert_eq!(throttle.count().await, 1);
        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_alert_allowed_after_cooldown_elapses() {
        let root = temp_root();
        let (_lifecycle, throttle) = throttle(&root, Duration::from_millis(100));
        let frame = Frame::solid(16, 16, [40, 40, 40]);
        let kps = sample_keypoints();
        let activities = vec!["leaning".to_string()];

        throttle
            .consider("student-0", &activities, SuspicionLevel::Suspect, &frame, &kps)
            .await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        throttle
            .consider("student-0", &activities, SuspicionLevel::Suspect, &frame, &kps)
            .await;

        let history = throttle.history().await;
        assert_eq!(history.len(), 2);
        // Never two alerts for the same subject within the window
        let gap = history[1].timestamp - history[0].timestamp;
        assert!(gap > chrono::Duration::milliseconds(100));

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_cooldown_is_per_subject() {
        let root = temp_root();
        let (_lifecycle, throttle) = throttle(&root, Duration::from_secs(5));
        let frame = Frame::solid(16, 16, [40, 40, 40]);
        let kps = sample_keypoints();
        let activities = vec!["turning".to_string()];

        throttle
            .consider("student-0", &activities, SuspicionLevel::Cheating, &frame, &kps)
            .await;
        throttle
            .consider("student-1", &activities, SuspicionLevel::Cheating, &frame, &kps)
            .await;

        assert_eq!(throttle.count().await, 2);
        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_snapshot_failure_still_records_alert() {
        let root = temp_root();
        let (_lifecycle, throttle) = throttle(&root, Duration::from_secs(5));
        // An empty frame is refused by the snapshot writer, so the path
        // degrades to None while the record is still created and logged
        let frame = Frame::new(0, 0, Vec::new());
        let kps = sample_keypoints();
        let activities = vec!["phone".to_string()];

        throttle
            .consider("student-0", &activities, SuspicionLevel::Cheating, &frame, &kps)
            .await;

        let history = throttle.history().await;
        assert_eq!(history.len(), 1);
        assert!(history[0].snapshot_path.is_none());

        let log = tokio::fs::read_to_string(root.join("alerts.log"))
            .await
            .unwrap();
        assert!(log.contains("student-0 - Cheating - phone"));

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_no_alert_once_stopping() {
        let root = temp_root();
        let (lifecycle, throttle) = throttle(&root, Duration::from_secs(5));
        lifecycle.request_stop();

        let frame = Frame::solid(16, 16, [40, 40, 40]);
        let kps = sample_keypoints();
        throttle
            .consider(
                "student-0",
                &["whispering".to_string()],
                SuspicionLevel::Cheating,
                &frame,
                &kps,
            )
            .await;

        assert_eq!(throttle.count().await, 0);
        assert!(!root.join("alerts.log").exists());
        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_stop_during_snapshot_write_commits_nothing() {
        let root = temp_root();
        let lifecycle = Arc::new(LifecycleController::new());
        lifecycle.begin().unwrap();
        let snapshots = Arc::new(SnapshotWriter::new(
            lifecycle.clone(),
            root.join("snapshots"),
            Duration::from_secs(5),
            90,
        ));
        let throttle = Arc::new(AlertThrottle::new(
            lifecycle.clone(),
            snapshots.clone(),
            root.join("alerts.log"),
            Duration::from_secs(5),
        ));

        // Block the snapshot save on its write lock so the stop request
        // lands mid-call, after the throttle's initial running check
        let guard = snapshots.write_lock.lock().await;
        let task = {
            let throttle = throttle.clone();
            tokio::spawn(async move {
                let frame = Frame::solid(16, 16, [5, 5, 5]);
                throttle
                    .consider(
                        "student-0",
                        &["leaning".to_string()],
                        SuspicionLevel::Cheating,
                        &frame,
                        &sample_keypoints(),
                    )
                    .await;
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        lifecycle.request_stop();
        drop(guard);
        task.await.unwrap();

        // No record, no log line, no final file, no temp artifact
        assert_eq!(throttle.count().await, 0);
        assert!(!root.join("alerts.log").exists());
        let leftovers: Vec<PathBuf> = std::fs::read_dir(root.join("snapshots"))
            .map(|it| it.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default();
        assert!(leftovers.is_empty());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_log_line_format() {
        let root = temp_root();
        let (_lifecycle, throttle) = throttle(&root, Duration::from_secs(5));
        let frame = Frame::solid(16, 16, [40, 40, 40]);
        let kps = sample_keypoints();

        throttle
            .consider(
                "student-3",
                &["looking away".to_string(), "leaning".to_string()],
                SuspicionLevel::Suspect,
                &frame,
                &kps,
            )
            .await;

        let log = tokio::fs::read_to_string(root.join("alerts.log"))
            .await
            .unwrap();
        let line = log.lines().next().unwrap();
        let parts: Vec<&str> = line.splitn(4, " - ").collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[1], "student-3");
        assert_eq!(parts[2], "Suspect");
        assert_eq!(parts[3], "looking away, leaning");

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
