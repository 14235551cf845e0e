//! Monitoring configuration
//!
//! Explicit configuration struct resolved once at startup and passed into
//! the session constructor. No process-wide singleton.

use std::path::PathBuf;
use std::time::Duration;

/// Exam id used when none is given on the command line
pub const DEFAULT_EXAM_ID: &str = "default";

/// PID marker file name inside the snapshot directory
pub const PID_FILE_NAME: &str = "detection.pid";

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    /// Local video device index (/dev/video{n})
    Device(u32),
    /// Stream or file URL (rtsp://, file path, ...)
    Url(String),
}

impl CaptureSource {
    /// Parse a source string: a bare integer selects a device index,
    /// anything else is treated as a URL.
    pub fn parse(s: &str) -> Self {
        match s.trim().parse::<u32>() {
            Ok(index) => CaptureSource::Device(index),
            Err(_) => CaptureSource::Url(s.trim().to_string()),
        }
    }
}

impl std::fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureSource::Device(index) => write!(f, "device {}", index),
            CaptureSource::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Monitoring session configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Exam identifier (names the snapshot subdirectory)
    pub exam_id: String,
    /// Root directory for snapshots; the session writes under
    /// `<snapshot_root>/<exam_id>/`
    pub snapshot_root: PathBuf,
    /// Frame source
    pub capture_source: CaptureSource,
    /// Base URL of the external pose/behavior analyzer
    pub analyzer_url: String,
    /// Append-only alert log file
    pub alert_log_path: PathBuf,
    /// Minimum elapsed time between two alerts for the same subject
    pub alert_cooldown: Duration,
    /// Consecutive per-frame failures that force a stop
    pub max_consecutive_errors: u32,
    /// Bounded wait for the snapshot-write mutex during a save
    pub snapshot_lock_timeout: Duration,
    /// Bounded wait for an in-flight snapshot write during shutdown
    pub shutdown_drain_timeout: Duration,
    /// Per-frame capture timeout in seconds (ffmpeg grab)
    pub capture_timeout_secs: u64,
    /// JPEG quality for snapshots and analyzer uploads
    pub jpeg_quality: u8,
}

impl MonitorConfig {
    /// Resolve configuration from the environment and command-line arguments.
    ///
    /// Camera source priority: `CAMERA_SOURCE` env var, then the second
    /// positional argument, then device 0.
    pub fn from_env(exam_id: Option<String>, camera_arg: Option<&str>) -> Self {
        let capture_source = std::env::var("CAMERA_SOURCE")
            .ok()
            .as_deref()
            .map(CaptureSource::parse)
            .or_else(|| camera_arg.map(CaptureSource::parse))
            .unwrap_or(CaptureSource::Device(0));

        Self {
            exam_id: exam_id.unwrap_or_else(|| DEFAULT_EXAM_ID.to_string()),
            snapshot_root: std::env::var("SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("snapshots")),
            capture_source,
            analyzer_url: std::env::var("ANALYZER_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:9000".to_string()),
            alert_log_path: std::env::var("ALERT_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("logs/alerts.log")),
            alert_cooldown: Duration::from_secs(5),
            max_consecutive_errors: 10,
            snapshot_lock_timeout: Duration::from_secs(5),
            shutdown_drain_timeout: Duration::from_secs(2),
            capture_timeout_secs: 10,
            jpeg_quality: 90,
        }
    }

    /// Snapshot directory for this exam
    pub fn snapshot_dir(&self) -> PathBuf {
        self.snapshot_root.join(&self.exam_id)
    }

    /// PID marker file path for this exam
    pub fn pid_file_path(&self) -> PathBuf {
        self.snapshot_dir().join(PID_FILE_NAME)
    }
}
