//! ffmpeg-backed frame source
//!
//! Grabs one frame per read by spawning ffmpeg with `kill_on_drop(true)`:
//! when the per-read timeout fires and the future is cancelled, the child
//! is dropped and SIGKILL is sent, so unresponsive devices cannot
//! accumulate zombie processes.
//!
//! Reads are stateless, which suits live inputs (devices, RTSP streams)
//! where each grab observes the newest frame. A plain file URL has no
//! tracked read position and yields its first frame on every read, so
//! files serve only as a static test input, never as a playback source.

use super::{Frame, FrameSource};
use crate::config::CaptureSource;
use crate::error::{Error, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Single-frame-grab source over a live local device or stream URL
pub struct FfmpegSource {
    source: CaptureSource,
    timeout_secs: u64,
}

impl FfmpegSource {
    /// Open the source: verify ffmpeg is available and grab a probe frame.
    ///
    /// A device that cannot produce a first frame is reported as a capture
    /// error so the process can exit with the device-failure code.
    pub async fn open(source: CaptureSource, timeout_secs: u64) -> Result<Self> {
        let version = Self::check_ffmpeg().await?;
        tracing::info!(ffmpeg = %version, source = %source, "Capture source opening");

        let mut src = Self {
            source,
            timeout_secs,
        };

        match src.grab_frame().await? {
            Some(frame) => {
                tracing::info!(
                    width = frame.width(),
                    height = frame.height(),
                    "Capture source opened"
                );
                Ok(src)
            }
            None => Err(Error::Capture(format!(
                "could not read a frame from {}",
                src.source
            ))),
        }
    }

    /// Check if ffmpeg is available
    pub async fn check_ffmpeg() -> Result<String> {
        let output = Command::new("ffmpeg")
            .arg("-version")
            .output()
            .await
            .map_err(|e| Error::Capture(format!("ffmpeg not found: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Capture("ffmpeg version check failed".to_string()));
        }

        let version = String::from_utf8_lossy(&output.stdout);
        let first_line = version.lines().next().unwrap_or("unknown");
        Ok(first_line.to_string())
    }

    /// Input arguments for the configured source
    fn input_args(&self) -> Vec<String> {
        match &self.source {
            CaptureSource::Device(index) => vec![
                "-f".to_string(),
                "v4l2".to_string(),
                "-video_size".to_string(),
                "1280x720".to_string(),
                "-i".to_string(),
                format!("/dev/video{}", index),
            ],
            CaptureSource::Url(url) if url.starts_with("rtsp://") => vec![
                "-rtsp_transport".to_string(),
                "tcp".to_string(),
                "-i".to_string(),
                url.clone(),
            ],
            CaptureSource::Url(url) => vec!["-i".to_string(), url.clone()],
        }
    }

    /// Grab one frame as JPEG via ffmpeg and decode it
    async fn grab_frame(&mut self) -> Result<Option<Frame>> {
        let mut args = self.input_args();
        args.extend(
            [
                "-frames:v",
                "1",
                "-f",
                "image2pipe",
                "-vcodec",
                "mjpeg",
                "-loglevel",
                "error",
                "-y",
                "-",
            ]
            .iter()
            .map(|s| s.to_string()),
        );

        let child = Command::new("ffmpeg")
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Capture(format!("ffmpeg spawn failed: {}", e)))?;

        let timeout = Duration::from_secs(self.timeout_secs);
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    tracing::warn!(error = %stderr.trim(), "ffmpeg frame grab failed");
                    return Ok(None);
                }
                if output.stdout.is_empty() {
                    tracing::warn!("ffmpeg returned empty output");
                    return Ok(None);
                }
                match Frame::from_jpeg(&output.stdout) {
                    Ok(frame) => Ok(Some(frame)),
                    Err(e) => {
                        tracing::warn!(error = %e, "Captured frame failed to decode");
                        Ok(None)
                    }
                }
            }
            Ok(Err(e)) => Err(Error::Capture(format!("ffmpeg execution failed: {}", e))),
            Err(_) => {
                // Child dropped on cancellation, kill_on_drop reaps it
                tracing::warn!(
                    timeout_sec = self.timeout_secs,
                    source = %self.source,
                    "ffmpeg frame grab timed out"
                );
                Ok(None)
            }
        }
    }
}

impl FrameSource for FfmpegSource {
    async fn read_frame(&mut self) -> Result<Option<Frame>> {
        self.grab_frame().await
    }

    async fn release(&mut self) {
        // Per-read ffmpeg processes leave nothing to release
        tracing::info!(source = %self.source, "Capture source released");
    }
}
