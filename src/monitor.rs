//! MonitorSession - Frame Loop Orchestration
//!
//! ## Responsibilities
//!
//! - Drive capture -> pose detection -> behavior analysis -> overlay ->
//!   alert dispatch -> presentation, one cooperative turn per frame
//! - Consult the lifecycle controller and circuit breaker every turn
//! - Run terminal cleanup (source release, bounded snapshot drain, PID
//!   removal, state reset) on every exit path
//!
//! A single task owns the loop; the only concurrent actor is the
//! asynchronous stop request, which every state-sensitive step re-checks.

use crate::alert::{AlertRecord, AlertThrottle};
use crate::analysis::{BehaviorAnalyzer, KeypointSet, PoseEstimator, SuspicionLevel};
use crate::capture::{Frame, FrameSource};
use crate::circuit_breaker::ErrorCircuitBreaker;
use crate::config::MonitorConfig;
use crate::diagnostics::ProcessDiagnostics;
use crate::error::Result;
use crate::lifecycle::LifecycleController;
use crate::overlay::SubjectOverlay;
use crate::presenter::Presenter;
use crate::snapshot::SnapshotWriter;
use std::collections::HashMap;
use std::sync::Arc;

/// Why the frame loop ended. All variants are graceful stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Capture returned end-of-stream or a device read failure
    EndOfStream,
    /// The presenter reported a user-quit request
    UserQuit,
    /// An external stop request (signal, operator command) was observed
    Interrupted,
    /// The circuit breaker tripped on consecutive frame failures
    TooManyFailures,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::EndOfStream => "end of stream",
            StopReason::UserQuit => "user quit",
            StopReason::Interrupted => "interrupted",
            StopReason::TooManyFailures => "too many consecutive failures",
        };
        f.write_str(s)
    }
}

/// One monitoring session over a frame source
pub struct MonitorSession<S, E, B, P> {
    config: MonitorConfig,
    lifecycle: Arc<LifecycleController>,
    source: S,
    estimator: E,
    analyzer: B,
    presenter: P,
    alerts: Arc<AlertThrottle>,
    snapshots: Arc<SnapshotWriter>,
    diagnostics: ProcessDiagnostics,
    frame_count: u64,
}

impl<S, E, B, P> MonitorSession<S, E, B, P>
where
    S: FrameSource,
    E: PoseEstimator,
    B: BehaviorAnalyzer,
    P: Presenter,
{
    /// Assemble a session from its collaborators
    pub fn new(
        config: MonitorConfig,
        lifecycle: Arc<LifecycleController>,
        source: S,
        estimator: E,
        analyzer: B,
        presenter: P,
    ) -> Self {
        let snapshots = Arc::new(SnapshotWriter::new(
            lifecycle.clone(),
            config.snapshot_dir(),
            config.snapshot_lock_timeout,
            config.jpeg_quality,
        ));
        let alerts = Arc::new(AlertThrottle::new(
            lifecycle.clone(),
            snapshots.clone(),
            config.alert_log_path.clone(),
            config.alert_cooldown,
        ));
        let diagnostics = ProcessDiagnostics::new(config.pid_file_path());

        Self {
            config,
            lifecycle,
            source,
            estimator,
            analyzer,
            presenter,
            alerts,
            snapshots,
            diagnostics,
            frame_count: 0,
        }
    }

    /// Run the session to completion.
    ///
    /// Terminal cleanup runs regardless of which exit path the loop took.
    pub async fn run(&mut self) -> Result<StopReason> {
        tokio::fs::create_dir_all(self.config.snapshot_dir()).await?;
        self.lifecycle.begin()?;
        self.diagnostics.write_pid_file().await;

        tracing::info!(
            exam_id = %self.config.exam_id,
            snapshot_dir = %self.config.snapshot_dir().display(),
            "Monitoring started"
        );

        let outcome = self.run_loop().await;
        self.shutdown().await;

        let alert_count = self.alerts.count().await;
        match &outcome {
            Ok(reason) => tracing::info!(
                reason = %reason,
                frames = self.frame_count,
                alerts = alert_count,
                "Monitoring finished"
            ),
            Err(e) => tracing::error!(error = %e, "Monitoring aborted"),
        }

        outcome
    }

    async fn run_loop(&mut self) -> Result<StopReason> {
        let mut previous: HashMap<String, KeypointSet> = HashMap::new();
        let mut breaker = ErrorCircuitBreaker::new(self.config.max_consecutive_errors);

        loop {
            if !self.lifecycle.is_running() {
                tracing::info!("Stop request observed, exiting frame loop");
                return Ok(StopReason::Interrupted);
            }

            let frame = match self.source.read_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    tracing::warn!("Frame read failed or stream ended, exiting frame loop");
                    self.lifecycle.request_stop();
                    return Ok(StopReason::EndOfStream);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Capture device error, exiting frame loop");
                    self.lifecycle.request_stop();
                    return Ok(StopReason::EndOfStream);
                }
            };

            // Malformed frames are skipped whole: no detection, no alert,
            // no pose-history change, and no error counted
            if frame.is_empty() {
                tracing::warn!("Empty frame from capture source, skipping turn");
                continue;
            }

            self.frame_count += 1;
            let mut overlays = Vec::new();

            match self.process_frame(&frame, &previous, &mut overlays).await {
                Ok(current) => {
                    breaker.record_success();
                    previous = current;
                }
                Err(e) => {
                    tracing::error!(
                        frame = self.frame_count,
                        error = %e,
                        "Frame processing failed"
                    );
                    if breaker.record_failure() {
                        tracing::error!("Too many consecutive frame errors, stopping detection");
                        self.lifecycle.request_stop();
                        return Ok(StopReason::TooManyFailures);
                    }
                }
            }

            match self.presenter.present(&frame, &overlays).await {
                Ok(true) => {
                    tracing::info!("Quit requested, exiting frame loop");
                    self.lifecycle.request_stop();
                    return Ok(StopReason::UserQuit);
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Presenter error ignored");
                }
            }
        }
    }

    /// Process one frame: detect poses, analyze each subject, dispatch
    /// alerts, and return the new pose generation.
    ///
    /// Any error here abandons the whole frame; the caller feeds it to the
    /// circuit breaker and keeps the previous pose generation.
    async fn process_frame(
        &self,
        frame: &Frame,
        previous: &HashMap<String, KeypointSet>,
        overlays: &mut Vec<SubjectOverlay>,
    ) -> Result<HashMap<String, KeypointSet>> {
        let poses = self.estimator.detect_pose(frame).await?;
        let mut current = HashMap::with_capacity(poses.len());

        for (index, keypoints) in poses.into_iter().enumerate() {
            // Subject identity is the detection ordinal, stable only
            // within this frame
            let subject_id = format!("student-{}", index);
            let prev_keypoints = previous.get(&subject_id);

            let verdict = self
                .analyzer
                .detect_suspects(&keypoints, prev_keypoints)
                .await?;

            tracing::debug!(
                subject_id = %subject_id,
                level = %verdict.level,
                "Subject analyzed"
            );
            overlays.push(SubjectOverlay::new(
                &subject_id,
                &keypoints,
                frame,
                verdict.level,
            ));

            if verdict.level > SuspicionLevel::Normal {
                // The asynchronous stop can land between the suspicion
                // check and this dispatch; re-check before starting work
                if self.lifecycle.is_running() {
                    self.alerts
                        .consider(
                            &subject_id,
                            &verdict.activities,
                            verdict.level,
                            frame,
                            &keypoints,
                        )
                        .await;
                } else {
                    tracing::debug!(
                        subject_id = %subject_id,
                        "Skipping alert dispatch during shutdown"
                    );
                }
            }

            current.insert(subject_id, keypoints);
        }

        Ok(current)
    }

    /// Terminal cleanup, safe to run from any exit path
    async fn shutdown(&mut self) {
        self.lifecycle.request_stop();
        self.source.release().await;

        if !self
            .snapshots
            .wait_idle(self.config.shutdown_drain_timeout)
            .await
        {
            tracing::warn!(
                timeout = ?self.config.shutdown_drain_timeout,
                "Timed out waiting for in-flight snapshot write, proceeding with shutdown"
            );
        }

        self.diagnostics.remove_pid_file().await;
        self.lifecycle.finish();
    }

    /// Alerts recorded so far, oldest first
    pub async fn alert_history(&self) -> Vec<AlertRecord> {
        self.alerts.history().await
    }

    /// Frames processed so far (malformed frames excluded)
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// PID marker path for this session
    pub fn pid_path(&self) -> &std::path::PathBuf {
        self.diagnostics.pid_path()
    }
}
