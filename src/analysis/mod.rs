//! Pose and behavior analysis collaborators
//!
//! ## Responsibilities
//!
//! - Keypoint and suspicion-level types shared across the session
//! - Collaborator traits for pose estimation and behavior analysis
//! - HTTP client implementation speaking to the external analyzer service
//!
//! The perception algorithms themselves are external; this module only
//! defines the seam the frame loop drives.

mod client;

pub use client::AnalyzerClient;

use crate::capture::Frame;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One named body point in frame coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub visible: bool,
}

/// Body-point name -> keypoint, ordered for stable serialization
pub type KeypointSet = BTreeMap<String, Keypoint>;

/// Ordered suspicion classification for a subject in a given frame.
///
/// Ordering follows declaration order; only levels above `Normal` trigger
/// alert processing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SuspicionLevel {
    Normal,
    Suspect,
    Cheating,
}

impl SuspicionLevel {
    /// Level name for filenames and log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            SuspicionLevel::Normal => "Normal",
            SuspicionLevel::Suspect => "Suspect",
            SuspicionLevel::Cheating => "Cheating",
        }
    }
}

impl std::fmt::Display for SuspicionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Behavior analysis verdict for one subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspicionVerdict {
    /// Detected suspicious activities, in detection order
    pub activities: Vec<String>,
    /// Overall level for this frame
    pub level: SuspicionLevel,
}

/// Pose-estimation collaborator: raw frame -> per-subject keypoint sets,
/// in detection order (the order defines the per-frame subject id).
#[allow(async_fn_in_trait)]
pub trait PoseEstimator {
    async fn detect_pose(&self, frame: &Frame) -> Result<Vec<KeypointSet>>;
}

/// Behavior-analysis collaborator: current (and optional previous) keypoints
/// for one subject -> suspicion verdict.
#[allow(async_fn_in_trait)]
pub trait BehaviorAnalyzer {
    async fn detect_suspects(
        &self,
        current: &KeypointSet,
        previous: Option<&KeypointSet>,
    ) -> Result<SuspicionVerdict>;
}
