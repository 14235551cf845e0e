//! Subject overlay geometry
//!
//! Bounding boxes and label colors derived from keypoints. Drawing itself
//! is the presenter's job; only the geometry is computed here.

use crate::analysis::{KeypointSet, SuspicionLevel};
use crate::capture::Frame;

/// Vertical room left under the box for the label band, in pixels
const LABEL_BAND_PX: f32 = 40.0;

/// Axis-aligned box in frame coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    /// Tight box around the visible keypoints, clamped to the frame, with a
    /// label band below. Returns None when no keypoint is visible.
    pub fn from_keypoints(keypoints: &KeypointSet, width: u32, height: u32) -> Option<Self> {
        let visible: Vec<_> = keypoints.values().filter(|kp| kp.visible).collect();
        if visible.is_empty() {
            return None;
        }

        let w = width as f32;
        let h = height as f32;
        let mut x_min = f32::MAX;
        let mut x_max = f32::MIN;
        let mut y_min = f32::MAX;
        let mut y_max = f32::MIN;
        for kp in visible {
            x_min = x_min.min(kp.x);
            x_max = x_max.max(kp.x);
            y_min = y_min.min(kp.y);
            y_max = y_max.max(kp.y);
        }

        Some(Self {
            x_min: x_min.max(0.0),
            y_min: y_min.max(0.0),
            x_max: x_max.min(w),
            y_max: (y_max + LABEL_BAND_PX).min(h),
        })
    }
}

/// Overlay color for a suspicion level, RGB
pub fn level_color(level: SuspicionLevel) -> [u8; 3] {
    match level {
        SuspicionLevel::Normal => [0, 255, 0],
        SuspicionLevel::Suspect => [255, 255, 0],
        SuspicionLevel::Cheating => [255, 0, 0],
    }
}

/// Per-subject annotation handed to the presenter
#[derive(Debug, Clone)]
pub struct SubjectOverlay {
    pub subject_id: String,
    pub bbox: Option<BoundingBox>,
    pub level: SuspicionLevel,
    pub label: String,
}

impl SubjectOverlay {
    /// Build the overlay for one subject in one frame
    pub fn new(
        subject_id: &str,
        keypoints: &KeypointSet,
        frame: &Frame,
        level: SuspicionLevel,
    ) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            bbox: BoundingBox::from_keypoints(keypoints, frame.width(), frame.height()),
            level,
            label: format!("{}: {}", subject_id, level),
        }
    }
}
