//! Frame presentation collaborator
//!
//! Drawing and window handling live outside this crate; the loop hands the
//! presenter each frame with its overlay geometry and polls it for a
//! user-quit request.

use crate::capture::Frame;
use crate::error::Result;
use crate::overlay::SubjectOverlay;

/// Presentation collaborator.
///
/// Returns true when the user requested to quit (key press, window close).
#[allow(async_fn_in_trait)]
pub trait Presenter {
    async fn present(&mut self, frame: &Frame, overlays: &[SubjectOverlay]) -> Result<bool>;
}

/// Presenter for headless operation: logs overlays, never requests quit
#[derive(Debug, Default)]
pub struct HeadlessPresenter;

impl Presenter for HeadlessPresenter {
    async fn present(&mut self, _frame: &Frame, overlays: &[SubjectOverlay]) -> Result<bool> {
        for overlay in overlays {
            tracing::trace!(
                subject_id = %overlay.subject_id,
                level = %overlay.level,
                has_bbox = overlay.bbox.is_some(),
                "Overlay"
            );
        }
        Ok(false)
    }
}
