//! Frame capture
//!
//! ## Responsibilities
//!
//! - `Frame` buffer type with JPEG encode/decode helpers
//! - `FrameSource` collaborator trait driven by the frame loop
//! - ffmpeg-backed production source (device index or stream URL)

mod ffmpeg;

pub use ffmpeg::FfmpegSource;

use crate::error::{Error, Result};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::io::Cursor;

/// One captured frame, RGB8 row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Create a frame from raw RGB8 pixels
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Uniform-color synthetic frame (test feeds, probes)
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        Self::new(width, height, data)
    }

    /// Decode a JPEG byte buffer into a frame
    pub fn from_jpeg(bytes: &[u8]) -> Result<Self> {
        let rgb = image::load_from_memory(bytes)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Self::new(width, height, rgb.into_raw()))
    }

    /// Encode this frame to an in-memory JPEG buffer
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        // The encoder asserts on a length mismatch instead of erroring
        let expected = self.width as usize * self.height as usize * 3;
        if self.data.len() != expected {
            return Err(Error::Capture(format!(
                "frame buffer holds {} bytes, expected {} for {}x{} rgb",
                self.data.len(),
                expected,
                self.width,
                self.height
            )));
        }

        let mut buf = Cursor::new(Vec::new());
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder.encode(&self.data, self.width, self.height, ExtendedColorType::Rgb8)?;
        Ok(buf.into_inner())
    }

    /// Malformed frames (zero dimensions or no pixel data) are skipped by
    /// the loop and refused by the snapshot writer.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Capture collaborator: yields frames until end-of-stream.
///
/// `Ok(None)` signals end-of-stream or a device read failure; the loop
/// treats either as a graceful stop, not a process error.
#[allow(async_fn_in_trait)]
pub trait FrameSource {
    async fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying device during terminal cleanup
    async fn release(&mut self) {}
}
