//! HTTP client for the external analyzer service
//!
//! Two endpoints on one service: `/pose/detect` takes a JPEG frame and
//! returns keypoint sets in detection order; `/behavior/analyze` takes the
//! current and previous keypoints for one subject and returns a verdict.

use super::{BehaviorAnalyzer, KeypointSet, PoseEstimator, SuspicionVerdict};
use crate::capture::Frame;
use crate::error::{Error, Result};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Analyzer service client
#[derive(Debug, Clone)]
pub struct AnalyzerClient {
    client: reqwest::Client,
    base_url: String,
    jpeg_quality: u8,
}

/// `/pose/detect` response body
#[derive(Debug, Deserialize)]
struct PoseResponse {
    poses: Vec<KeypointSet>,
}

/// `/behavior/analyze` request body
#[derive(Debug, Serialize)]
struct BehaviorRequest<'a> {
    current: &'a KeypointSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous: Option<&'a KeypointSet>,
}

impl AnalyzerClient {
    /// Create a client for the analyzer at `base_url`
    pub fn new(base_url: String, jpeg_quality: u8) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            jpeg_quality,
        })
    }
}

impl PoseEstimator for AnalyzerClient {
    async fn detect_pose(&self, frame: &Frame) -> Result<Vec<KeypointSet>> {
        let jpeg = frame.encode_jpeg(self.jpeg_quality)?;

        let part = Part::bytes(jpeg)
            .file_name("frame.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new().part("image", part);

        let url = format!("{}/pose/detect", self.base_url);
        let resp = self.client.post(&url).multipart(form).send().await?;

        if !resp.status().is_success() {
            return Err(Error::Analysis(format!(
                "pose endpoint returned {}",
                resp.status()
            )));
        }

        let body: PoseResponse = resp.json().await?;
        tracing::trace!(subjects = body.poses.len(), "Pose detection complete");
        Ok(body.poses)
    }
}

impl BehaviorAnalyzer for AnalyzerClient {
    async fn detect_suspects(
        &self,
        current: &KeypointSet,
        previous: Option<&KeypointSet>,
    ) -> Result<SuspicionVerdict> {
        let url = format!("{}/behavior/analyze", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&BehaviorRequest { current, previous })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::Analysis(format!(
                "behavior endpoint returned {}",
                resp.status()
            )));
        }

        let verdict: SuspicionVerdict = resp.json().await?;
        Ok(verdict)
    }
}
