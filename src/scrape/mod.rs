//! Time-lapse scraping from the ALERTWildfire camera network.
//!
//! The scraper is responsible for:
//! - Fetching the public camera catalog
//! - Downloading each camera's time-lapse bundle with a request timeout
//! - Splitting bundles into JPEG frames named by capture time
//! - Dropping night (grayscale) and undecodable frames
//!
//! One camera failing never stops the others; callers fan out per camera.

pub mod frames;
pub mod mjpeg;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{CollaboratorFailure, PipelineError};

pub use frames::{
    check_frame, duration_to_seconds, frame_times, is_grayscale, remove_if_unusable, write_frames,
    FrameCheck,
};
pub use mjpeg::split_frames;

pub const DEFAULT_CAMERAS_URL: &str =
    "https://s3-us-west-2.amazonaws.com/alertwildfire-data-public/all_cameras-v2.json";
pub const DEFAULT_TIMELAPSE_URL: &str = "https://ts1.alertwildfire.org/text/timelapse/";
pub const DEFAULT_PRESET: &str = "12h";
pub const DEFAULT_TIMEOUT_SECS: u64 = 100;
const REFERER: &str = "https://www.alertwildfire.org/";
const MAX_BUNDLE_BYTES: u64 = 512 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct ScrapeSettings {
    pub cameras_url: String,
    pub timelapse_url: String,
    /// Time-lapse preset, e.g. `12h` or `15mn`.
    pub preset: String,
    /// Whole-request timeout, body included.
    pub timeout: Duration,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            cameras_url: DEFAULT_CAMERAS_URL.to_string(),
            timelapse_url: DEFAULT_TIMELAPSE_URL.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CameraCatalog {
    features: Vec<CameraFeature>,
}

#[derive(Debug, Deserialize)]
struct CameraFeature {
    properties: CameraProperties,
}

#[derive(Debug, Deserialize)]
struct CameraProperties {
    id: String,
}

/// Camera ids from the catalog GeoJSON, lower-cased.
pub fn parse_camera_catalog(json: &str) -> Result<Vec<String>> {
    let catalog: CameraCatalog = serde_json::from_str(json).context("invalid camera catalog")?;
    Ok(catalog
        .features
        .into_iter()
        .map(|feature| feature.properties.id.to_lowercase())
        .collect())
}

pub struct AwfClient {
    agent: ureq::Agent,
    settings: ScrapeSettings,
}

impl AwfClient {
    pub fn new(settings: ScrapeSettings) -> Result<Self> {
        Url::parse(&settings.cameras_url).context("parse cameras url")?;
        Url::parse(&settings.timelapse_url).context("parse timelapse url")?;
        duration_to_seconds(&settings.preset)?;
        let agent = ureq::AgentBuilder::new().timeout(settings.timeout).build();
        Ok(Self { agent, settings })
    }

    fn get(&self, url: &str) -> ureq::Request {
        self.agent
            .get(url)
            .set("Connection", "keep-alive")
            .set("Sec-Fetch-Site", "same-site")
            .set("Sec-Fetch-Mode", "cors")
            .set("Sec-Fetch-Dest", "empty")
            .set("Referer", REFERER)
    }

    pub fn camera_ids(&self) -> Result<Vec<String>> {
        let body = self
            .get(&self.settings.cameras_url)
            .call()
            .with_context(|| format!("fetch camera catalog from {}", self.settings.cameras_url))?
            .into_string()
            .context("read camera catalog")?;
        parse_camera_catalog(&body)
    }

    pub fn timelapse_url(&self, source: &str) -> Result<Url> {
        Url::parse_with_params(
            &self.settings.timelapse_url,
            &[("source", source), ("preset", self.settings.preset.as_str())],
        )
        .map_err(|e| anyhow!("invalid timelapse url: {}", e))
    }

    fn classify(&self, message: String) -> CollaboratorFailure {
        if message.contains("timed out") {
            CollaboratorFailure::TimedOut {
                after: self.settings.timeout,
            }
        } else {
            CollaboratorFailure::Failed { message }
        }
    }

    /// Raw time-lapse body for one camera.
    pub fn download_timelapse(&self, source: &str) -> Result<Vec<u8>, PipelineError> {
        let failure = |f: CollaboratorFailure| PipelineError::collaborator("download", source, f);
        let url = self
            .timelapse_url(source)
            .map_err(|e| failure(CollaboratorFailure::failed(e.to_string())))?;
        let response = self
            .get(url.as_str())
            .call()
            .map_err(|e| failure(self.classify(e.to_string())))?;
        let mut body = Vec::new();
        response
            .into_reader()
            .take(MAX_BUNDLE_BYTES)
            .read_to_end(&mut body)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::TimedOut {
                    failure(CollaboratorFailure::TimedOut {
                        after: self.settings.timeout,
                    })
                } else {
                    failure(self.classify(e.to_string()))
                }
            })?;
        Ok(body)
    }

    /// Download one camera into `<day_dir>/<source>/` and return the frames
    /// written. `now` is the end of the time-lapse span.
    pub fn scrape_camera(
        &self,
        source: &str,
        day_dir: &Path,
        now: NaiveDateTime,
    ) -> Result<Vec<PathBuf>> {
        let body = self.download_timelapse(source)?;
        let frames = split_frames(&body);
        if frames.is_empty() {
            log::warn!("{}: time-lapse contained no frames", source);
            return Ok(Vec::new());
        }
        let span = duration_to_seconds(&self.settings.preset)?;
        let times = frame_times(frames.len(), now, span);
        let written = write_frames(&day_dir.join(source), &frames, &times)?;
        log::debug!("{}: {} frames", source, written.len());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_catalog_ids() -> Result<()> {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"id": "Axis-Baldy", "name": "Baldy"}},
                {"type": "Feature", "properties": {"id": "axis-cedar"}}
            ]
        }"#;
        assert_eq!(parse_camera_catalog(json)?, vec!["axis-baldy", "axis-cedar"]);
        assert!(parse_camera_catalog(r#"{"features": [{}]}"#).is_err());
        Ok(())
    }

    #[test]
    fn builds_timelapse_url() -> Result<()> {
        let client = AwfClient::new(ScrapeSettings::default())?;
        let url = client.timelapse_url("axis-baldy")?;
        assert_eq!(
            url.as_str(),
            "https://ts1.alertwildfire.org/text/timelapse/?source=axis-baldy&preset=12h"
        );
        Ok(())
    }

    #[test]
    fn rejects_bad_settings() {
        let settings = ScrapeSettings {
            preset: "forever".to_string(),
            ..ScrapeSettings::default()
        };
        assert!(AwfClient::new(settings).is_err());
    }

    #[test]
    fn unreachable_host_is_a_collaborator_failure() {
        let settings = ScrapeSettings {
            timelapse_url: "http://127.0.0.1:9/timelapse/".to_string(),
            timeout: Duration::from_secs(2),
            ..ScrapeSettings::default()
        };
        let client = AwfClient::new(settings).unwrap();
        let err = client.download_timelapse("axis-baldy").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Collaborator {
                collaborator: "download",
                ..
            }
        ));
    }
}
