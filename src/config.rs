use anyhow::{anyhow, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cameras::cluster::{
    ClusterParams, DEFAULT_ANGLE_THRESHOLD, DEFAULT_MIN_CAMERA_SIZE, DEFAULT_STATIC_THRESHOLD,
};
use crate::cameras::split::{SplitSettings, DEFAULT_OCR_BATCH_SIZE, DEFAULT_PROBE_IMAGES};
use crate::detect::YoloConfig;
use crate::pipeline::{PipelineSettings, DEFAULT_CONFIDENCE, DEFAULT_QUIET_HOURS};
use crate::pool::DEFAULT_WORKERS;
use crate::retention::{
    RetentionPolicy, DEFAULT_GAP_SECS, DEFAULT_MARGIN_SECS, DEFAULT_MIN_CLUSTER_SIZE,
    MAX_RETENTION_SECS,
};
use crate::scrape::frames::duration_to_seconds;
use crate::scrape::{
    ScrapeSettings, DEFAULT_CAMERAS_URL, DEFAULT_PRESET, DEFAULT_TIMELAPSE_URL,
    DEFAULT_TIMEOUT_SECS,
};

pub const CONFIG_ENV: &str = "PYRO_CONFIG";

const DEFAULT_FRAMES_DIR: &str = "dl_frames";
const DEFAULT_SPLIT_DIR: &str = "dl_frames_splited";
const DEFAULT_DONE_DIR: &str = "done";
const DEFAULT_RUNS_DIR: &str = "runs_awf";
const DEFAULT_DETECTOR_BACKEND: &str = "yolo";
const DEFAULT_DETECTOR_PROGRAM: &str = "yolo";
const DEFAULT_WEIGHTS: &str = "data/model.onnx";
const DEFAULT_IMAGE_SIZE: &str = "(384, 640)";
const DEFAULT_DETECTOR_TIMEOUT_SECS: u64 = 60 * 60;
const DEFAULT_OCR_TIMEOUT_SECS: u64 = 10 * 60;
/// Arizona does not observe daylight saving.
const DEFAULT_UTC_OFFSET_HOURS: i32 = -7;
const DEFAULT_POLL_SECS: u64 = 10 * 60;

#[derive(Debug, Deserialize, Default)]
struct ScrapperConfigFile {
    paths: Option<PathsConfigFile>,
    scrape: Option<ScrapeConfigFile>,
    detector: Option<DetectorConfigFile>,
    retention: Option<RetentionConfigFile>,
    cameras: Option<CamerasConfigFile>,
    schedule: Option<ScheduleConfigFile>,
    workers: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct PathsConfigFile {
    frames_dir: Option<PathBuf>,
    split_dir: Option<PathBuf>,
    done_dir: Option<PathBuf>,
    runs_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct ScrapeConfigFile {
    cameras_url: Option<String>,
    timelapse_url: Option<String>,
    preset: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    program: Option<PathBuf>,
    weights: Option<PathBuf>,
    confidence: Option<f32>,
    image_size: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RetentionConfigFile {
    gap_secs: Option<u64>,
    margin_secs: Option<u64>,
    min_cluster_size: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct CamerasConfigFile {
    ocr_command: Option<Vec<String>>,
    ocr_timeout_secs: Option<u64>,
    angle_threshold: Option<f64>,
    static_threshold: Option<f64>,
    min_camera_size: Option<usize>,
    batch_size: Option<usize>,
    probe_images: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct ScheduleConfigFile {
    quiet_hours: Option<Vec<u32>>,
    utc_offset_hours: Option<i32>,
    poll_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ScrapperConfig {
    pub paths: PathSettings,
    pub scrape: ScrapeSettings,
    pub detector: DetectorSettings,
    pub retention: RetentionPolicy,
    pub cameras: CameraSettings,
    pub schedule: ScheduleSettings,
    pub workers: usize,
}

#[derive(Debug, Clone)]
pub struct PathSettings {
    /// Raw downloads, `<frames_dir>/<run timestamp>/<camera>/`.
    pub frames_dir: PathBuf,
    /// Per-position output of the camera splitter.
    pub split_dir: PathBuf,
    /// Finished bundles.
    pub done_dir: PathBuf,
    /// Detector run outputs.
    pub runs_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub program: PathBuf,
    pub weights: PathBuf,
    pub confidence: f32,
    pub image_size: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Program and arguments; frame paths are appended.
    pub ocr_command: Option<Vec<String>>,
    pub ocr_timeout: Duration,
    pub split: SplitSettings,
}

#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    pub quiet_hours: Vec<u32>,
    pub utc_offset: FixedOffset,
    pub poll_interval: Duration,
}

impl ScrapperConfig {
    /// Load from the file named by `PYRO_CONFIG`, if any.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load from `path` (or defaults), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ScrapperConfigFile) -> Result<Self> {
        let paths = file.paths.unwrap_or_default();
        let paths = PathSettings {
            frames_dir: paths
                .frames_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FRAMES_DIR)),
            split_dir: paths
                .split_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SPLIT_DIR)),
            done_dir: paths
                .done_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DONE_DIR)),
            runs_dir: paths
                .runs_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RUNS_DIR)),
        };

        let scrape = file.scrape.unwrap_or_default();
        let scrape = ScrapeSettings {
            cameras_url: scrape
                .cameras_url
                .unwrap_or_else(|| DEFAULT_CAMERAS_URL.to_string()),
            timelapse_url: scrape
                .timelapse_url
                .unwrap_or_else(|| DEFAULT_TIMELAPSE_URL.to_string()),
            preset: scrape.preset.unwrap_or_else(|| DEFAULT_PRESET.to_string()),
            timeout: Duration::from_secs(scrape.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        };

        let detector = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector
                .backend
                .unwrap_or_else(|| DEFAULT_DETECTOR_BACKEND.to_string()),
            program: detector
                .program
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DETECTOR_PROGRAM)),
            weights: detector
                .weights
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WEIGHTS)),
            confidence: detector.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            image_size: detector
                .image_size
                .unwrap_or_else(|| DEFAULT_IMAGE_SIZE.to_string()),
            timeout: Duration::from_secs(
                detector
                    .timeout_secs
                    .unwrap_or(DEFAULT_DETECTOR_TIMEOUT_SECS),
            ),
        };

        let retention = file.retention.unwrap_or_default();
        let retention = RetentionPolicy {
            gap: seconds(retention.gap_secs.unwrap_or(DEFAULT_GAP_SECS))?,
            margin: seconds(retention.margin_secs.unwrap_or(DEFAULT_MARGIN_SECS))?,
            min_cluster_size: retention
                .min_cluster_size
                .unwrap_or(DEFAULT_MIN_CLUSTER_SIZE),
        };

        let cameras = file.cameras.unwrap_or_default();
        let cameras = CameraSettings {
            ocr_command: cameras.ocr_command,
            ocr_timeout: Duration::from_secs(
                cameras.ocr_timeout_secs.unwrap_or(DEFAULT_OCR_TIMEOUT_SECS),
            ),
            split: SplitSettings {
                params: ClusterParams {
                    angle_threshold: cameras.angle_threshold.unwrap_or(DEFAULT_ANGLE_THRESHOLD),
                    static_threshold: cameras
                        .static_threshold
                        .unwrap_or(DEFAULT_STATIC_THRESHOLD),
                    min_camera_size: cameras.min_camera_size.unwrap_or(DEFAULT_MIN_CAMERA_SIZE),
                },
                batch_size: cameras.batch_size.unwrap_or(DEFAULT_OCR_BATCH_SIZE),
                probe_images: cameras.probe_images.unwrap_or(DEFAULT_PROBE_IMAGES),
            },
        };

        let schedule = file.schedule.unwrap_or_default();
        let offset_hours = schedule.utc_offset_hours.unwrap_or(DEFAULT_UTC_OFFSET_HOURS);
        let schedule = ScheduleSettings {
            quiet_hours: schedule
                .quiet_hours
                .unwrap_or_else(|| DEFAULT_QUIET_HOURS.to_vec()),
            utc_offset: FixedOffset::east_opt(offset_hours * 3600)
                .ok_or_else(|| anyhow!("utc_offset_hours out of range: {}", offset_hours))?,
            poll_interval: Duration::from_secs(schedule.poll_secs.unwrap_or(DEFAULT_POLL_SECS)),
        };

        Ok(Self {
            paths,
            scrape,
            detector,
            retention,
            cameras,
            schedule,
            workers: file.workers.unwrap_or(DEFAULT_WORKERS),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = non_empty_env("PYRO_OUTPUT_PATH") {
            self.paths.frames_dir = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("PYRO_DONE_PATH") {
            self.paths.done_dir = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("PYRO_DETECTOR_WEIGHTS") {
            self.detector.weights = PathBuf::from(path);
        }
        if let Some(conf) = non_empty_env("PYRO_DETECTOR_CONFIDENCE") {
            self.detector.confidence = conf
                .trim()
                .parse()
                .map_err(|_| anyhow!("PYRO_DETECTOR_CONFIDENCE must be a number"))?;
        }
        if let Some(workers) = non_empty_env("PYRO_WORKERS") {
            self.workers = workers
                .trim()
                .parse()
                .map_err(|_| anyhow!("PYRO_WORKERS must be a positive integer"))?;
        }
        if let Some(command) = non_empty_env("PYRO_OCR_COMMAND") {
            self.cameras.ocr_command = Some(split_command(&command));
        }
        if let Some(preset) = non_empty_env("PYRO_TIMELAPSE_PRESET") {
            self.scrape.preset = preset.trim().to_string();
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        duration_to_seconds(&self.scrape.preset)?;
        if !(0.0..=1.0).contains(&self.detector.confidence) {
            return Err(anyhow!(
                "detector confidence must be within [0, 1], got {}",
                self.detector.confidence
            ));
        }
        if self.workers == 0 {
            return Err(anyhow!("workers must be greater than zero"));
        }
        for (key, value) in [
            ("retention.gap_secs", self.retention.gap),
            ("retention.margin_secs", self.retention.margin),
        ] {
            if value > chrono::Duration::seconds(MAX_RETENTION_SECS as i64) {
                return Err(anyhow!(
                    "{} must be at most {}s, got {}s",
                    key,
                    MAX_RETENTION_SECS,
                    value.num_seconds()
                ));
            }
        }
        if self.retention.min_cluster_size == 0 {
            return Err(anyhow!("retention.min_cluster_size must be greater than zero"));
        }
        if let Some(hour) = self.schedule.quiet_hours.iter().find(|h| **h > 23) {
            return Err(anyhow!("quiet hour {} is not a valid hour of day", hour));
        }
        if self.cameras.split.batch_size == 0 {
            return Err(anyhow!("cameras.batch_size must be greater than zero"));
        }
        if matches!(&self.cameras.ocr_command, Some(cmd) if cmd.is_empty()) {
            return Err(anyhow!("cameras.ocr_command must name a program"));
        }
        self.schedule.quiet_hours.sort_unstable();
        self.schedule.quiet_hours.dedup();
        Ok(())
    }

    pub fn yolo(&self) -> YoloConfig {
        YoloConfig {
            program: self.detector.program.clone(),
            weights: self.detector.weights.clone(),
            image_size: self.detector.image_size.clone(),
            runs_dir: self.paths.runs_dir.clone(),
            timeout: self.detector.timeout,
        }
    }

    pub fn pipeline(&self) -> PipelineSettings {
        PipelineSettings {
            done_dir: self.paths.done_dir.clone(),
            confidence: self.detector.confidence,
            policy: self.retention,
            quiet_hours: self.schedule.quiet_hours.clone(),
            utc_offset: self.schedule.utc_offset,
        }
    }
}

fn seconds(secs: u64) -> Result<chrono::Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| anyhow!("duration too large: {}s", secs))
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<ScrapperConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn split_command(value: &str) -> Vec<String> {
    value.split_whitespace().map(|part| part.to_string()).collect()
}
