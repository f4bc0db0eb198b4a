//! Ultralytics `yolo` command-line detector.
//!
//! Invokes `yolo predict ... save_txt save_conf name=<run> project=<runs_dir>`
//! and reads the label files it writes to `<runs_dir>/<run>/labels/`.

use anyhow::anyhow;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use crate::detect::backend::{DetectionJob, SmokeDetector};
use crate::detect::result::{read_label_dir, DetectorOutput};
use crate::error::CollaboratorFailure;
use crate::process::run_with_timeout;

#[derive(Clone, Debug)]
pub struct YoloConfig {
    /// The `yolo` executable.
    pub program: PathBuf,
    /// Model weights (`.pt` or `.onnx`).
    pub weights: PathBuf,
    /// Inference size passed as `imgsz=`.
    pub image_size: String,
    /// Parent of per-run output directories.
    pub runs_dir: PathBuf,
    pub timeout: Duration,
}

pub struct YoloCliBackend {
    config: YoloConfig,
}

impl YoloCliBackend {
    pub fn new(config: YoloConfig) -> Self {
        Self { config }
    }

    fn command(&self, job: &DetectionJob) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.arg("predict")
            .arg("task=detect")
            .arg(format!("model={}", self.config.weights.display()))
            .arg(format!("conf={}", job.confidence))
            .arg(format!("source={}", job.source.display()))
            .arg("save=False")
            .arg("save_txt")
            .arg("save_conf")
            .arg(format!("imgsz={}", self.config.image_size))
            .arg(format!("name={}", job.name))
            .arg(format!("project={}", self.config.runs_dir.display()))
            .arg("exist_ok=True")
            .arg("verbose=False");
        cmd
    }
}

impl SmokeDetector for YoloCliBackend {
    fn name(&self) -> &'static str {
        "yolo"
    }

    fn init(&mut self) -> anyhow::Result<()> {
        if !self.config.weights.is_file() {
            return Err(anyhow!(
                "detector weights not found: {}",
                self.config.weights.display()
            ));
        }
        std::fs::create_dir_all(&self.config.runs_dir)?;
        Ok(())
    }

    fn detect(&self, job: &DetectionJob) -> Result<DetectorOutput, CollaboratorFailure> {
        log::debug!("yolo predict on {} (conf={})", job.source.display(), job.confidence);
        // yolo appends to existing label files; a leftover run would double them.
        let run_dir = self.config.runs_dir.join(&job.name);
        if run_dir.exists() {
            std::fs::remove_dir_all(&run_dir).map_err(|e| {
                CollaboratorFailure::failed(format!(
                    "failed to clear stale run {}: {}",
                    run_dir.display(),
                    e
                ))
            })?;
        }

        let output = run_with_timeout(self.command(job), self.config.timeout)?;
        let run_dir = run_dir.is_dir().then_some(run_dir);
        if !output.status.success() {
            log::warn!(
                "{}: detector exited with {}; treating as no detections: {}",
                job.name,
                output.status,
                output.stderr.lines().last().unwrap_or("")
            );
            return Ok(DetectorOutput {
                run_dir,
                events: Vec::new(),
            });
        }
        let events = match &run_dir {
            Some(dir) => read_label_dir(&dir.join("labels"))
                .map_err(|e| CollaboratorFailure::failed(format!("{:#}", e)))?,
            None => Vec::new(),
        };
        Ok(DetectorOutput { run_dir, events })
    }
}
