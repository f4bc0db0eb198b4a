use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::detect::backend::{DetectionJob, SmokeDetector};
use crate::detect::result::{read_label_dir, DetectorOutput};
use crate::error::CollaboratorFailure;

/// Stub backend for testing. Writes canned label files for the frames it is
/// told about, the same way the real detector would.
pub struct StubBackend {
    runs_dir: PathBuf,
    /// Frame stem -> label file contents.
    labels: BTreeMap<String, String>,
    failure: Option<CollaboratorFailure>,
    calls: AtomicUsize,
    shutdowns: usize,
}

impl StubBackend {
    pub fn new(runs_dir: impl Into<PathBuf>) -> Self {
        Self {
            runs_dir: runs_dir.into(),
            labels: BTreeMap::new(),
            failure: None,
            calls: AtomicUsize::new(0),
            shutdowns: 0,
        }
    }

    /// Report a smoke box on the frame named `stem` if it exists in the job.
    pub fn with_detection(mut self, stem: &str, confidence: f32) -> Self {
        let line = format!("0 0.5 0.5 0.1 0.1 {:.2}\n", confidence);
        self.labels.entry(stem.to_string()).or_default().push_str(&line);
        self
    }

    pub fn failing(mut self, failure: CollaboratorFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns
    }
}

impl SmokeDetector for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&self, job: &DetectionJob) -> Result<DetectorOutput, CollaboratorFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        let run_dir = self.runs_dir.join(&job.name);
        let labels_dir = run_dir.join("labels");
        let io = |e: std::io::Error| CollaboratorFailure::failed(e.to_string());
        fs::create_dir_all(&labels_dir).map_err(io)?;
        for (stem, contents) in &self.labels {
            if job.source.join(format!("{}.jpg", stem)).exists() {
                fs::write(labels_dir.join(format!("{}.txt", stem)), contents).map_err(io)?;
            }
        }
        let events =
            read_label_dir(&labels_dir).map_err(|e| CollaboratorFailure::failed(e.to_string()))?;
        Ok(DetectorOutput {
            run_dir: Some(run_dir),
            events,
        })
    }

    fn shutdown(&mut self) {
        self.shutdowns += 1;
    }
}
