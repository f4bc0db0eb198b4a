use std::path::PathBuf;

use crate::detect::result::DetectorOutput;
use crate::error::CollaboratorFailure;

/// One detector invocation over a folder of frames.
#[derive(Clone, Debug)]
pub struct DetectionJob {
    /// Folder of frames to run on.
    pub source: PathBuf,
    /// Unique run name; label output is keyed on it.
    pub name: String,
    /// Minimum box confidence reported by the detector.
    pub confidence: f32,
}

/// Smoke detector collaborator.
///
/// Lifecycle: `init` once before sharing, `detect` any number of times from
/// any worker thread, `shutdown` when done. `shutdown` must be safe to call
/// more than once.
pub trait SmokeDetector: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Optional warm-up hook (model check, binary lookup).
    fn init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Run detection over `job.source`.
    ///
    /// A run that completes without positives returns an empty output; `Err`
    /// is reserved for runs that could not complete (spawn failure, timeout).
    fn detect(&self, job: &DetectionJob) -> Result<DetectorOutput, CollaboratorFailure>;

    fn shutdown(&mut self) {}
}
