//! Per-folder detection pipeline.
//!
//! For each camera folder:
//! 1. Run the smoke detector over its frames
//! 2. Turn labelled frames into retention windows
//! 3. Partition frames into keep/discard
//! 4. Archive kept frames with the retained labels, then drop the folder
//!
//! Frames whose name carries no timestamp are moved to
//! `<done_dir>/rejected/<folder>/` before the folder is removed.
//! A folder whose detector run fails is left in place so the next pass
//! retries it. Folders are independent; a batch never stops on one failure.

use anyhow::Result;
use chrono::{FixedOffset, NaiveDateTime, Timelike};
use std::path::PathBuf;

use crate::archive::{remove_working_dir, set_aside, write_bundle, ArchiveRequest};
use crate::detect::{DetectionJob, SmokeDetector};
use crate::error::PipelineError;
use crate::layout::CameraFolder;
use crate::pool::{TaskFailure, TaskReport, WorkerPool};
use crate::retention::{build_windows, filter_images, retained_events, RetentionPolicy};
use crate::timestamp::{local_now, parse_all, TimestampedItem};

pub const DEFAULT_CONFIDENCE: f32 = 0.2;
/// Local hours at which the download job runs.
pub const DEFAULT_QUIET_HOURS: [u32; 3] = [19, 1, 7];
pub const REJECTED_DIR: &str = "rejected";

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub done_dir: PathBuf,
    pub confidence: f32,
    pub policy: RetentionPolicy,
    pub quiet_hours: Vec<u32>,
    pub utc_offset: FixedOffset,
}

impl PipelineSettings {
    /// Where untimestamped frames of `folder` are kept.
    pub fn rejected_dir(&self, folder: &str) -> PathBuf {
        self.done_dir.join(REJECTED_DIR).join(folder)
    }

    pub fn in_quiet_hours(&self, now: NaiveDateTime) -> bool {
        self.quiet_hours.contains(&now.hour())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FolderReport {
    pub name: String,
    pub images: usize,
    pub kept: usize,
    pub discarded: usize,
    /// Frames whose name carries no timestamp; set aside, not archived.
    pub skipped: usize,
    pub detections: usize,
    pub retained_detections: usize,
    pub windows: usize,
    pub archive: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FolderOutcome {
    /// Kept frames were bundled into `report.archive`.
    Archived(FolderReport),
    /// Nothing worth keeping; folder removed without a bundle.
    Empty(FolderReport),
    /// Skipped during quiet hours; folder untouched.
    Deferred,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub archived: usize,
    pub empty: usize,
    pub deferred: usize,
    pub failed: usize,
}

pub struct Pipeline<'a> {
    detector: &'a dyn SmokeDetector,
    settings: &'a PipelineSettings,
}

impl<'a> Pipeline<'a> {
    pub fn new(detector: &'a dyn SmokeDetector, settings: &'a PipelineSettings) -> Self {
        Self { detector, settings }
    }

    pub fn process_folder(&self, folder: &CameraFolder) -> Result<FolderOutcome> {
        let name = folder.name();
        let frames = folder.frames()?;
        let mut report = FolderReport {
            name: name.clone(),
            images: frames.len(),
            ..FolderReport::default()
        };
        if frames.is_empty() {
            remove_working_dir(&folder.path)?;
            return Ok(FolderOutcome::Empty(report));
        }

        let (images, skipped) = parse_all(&frames, &name);
        report.skipped = skipped.len();

        let job = DetectionJob {
            source: folder.path.clone(),
            name: name.clone(),
            confidence: self.settings.confidence,
        };
        let output = self
            .detector
            .detect(&job)
            .map_err(|failure| PipelineError::collaborator("detector", name.as_str(), failure))?;

        let events = output.timestamped(&name);
        report.detections = events.len();
        let detected: Vec<TimestampedItem> = events.keys().cloned().collect();
        let retained = retained_events(&detected, &self.settings.policy);
        report.retained_detections = retained.len();
        let times: Vec<NaiveDateTime> = detected.iter().map(|item| item.time).collect();
        let windows = build_windows(&times, &self.settings.policy);
        report.windows = windows.len();

        let partition = filter_images(&images, &windows);
        report.kept = partition.keep.len();
        report.discarded = partition.discard.len();

        let outcome = if partition.keep.is_empty() {
            FolderOutcome::Empty(report)
        } else {
            let request = ArchiveRequest {
                name: name.clone(),
                images: partition
                    .keep
                    .iter()
                    .map(|id| folder.path.join(id))
                    .collect(),
                labels: retained
                    .iter()
                    .filter_map(|item| events.get(item))
                    .map(|event| event.label_file.clone())
                    .collect(),
            };
            report.archive = Some(write_bundle(&self.settings.done_dir, &request)?);
            FolderOutcome::Archived(report)
        };

        set_aside(&self.settings.rejected_dir(&name), &skipped)?;
        remove_working_dir(&folder.path)?;
        if let Some(run_dir) = &output.run_dir {
            remove_working_dir(run_dir)?;
        }
        Ok(outcome)
    }

    /// Process folders on the pool, logging each outcome as it completes.
    pub fn run_batch<F>(
        &self,
        folders: Vec<CameraFolder>,
        pool: &WorkerPool,
        mut on_done: F,
    ) -> BatchSummary
    where
        F: FnMut(&TaskReport<FolderOutcome>),
    {
        let mut summary = BatchSummary::default();
        pool.run_with(
            folders,
            |folder| folder.name(),
            |folder| {
                if self.settings.in_quiet_hours(local_now(self.settings.utc_offset)) {
                    return Ok(FolderOutcome::Deferred);
                }
                self.process_folder(&folder)
            },
            |report| {
                match &report.result {
                    Ok(FolderOutcome::Archived(r)) => {
                        summary.archived += 1;
                        log::info!(
                            "{}: kept {}/{} frames ({} of {} detections retained)",
                            r.name,
                            r.kept,
                            r.images,
                            r.retained_detections,
                            r.detections
                        );
                    }
                    Ok(FolderOutcome::Empty(r)) => {
                        summary.empty += 1;
                        log::info!("{}: nothing kept from {} frames", r.name, r.images);
                    }
                    Ok(FolderOutcome::Deferred) => summary.deferred += 1,
                    Err(failure) => {
                        summary.failed += 1;
                        log_folder_failure(&report.label, failure);
                    }
                }
                on_done(&report);
            },
        );
        summary
    }
}

fn log_folder_failure(folder: &str, failure: &TaskFailure) {
    match failure {
        TaskFailure::Error(err) => match err.downcast_ref::<PipelineError>() {
            Some(kind) => log::error!("{}: {} (folder kept for re-run)", folder, kind),
            None => log::error!("{}: {:#}", folder, err),
        },
        TaskFailure::Panicked(_) => log::error!("{}: {}", folder, failure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::StubBackend;
    use std::fs;

    fn settings(done_dir: PathBuf) -> PipelineSettings {
        PipelineSettings {
            done_dir,
            confidence: DEFAULT_CONFIDENCE,
            policy: RetentionPolicy::default(),
            quiet_hours: vec![],
            utc_offset: FixedOffset::west_opt(7 * 3600).unwrap(),
        }
    }

    #[test]
    fn quiet_hours_use_local_hour() {
        let mut s = settings(PathBuf::from("done"));
        s.quiet_hours = DEFAULT_QUIET_HOURS.to_vec();
        let at = |h: u32| {
            chrono::NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(h, 30, 0)
                .unwrap()
        };
        assert!(s.in_quiet_hours(at(19)));
        assert!(s.in_quiet_hours(at(1)));
        assert!(!s.in_quiet_hours(at(12)));
    }

    #[test]
    fn empty_folder_is_removed_without_detection() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("2024_06_01").join("axis-a");
        fs::create_dir_all(&path)?;
        let folder = CameraFolder {
            day: "2024_06_01".to_string(),
            camera: "axis-a".to_string(),
            path: path.clone(),
        };
        let detector = StubBackend::new(tmp.path().join("runs"));
        let s = settings(tmp.path().join("done"));

        let outcome = Pipeline::new(&detector, &s).process_folder(&folder)?;
        assert!(matches!(outcome, FolderOutcome::Empty(_)));
        assert!(!path.exists());
        assert_eq!(detector.calls(), 0);
        Ok(())
    }
}
