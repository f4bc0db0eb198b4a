use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

use super::cluster::{
    assign_clusters, is_static_camera, AngleSample, ClusterParams, NO_ROTATION_CAMERA,
};
use super::ocr::AngleReader;
use crate::error::PipelineError;
use crate::layout::CameraFolder;

pub const DEFAULT_OCR_BATCH_SIZE: usize = 50;
pub const DEFAULT_PROBE_IMAGES: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplitSettings {
    pub params: ClusterParams,
    /// Frames per OCR call.
    pub batch_size: usize,
    /// Leading frames read to decide whether the camera rotates at all.
    pub probe_images: usize,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            params: ClusterParams::default(),
            batch_size: DEFAULT_OCR_BATCH_SIZE,
            probe_images: DEFAULT_PROBE_IMAGES,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SplitOutcome {
    /// Folder had no frames; removed.
    Empty,
    /// Whole folder moved under the synthetic no-rotation camera.
    Static { frames: usize },
    /// Frames moved per accepted camera; the rest were dropped.
    Rotating {
        cameras: Vec<(String, usize)>,
        rejected: usize,
    },
}

/// A download day is complete once the local date has moved past it.
pub fn is_complete_day(folder: &CameraFolder, today: NaiveDate) -> bool {
    folder.date().is_some_and(|date| date < today)
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).with_context(|| format!("copy {} -> {}", from.display(), to.display()))?;
    fs::remove_file(from).with_context(|| format!("remove {}", from.display()))?;
    Ok(())
}

/// Read the angle of every frame. Sample ids are indices into `frames`, so
/// paths never round-trip through a (possibly lossy) string.
fn read_samples(
    reader: &mut dyn AngleReader,
    frames: &[PathBuf],
    batch_size: usize,
    scope: &str,
) -> Result<Vec<AngleSample>, PipelineError> {
    let batch_size = batch_size.max(1);
    let mut samples = Vec::with_capacity(frames.len());
    for (n, batch) in frames.chunks(batch_size).enumerate() {
        let angles = reader
            .read_angles(batch)
            .map_err(|failure| PipelineError::collaborator("ocr", scope, failure))?;
        for (i, angle) in angles.into_iter().take(batch.len()).enumerate() {
            samples.push(AngleSample::new((n * batch_size + i).to_string(), angle));
        }
    }
    Ok(samples)
}

fn frame_at<'a>(frames: &'a [PathBuf], id: &str) -> Result<&'a PathBuf> {
    id.parse::<usize>()
        .ok()
        .and_then(|index| frames.get(index))
        .ok_or_else(|| anyhow!("no frame for sample {}", id))
}

/// Split one camera folder into `<split_root>/<day>/<camera>/cam_NN/`.
///
/// On OCR failure nothing is moved and the folder stays for a re-run.
pub fn split_camera_folder(
    folder: &CameraFolder,
    split_root: &Path,
    reader: &mut dyn AngleReader,
    settings: &SplitSettings,
) -> Result<SplitOutcome> {
    let scope = folder.name();
    let frames = folder.frames()?;
    let target = split_root.join(&folder.day).join(&folder.camera);
    if frames.is_empty() {
        fs::remove_dir_all(&folder.path)?;
        return Ok(SplitOutcome::Empty);
    }

    let probe_len = settings.probe_images.min(frames.len());
    let probe: Vec<f64> = read_samples(reader, &frames[..probe_len], settings.batch_size, &scope)?
        .into_iter()
        .map(|s| s.angle)
        .collect();

    if is_static_camera(&probe, settings.params.static_threshold) {
        let dest = target.join(NO_ROTATION_CAMERA);
        fs::create_dir_all(&target)?;
        if fs::rename(&folder.path, &dest).is_err() {
            fs::create_dir_all(&dest)?;
            for frame in &frames {
                move_file(frame, &dest.join(frame.file_name().unwrap_or_default()))?;
            }
            fs::remove_dir_all(&folder.path)?;
        }
        log::info!("{}: static camera, {} frames", scope, frames.len());
        return Ok(SplitOutcome::Static {
            frames: frames.len(),
        });
    }

    let samples = read_samples(reader, &frames, settings.batch_size, &scope)?;
    let assignment = assign_clusters(&samples, &settings.params);
    let mut moves = Vec::with_capacity(frames.len());
    let mut cameras = Vec::with_capacity(assignment.cameras.len());
    for group in &assignment.cameras {
        let dest = target.join(&group.camera);
        for id in &group.ids {
            let from = frame_at(&frames, id)?;
            let name = from
                .file_name()
                .ok_or_else(|| anyhow!("not a frame: {}", from.display()))?;
            moves.push((from, dest.join(name)));
        }
        cameras.push((group.camera.clone(), group.ids.len()));
    }
    for (camera, _) in &cameras {
        fs::create_dir_all(target.join(camera))?;
    }
    for (from, to) in &moves {
        move_file(from, to)?;
    }
    fs::remove_dir_all(&folder.path)?;
    log::info!(
        "{}: rotating camera, {} positions kept, {} frames rejected",
        scope,
        cameras.len(),
        assignment.rejected.len()
    );
    Ok(SplitOutcome::Rotating {
        cameras,
        rejected: assignment.rejected.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cameras::cluster::UNREADABLE_ANGLE;
    use crate::cameras::ocr::FixedAngleReader;
    use crate::layout::camera_folders;

    fn folder_with_frames(root: &Path, names: &[String]) -> Result<CameraFolder> {
        let dir = root.join("dl_frames").join("2024_06_01").join("axis-a");
        fs::create_dir_all(&dir)?;
        for name in names {
            fs::write(dir.join(name), b"jpeg")?;
        }
        Ok(camera_folders(&root.join("dl_frames").join("2024_06_01"))?.remove(0))
    }

    fn frame_name(i: usize) -> String {
        format!("2024_06_01T10_{:02}_00.jpg", i)
    }

    #[test]
    fn static_camera_moves_whole_folder() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let names: Vec<String> = (0..6).map(frame_name).collect();
        let folder = folder_with_frames(tmp.path(), &names)?;
        let mut reader =
            FixedAngleReader::new(names.iter().map(|n| (n.clone(), 100.0)).collect::<Vec<_>>());

        let split_root = tmp.path().join("dl_frames_splited");
        let outcome =
            split_camera_folder(&folder, &split_root, &mut reader, &SplitSettings::default())?;
        assert_eq!(outcome, SplitOutcome::Static { frames: 6 });
        let dest = split_root.join("2024_06_01").join("axis-a").join("cam_00");
        assert_eq!(fs::read_dir(&dest)?.count(), 6);
        assert!(!folder.path.exists());
        Ok(())
    }

    #[test]
    fn rotating_camera_is_split_by_angle() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let names: Vec<String> = (0..12).map(frame_name).collect();
        let angles = [
            10.0, 200.0, 11.0, 201.0, 12.0, 202.0, 13.0, 203.0, 90.0, UNREADABLE_ANGLE, 14.0,
            204.0,
        ];
        let folder = folder_with_frames(tmp.path(), &names)?;
        let mut reader = FixedAngleReader::new(
            names
                .iter()
                .cloned()
                .zip(angles.iter().copied())
                .collect::<Vec<_>>(),
        );

        let split_root = tmp.path().join("dl_frames_splited");
        let outcome =
            split_camera_folder(&folder, &split_root, &mut reader, &SplitSettings::default())?;
        assert_eq!(
            outcome,
            SplitOutcome::Rotating {
                cameras: vec![("cam_01".to_string(), 5), ("cam_03".to_string(), 5)],
                rejected: 2,
            }
        );
        let base = split_root.join("2024_06_01").join("axis-a");
        assert_eq!(fs::read_dir(base.join("cam_01"))?.count(), 5);
        assert!(base.join("cam_03").join(frame_name(1)).exists());
        assert!(!folder.path.exists());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_frame_names_are_moved() -> Result<()> {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let tmp = tempfile::tempdir()?;
        let mut names: Vec<String> = (0..8).map(frame_name).collect();
        let folder = folder_with_frames(tmp.path(), &names)?;
        let odd = OsString::from_vec(b"2024_06_01T10_30_00\xff.jpg".to_vec());
        fs::write(folder.path.join(&odd), b"jpeg")?;
        names.push(odd.to_string_lossy().into_owned());
        let angles = [10.0, 200.0, 11.0, 201.0, 12.0, 202.0, 13.0, 203.0, 14.0];
        let mut reader = FixedAngleReader::new(
            names
                .iter()
                .cloned()
                .zip(angles.iter().copied())
                .collect::<Vec<_>>(),
        );

        let split_root = tmp.path().join("dl_frames_splited");
        let settings = SplitSettings {
            batch_size: 4,
            ..SplitSettings::default()
        };
        split_camera_folder(&folder, &split_root, &mut reader, &settings)?;
        let base = split_root.join("2024_06_01").join("axis-a");
        assert!(base.join("cam_00").join(&odd).is_file());
        assert_eq!(fs::read_dir(base.join("cam_00"))?.count(), 5);
        assert_eq!(fs::read_dir(base.join("cam_01"))?.count(), 4);
        assert!(!folder.path.exists());
        Ok(())
    }

    #[test]
    fn ocr_failure_leaves_folder_untouched() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let names: Vec<String> = (0..3).map(frame_name).collect();
        let folder = folder_with_frames(tmp.path(), &names)?;
        let mut reader = FixedAngleReader::failing();

        let err = split_camera_folder(
            &folder,
            &tmp.path().join("out"),
            &mut reader,
            &SplitSettings::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::Collaborator {
                collaborator: "ocr",
                ..
            })
        ));
        assert_eq!(folder.frames()?.len(), 3);
        Ok(())
    }

    #[test]
    fn only_past_days_are_complete() {
        let folder = CameraFolder {
            day: "2024_06_01T10_00_00".to_string(),
            camera: "axis-a".to_string(),
            path: PathBuf::from("x"),
        };
        assert!(is_complete_day(&folder, NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()));
        assert!(!is_complete_day(&folder, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()));
    }
}
