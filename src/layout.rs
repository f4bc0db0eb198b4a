//! On-disk layout of the scrape.
//!
//! ```text
//! <output>/dl_frames/<day>/<camera>/<YYYY_MM_DDThh_mm_ss>.jpg
//! <output>/dl_frames_splited/<day>/<camera>/cam_NN/<...>.jpg
//! <output>/done/<day>_<camera>.zip
//! ```
//!
//! `<day>` is the download run's folder name; it starts with `YYYY_MM_DD`.
//! A folder that still exists is a job that has not been done yet.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

pub const FRAME_EXTENSION: &str = "jpg";

/// A leaf folder of frames belonging to one camera on one download day.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct CameraFolder {
    pub day: String,
    pub camera: String,
    pub path: PathBuf,
}

impl CameraFolder {
    /// Run/archive name, unique across the scrape.
    pub fn name(&self) -> String {
        format!("{}_{}", self.day, self.camera)
    }

    pub fn date(&self) -> Option<NaiveDate> {
        parse_day(&self.day)
    }

    pub fn frames(&self) -> Result<Vec<PathBuf>> {
        list_frames(&self.path)
    }
}

impl std::fmt::Display for CameraFolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Calendar date of a day folder name (`2024_06_01` or `2024_06_01T10_00_00`).
pub fn parse_day(day: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(day.get(..10)?, "%Y_%m_%d").ok()
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        entries.push(entry?.path());
    }
    entries.sort();
    Ok(entries)
}

pub fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(sorted_entries(dir)?
        .into_iter()
        .filter(|p| p.is_dir())
        .collect())
}

/// Day folders under `root`, oldest first. A missing root has none.
pub fn day_folders(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    subdirectories(root)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Every leaf folder below a day folder, as typed camera folders.
///
/// Nested folders (`<camera>/cam_NN` after splitting) become camera ids
/// joined with `_`.
pub fn camera_folders(day_folder: &Path) -> Result<Vec<CameraFolder>> {
    let day = dir_name(day_folder);
    let mut out = Vec::new();
    let mut pending = vec![(day_folder.to_path_buf(), Vec::<String>::new())];
    while let Some((dir, parts)) = pending.pop() {
        let children = subdirectories(&dir)?;
        if children.is_empty() && !parts.is_empty() {
            out.push(CameraFolder {
                day: day.clone(),
                camera: parts.join("_"),
                path: dir,
            });
            continue;
        }
        for child in children {
            let mut child_parts = parts.clone();
            child_parts.push(dir_name(&child));
            pending.push((child, child_parts));
        }
    }
    out.sort();
    Ok(out)
}

/// JPEG frames directly inside `dir`, sorted by name (i.e. by time).
pub fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(sorted_entries(dir)?
        .into_iter()
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(FRAME_EXTENSION))
        })
        .collect())
}

/// Remove the immediate subfolders of `root` that are empty. Returns how
/// many were removed.
pub fn remove_empty_subfolders(root: &Path) -> Result<usize> {
    let mut removed = 0;
    for dir in day_folders(root)? {
        if fs::read_dir(&dir)?.next().is_none() {
            fs::remove_dir(&dir).with_context(|| format!("remove {}", dir.display()))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Remove every empty folder below `dir`, bottom-up, and `dir` itself if it
/// ends up empty. Returns how many folders were removed.
pub fn prune_empty_tree(dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for child in subdirectories(dir)? {
        removed += prune_empty_tree(&child)?;
    }
    if fs::read_dir(dir)?.next().is_none() {
        fs::remove_dir(dir).with_context(|| format!("remove {}", dir.display()))?;
        removed += 1;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_day_prefix() {
        assert_eq!(parse_day("2024_06_01"), NaiveDate::from_ymd_opt(2024, 6, 1));
        assert_eq!(
            parse_day("2024_06_01T10_00_00"),
            NaiveDate::from_ymd_opt(2024, 6, 1)
        );
        assert_eq!(parse_day("latest"), None);
        assert_eq!(parse_day(""), None);
    }

    #[test]
    fn discovers_flat_and_split_camera_folders() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let day = tmp.path().join("2024_06_01T10_00_00");
        fs::create_dir_all(day.join("axis-a"))?;
        fs::create_dir_all(day.join("axis-b").join("cam_00"))?;
        fs::create_dir_all(day.join("axis-b").join("cam_03"))?;
        fs::write(day.join("axis-a").join("2024_06_01T10_00_00.jpg"), b"x")?;
        fs::write(day.join("axis-a").join("notes.txt"), b"x")?;

        let folders = camera_folders(&day)?;
        let names: Vec<String> = folders.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            vec![
                "2024_06_01T10_00_00_axis-a",
                "2024_06_01T10_00_00_axis-b_cam_00",
                "2024_06_01T10_00_00_axis-b_cam_03",
            ]
        );
        assert_eq!(folders[0].date(), NaiveDate::from_ymd_opt(2024, 6, 1));
        assert_eq!(folders[0].frames()?.len(), 1);
        Ok(())
    }

    #[test]
    fn removes_only_empty_subfolders() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        fs::create_dir_all(tmp.path().join("empty"))?;
        fs::create_dir_all(tmp.path().join("full"))?;
        fs::write(tmp.path().join("full").join("a.jpg"), b"x")?;

        assert_eq!(remove_empty_subfolders(tmp.path())?, 1);
        assert!(!tmp.path().join("empty").exists());
        assert!(tmp.path().join("full").exists());
        assert_eq!(day_folders(&tmp.path().join("missing"))?.len(), 0);
        Ok(())
    }

    #[test]
    fn prunes_nested_empty_camera_folders() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let day = tmp.path().join("2024_06_01");
        fs::create_dir_all(day.join("axis-a").join("cam_00"))?;
        fs::create_dir_all(day.join("axis-b").join("cam_01"))?;
        fs::write(day.join("axis-b").join("cam_01").join("a.jpg"), b"x")?;

        assert_eq!(prune_empty_tree(&day)?, 2);
        assert!(!day.join("axis-a").exists());
        assert!(day.join("axis-b").join("cam_01").exists());

        fs::remove_file(day.join("axis-b").join("cam_01").join("a.jpg"))?;
        assert_eq!(prune_empty_tree(&day)?, 3);
        assert!(!day.exists());
        Ok(())
    }
}
