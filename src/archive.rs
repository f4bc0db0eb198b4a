//! Archival of retained frames.
//!
//! A bundle is a zip with `images/` and `labels/` written next to its final
//! name and renamed into place, so `done/` only ever holds complete bundles.

use anyhow::{anyhow, Context, Result};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Files to bundle under one name.
#[derive(Clone, Debug, Default)]
pub struct ArchiveRequest {
    pub name: String,
    pub images: Vec<PathBuf>,
    pub labels: Vec<PathBuf>,
}

fn entry_name(dir: &str, path: &Path) -> Result<String> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("unarchivable file name: {}", path.display()))?;
    Ok(format!("{}/{}", dir, file_name))
}

/// Write `<done_dir>/<name>.zip` and return its path.
pub fn write_bundle(done_dir: &Path, request: &ArchiveRequest) -> Result<PathBuf> {
    fs::create_dir_all(done_dir).with_context(|| format!("create {}", done_dir.display()))?;
    let final_path = done_dir.join(format!("{}.zip", request.name));
    let part_path = done_dir.join(format!("{}.zip.part", request.name));

    let written = (|| -> Result<()> {
        let file = File::create(&part_path)?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (dir, files) in [("images", &request.images), ("labels", &request.labels)] {
            zip.add_directory(format!("{}/", dir), options)?;
            for path in files {
                zip.start_file(entry_name(dir, path)?, options)?;
                let mut src = File::open(path).with_context(|| format!("open {}", path.display()))?;
                io::copy(&mut src, &mut zip)?;
            }
        }
        zip.finish()?;
        Ok(())
    })();

    if let Err(err) = written {
        let _ = fs::remove_file(&part_path);
        return Err(err.context(format!("write bundle {}", final_path.display())));
    }
    fs::rename(&part_path, &final_path)
        .with_context(|| format!("finalize bundle {}", final_path.display()))?;
    Ok(final_path)
}

/// Move `files` into `dir`, creating it. Used for frames that cannot be
/// placed in time, so removing their folder does not lose them.
pub fn set_aside(dir: &Path, files: &[PathBuf]) -> Result<()> {
    if files.is_empty() {
        return Ok(());
    }
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    for file in files {
        let name = file
            .file_name()
            .ok_or_else(|| anyhow!("not a file: {}", file.display()))?;
        let target = dir.join(name);
        if fs::rename(file, &target).is_err() {
            fs::copy(file, &target)
                .with_context(|| format!("copy {} to {}", file.display(), target.display()))?;
            fs::remove_file(file).with_context(|| format!("remove {}", file.display()))?;
        }
    }
    Ok(())
}

/// Remove a finished working directory; a missing one is already done.
pub fn remove_working_dir(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(anyhow!("failed to remove {}: {}", path.display(), e)),
    }
}
