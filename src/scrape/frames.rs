//! Frame naming and usability checks.

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDateTime};
use image::DynamicImage;
use std::fs;
use std::path::{Path, PathBuf};

use crate::timestamp::format_timestamp;

/// Seconds covered by a time-lapse preset such as `"12h"` or `"15mn"`.
pub fn duration_to_seconds(preset: &str) -> Result<u64> {
    let preset = preset.trim().to_lowercase();
    let (value, unit_secs) = if let Some(hours) = preset.strip_suffix('h') {
        (hours, 60 * 60)
    } else if let Some(minutes) = preset.strip_suffix("mn") {
        (minutes, 60)
    } else {
        return Err(anyhow!(
            "invalid duration preset '{}'; expected e.g. 12h or 15mn",
            preset
        ));
    };
    let value: u64 = value
        .parse()
        .map_err(|_| anyhow!("invalid duration preset '{}'", preset))?;
    Ok(value * unit_secs)
}

/// Capture times for `count` frames spread evenly over `span` ending at `end`.
pub fn frame_times(count: usize, end: NaiveDateTime, span_secs: u64) -> Vec<NaiveDateTime> {
    if count == 0 {
        return Vec::new();
    }
    let step_ms = (span_secs * 1000) as f64 / count as f64;
    let start = end - Duration::seconds(span_secs as i64);
    (0..count)
        .map(|i| start + Duration::milliseconds((step_ms * i as f64) as i64))
        .collect()
}

/// Write frames as `<timestamp>.jpg` into `dir`. Frames that land on an
/// already-used second are dropped.
pub fn write_frames(dir: &Path, frames: &[&[u8]], times: &[NaiveDateTime]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let mut written = Vec::with_capacity(frames.len());
    for (frame, time) in frames.iter().zip(times) {
        let path = dir.join(format!("{}.jpg", format_timestamp(time)));
        if path.exists() {
            log::debug!("duplicate frame time {}, dropping frame", path.display());
            continue;
        }
        fs::write(&path, frame).with_context(|| format!("write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameCheck {
    Usable,
    /// Infrared night frame: no colour in the lower half.
    Grayscale,
    Undecodable,
}

/// True if the bottom half carries no blue-over-green signal.
///
/// Mirrors an unsigned per-pixel `blue - green` (wrapping) reduced with max:
/// only frames where that difference is zero everywhere count as gray.
pub fn is_grayscale(image: &DynamicImage) -> bool {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    for y in height / 2..height {
        for x in 0..width {
            let [_, g, b] = rgb.get_pixel(x, y).0;
            if b.wrapping_sub(g) != 0 {
                return false;
            }
        }
    }
    true
}

pub fn check_frame(path: &Path) -> FrameCheck {
    match image::open(path) {
        Ok(image) if is_grayscale(&image) => FrameCheck::Grayscale,
        Ok(_) => FrameCheck::Usable,
        Err(err) => {
            log::warn!("cannot decode {}: {}", path.display(), err);
            FrameCheck::Undecodable
        }
    }
}

/// Check a frame and delete it if it is unusable.
pub fn remove_if_unusable(path: &Path) -> Result<FrameCheck> {
    let check = check_frame(path);
    if check != FrameCheck::Usable {
        fs::remove_file(path).with_context(|| format!("remove {}", path.display()))?;
    }
    Ok(check)
}
