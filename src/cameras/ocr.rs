//! Pan-angle readings from the camera overlay.
//!
//! PTZ cameras stamp their position as `X:123.45 Y:.. Z:..` on each frame.
//! The OCR model itself is an external collaborator; this module owns the
//! text handling around it and the [`AngleReader`] seam.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;

use super::cluster::UNREADABLE_ANGLE;
use crate::error::CollaboratorFailure;
use crate::process::run_with_timeout;

fn x_value_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[Xx]:?[-+]?\d+\.\d+").expect("static x-value regex"))
}

/// Clean up raw overlay text: OCR reads `+` as `*`, and everything from the
/// `Y:`/`Z:` fields onward is irrelevant to the pan angle.
pub fn normalize_overlay_text(raw: &str) -> String {
    let text = raw.replace('*', "+");
    let cut = ["Y:", "Z:"]
        .iter()
        .filter_map(|marker| text.find(marker))
        .min()
        .unwrap_or(text.len());
    text[..cut].to_string()
}

/// First `X:` reading in `text`, or [`UNREADABLE_ANGLE`].
pub fn extract_x_value(text: &str) -> f64 {
    x_value_pattern()
        .find(text)
        .and_then(|m| {
            m.as_str()
                .trim_start_matches(|c| c == 'x' || c == 'X' || c == ':')
                .parse::<f64>()
                .ok()
        })
        .unwrap_or(UNREADABLE_ANGLE)
}

/// OCR collaborator: one reading per input image, in input order.
///
/// Frames whose overlay cannot be read yield [`UNREADABLE_ANGLE`]; an `Err`
/// means the whole batch failed.
pub trait AngleReader: Send {
    fn name(&self) -> &'static str;

    fn read_angles(&mut self, images: &[PathBuf]) -> Result<Vec<f64>, CollaboratorFailure>;

    fn shutdown(&mut self) {}
}

/// Runs an external OCR program over a batch of images.
///
/// The program receives the image paths as trailing arguments and prints one
/// `<path>\t<overlay text>` line per image it could read.
pub struct CommandAngleReader {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandAngleReader {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }
}

fn parse_ocr_lines(stdout: &str) -> HashMap<PathBuf, String> {
    stdout
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(path, text)| (PathBuf::from(path.trim()), text.to_string()))
        .collect()
}

impl AngleReader for CommandAngleReader {
    fn name(&self) -> &'static str {
        "command"
    }

    fn read_angles(&mut self, images: &[PathBuf]) -> Result<Vec<f64>, CollaboratorFailure> {
        if images.is_empty() {
            return Ok(Vec::new());
        }
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).args(images);
        let output = run_with_timeout(cmd, self.timeout)?;
        if !output.status.success() {
            return Err(CollaboratorFailure::failed(format!(
                "ocr exited with {}: {}",
                output.status,
                output.stderr.trim()
            )));
        }
        let texts = parse_ocr_lines(&output.stdout);
        Ok(images
            .iter()
            .map(|image| {
                texts
                    .get(image)
                    .map(|text| extract_x_value(&normalize_overlay_text(text)))
                    .unwrap_or(UNREADABLE_ANGLE)
            })
            .collect())
    }
}

/// In-memory readings keyed by file name, for tests and replays.
#[derive(Clone, Debug, Default)]
pub struct FixedAngleReader {
    readings: HashMap<String, f64>,
    fail: bool,
}

impl FixedAngleReader {
    pub fn new<I, S>(readings: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            readings: readings.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            fail: false,
        }
    }

    /// A reader whose every batch fails.
    pub fn failing() -> Self {
        Self {
            readings: HashMap::new(),
            fail: true,
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl AngleReader for FixedAngleReader {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn read_angles(&mut self, images: &[PathBuf]) -> Result<Vec<f64>, CollaboratorFailure> {
        if self.fail {
            return Err(CollaboratorFailure::failed("ocr unavailable"));
        }
        Ok(images
            .iter()
            .map(|image| {
                self.readings
                    .get(&file_name(image))
                    .copied()
                    .unwrap_or(UNREADABLE_ANGLE)
            })
            .collect())
    }
}
