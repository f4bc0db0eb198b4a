use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::timestamp::TimestampedItem;

/// One detected box, as written by the detector's `save_txt save_conf` mode.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelRecord {
    /// Stem of the image the box belongs to.
    pub image_stem: String,
    pub class_id: u32,
    /// Box center and size, normalized 0..1.
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub confidence: Option<f32>,
}

/// Parse one `class cx cy w h [conf]` line.
pub fn parse_label_line(image_stem: &str, line: &str) -> Result<LabelRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 5 && fields.len() != 6 {
        return Err(anyhow!(
            "expected 5 or 6 fields in label line, got {}",
            fields.len()
        ));
    }
    let num = |i: usize| -> Result<f32> {
        fields[i]
            .parse::<f32>()
            .map_err(|_| anyhow!("invalid number '{}' in label line", fields[i]))
    };
    Ok(LabelRecord {
        image_stem: image_stem.to_string(),
        class_id: fields[0]
            .parse()
            .map_err(|_| anyhow!("invalid class id '{}'", fields[0]))?,
        x: num(1)?,
        y: num(2)?,
        w: num(3)?,
        h: num(4)?,
        confidence: if fields.len() == 6 { Some(num(5)?) } else { None },
    })
}

/// A labelled image: one detection event, carrying its label file.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionEvent {
    pub label_file: PathBuf,
    pub records: Vec<LabelRecord>,
}

impl DetectionEvent {
    pub fn from_label_file(path: &Path) -> Result<Self> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("label file without a name: {}", path.display()))?;
        let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let records = raw
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| parse_label_line(stem, line))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("parse {}", path.display()))?;
        Ok(Self {
            label_file: path.to_path_buf(),
            records,
        })
    }

    pub fn image_stem(&self) -> &str {
        self.label_file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }
}

/// Everything a detector run produced for one folder.
#[derive(Clone, Debug, Default)]
pub struct DetectorOutput {
    /// Directory the detector wrote its run into; removed after archival.
    pub run_dir: Option<PathBuf>,
    pub events: Vec<DetectionEvent>,
}

impl DetectorOutput {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events keyed by the label file name, with their parsed times. Events
    /// whose name carries no timestamp are logged and skipped.
    pub fn timestamped(&self, scope: &str) -> BTreeMap<TimestampedItem, &DetectionEvent> {
        let mut out = BTreeMap::new();
        for event in &self.events {
            match TimestampedItem::from_path(&event.label_file) {
                Ok(item) => {
                    out.insert(item, event);
                }
                Err(err) => log::warn!("{}: skipping label {}", scope, err),
            }
        }
        out
    }
}

/// Read every `*.txt` label file under `labels_dir`, sorted by name. A
/// missing directory means the detector found nothing.
pub fn read_label_dir(labels_dir: &Path) -> Result<Vec<DetectionEvent>> {
    if !labels_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(labels_dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "txt") {
            files.push(path);
        }
    }
    files.sort();
    files
        .iter()
        .map(|path| DetectionEvent::from_label_file(path))
        .filter(|event| !matches!(event, Ok(ev) if ev.records.is_empty()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_label_lines_with_and_without_confidence() {
        let rec = parse_label_line("2024_06_01T10_00_00", "0 0.5 0.25 0.1 0.2 0.87").unwrap();
        assert_eq!(rec.class_id, 0);
        assert_eq!(rec.x, 0.5);
        assert_eq!(rec.h, 0.2);
        assert_eq!(rec.confidence, Some(0.87));

        let rec = parse_label_line("a", "1 0.5 0.5 0.1 0.1").unwrap();
        assert_eq!(rec.confidence, None);

        assert!(parse_label_line("a", "0 0.5 0.5").is_err());
        assert!(parse_label_line("a", "smoke 0.5 0.5 0.1 0.1").is_err());
    }

    #[test]
    fn reads_label_directory() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        fs::write(
            tmp.path().join("2024_06_01T10_00_00.txt"),
            "0 0.5 0.5 0.1 0.1 0.40\n0 0.2 0.2 0.1 0.1 0.90\n",
        )?;
        fs::write(tmp.path().join("2024_06_01T10_05_00.txt"), "\n")?;
        fs::write(tmp.path().join("readme.md"), "ignored")?;

        let events = read_label_dir(tmp.path())?;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].image_stem(), "2024_06_01T10_00_00");
        assert_eq!(events[0].records.len(), 2);
        assert_eq!(events[0].records[1].confidence, Some(0.90));

        assert!(read_label_dir(&tmp.path().join("missing"))?.is_empty());
        Ok(())
    }
}
