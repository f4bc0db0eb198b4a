//! Frame timestamps.
//!
//! Frames and detector labels carry their capture time in the file name as
//! `YYYY_MM_DDThh_mm_ss`. Parsing happens once, at the edge, into a
//! [`TimestampedItem`]; everything downstream works on typed times.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{FixedOffset, NaiveDateTime, Utc};
use regex::Regex;

use crate::error::PipelineError;

pub const TIMESTAMP_FORMAT: &str = "%Y_%m_%dT%H_%M_%S";

fn timestamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\d{4}_\d{2}_\d{2}T\d{2}_\d{2}_\d{2}").expect("static timestamp regex")
    })
}

/// Extract the first `YYYY_MM_DDThh_mm_ss` substring of `id` and parse it.
pub fn parse_timestamp(id: &str) -> Result<NaiveDateTime, PipelineError> {
    let parse_error = || PipelineError::Parse {
        input: id.to_string(),
    };
    let found = timestamp_pattern().find(id).ok_or_else(parse_error)?;
    NaiveDateTime::parse_from_str(found.as_str(), TIMESTAMP_FORMAT).map_err(|_| parse_error())
}

pub fn format_timestamp(time: &NaiveDateTime) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Wall-clock time at the camera network's fixed UTC offset.
pub fn local_now(offset: FixedOffset) -> NaiveDateTime {
    Utc::now().with_timezone(&offset).naive_local()
}

/// A file identifier paired with the capture time encoded in it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimestampedItem {
    pub time: NaiveDateTime,
    pub id: String,
}

impl TimestampedItem {
    pub fn parse(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into();
        let time = parse_timestamp(&id)?;
        Ok(Self { time, id })
    }

    /// Parse from the file name of `path` only; parent folders may carry
    /// their own (download-run) timestamp.
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| PipelineError::Parse {
                input: path.display().to_string(),
            })?;
        Self::parse(name)
    }
}

/// Parse the file name of every path, logging and returning the paths that
/// carry no timestamp.
pub fn parse_all<'a, I>(paths: I, scope: &str) -> (Vec<TimestampedItem>, Vec<PathBuf>)
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    let mut items = Vec::new();
    let mut skipped = Vec::new();
    for path in paths {
        match TimestampedItem::from_path(path) {
            Ok(item) => items.push(item),
            Err(err) => {
                log::warn!("{}: skipping {}", scope, err);
                skipped.push(path.clone());
            }
        }
    }
    (items, skipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn parses_embedded_timestamp() {
        let t = parse_timestamp("2024_06_01T12_14_59.jpg").unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 14, 59)
            .unwrap();
        assert_eq!(t, expected);
        assert_eq!(format_timestamp(&t), "2024_06_01T12_14_59");
    }

    #[test]
    fn rejects_missing_or_invalid_timestamp() {
        assert_eq!(
            parse_timestamp("00000042.jpg"),
            Err(PipelineError::Parse {
                input: "00000042.jpg".to_string()
            })
        );
        // Matches the lexical pattern but is not a real date.
        assert!(parse_timestamp("2024_13_45T99_00_00.jpg").is_err());
    }

    #[test]
    fn from_path_ignores_timestamped_parent_folders() {
        let path = Path::new("dl_frames/2024_06_01T00_00_00/axis-cam/2024_06_01T10_00_00.jpg");
        let item = TimestampedItem::from_path(path).unwrap();
        assert_eq!(item.id, "2024_06_01T10_00_00.jpg");
        assert_eq!(format_timestamp(&item.time), "2024_06_01T10_00_00");
    }

    #[test]
    fn parse_all_skips_malformed_entries() {
        let paths: Vec<PathBuf> = [
            "day/cam/2024_06_01T10_00_00.jpg",
            "day/cam/thumbs.db",
            "day/cam/2024_06_01T10_01_00.jpg",
        ]
        .into_iter()
        .map(PathBuf::from)
        .collect();
        let (items, skipped) = parse_all(&paths, "test");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "2024_06_01T10_00_00.jpg");
        assert_eq!(skipped, vec![PathBuf::from("day/cam/thumbs.db")]);
    }
}
