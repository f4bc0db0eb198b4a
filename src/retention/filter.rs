use std::collections::BTreeSet;

use chrono::NaiveDateTime;

use super::window::RetentionWindow;
use crate::timestamp::TimestampedItem;

/// Keep/discard split of a folder's images. Disjoint, and together they cover
/// every input id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Partition {
    pub keep: BTreeSet<String>,
    pub discard: BTreeSet<String>,
}

/// Windows indexed for "is `t` strictly inside any window" queries.
struct WindowIndex {
    starts: Vec<NaiveDateTime>,
    /// `reach[i]` is the largest `t_max` among windows `0..=i` (sorted by start).
    reach: Vec<NaiveDateTime>,
}

impl WindowIndex {
    fn new(windows: &[RetentionWindow]) -> Self {
        let mut sorted = windows.to_vec();
        sorted.sort();
        let starts = sorted.iter().map(|w| w.t_min).collect();
        let mut reach: Vec<NaiveDateTime> = Vec::with_capacity(sorted.len());
        for w in &sorted {
            let furthest = match reach.last() {
                Some(prev) if *prev > w.t_max => *prev,
                _ => w.t_max,
            };
            reach.push(furthest);
        }
        Self { starts, reach }
    }

    fn covers(&self, t: NaiveDateTime) -> bool {
        // Windows opening strictly before `t`.
        let open = self.starts.partition_point(|start| *start < t);
        open > 0 && self.reach[open - 1] > t
    }
}

/// Partition images into those strictly inside at least one window and the rest.
pub fn filter_images(images: &[TimestampedItem], windows: &[RetentionWindow]) -> Partition {
    let index = WindowIndex::new(windows);
    let mut partition = Partition::default();
    for image in images {
        if index.covers(image.time) {
            partition.keep.insert(image.id.clone());
        } else {
            partition.discard.insert(image.id.clone());
        }
    }
    partition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retention::{build_windows, RetentionPolicy};
    use chrono::{Duration, NaiveDate};

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn image(h: u32, m: u32, s: u32) -> TimestampedItem {
        TimestampedItem {
            time: at(h, m, s),
            id: format!("2024_06_01T{:02}_{:02}_{:02}.jpg", h, m, s),
        }
    }

    #[test]
    fn boundaries_are_exclusive() {
        let windows = vec![RetentionWindow::around(at(12, 0, 0), Duration::minutes(15))];
        let images = [image(11, 45, 0), image(11, 45, 1), image(12, 14, 59), image(12, 15, 0)];

        let partition = filter_images(&images, &windows);
        assert_eq!(
            partition.keep.into_iter().collect::<Vec<_>>(),
            vec!["2024_06_01T11_45_01.jpg", "2024_06_01T12_14_59.jpg"]
        );
        assert_eq!(
            partition.discard.into_iter().collect::<Vec<_>>(),
            vec!["2024_06_01T11_45_00.jpg", "2024_06_01T12_15_00.jpg"]
        );
    }

    #[test]
    fn no_windows_discards_everything() {
        let images = [image(10, 0, 0), image(11, 0, 0)];
        let partition = filter_images(&images, &[]);
        assert!(partition.keep.is_empty());
        assert_eq!(partition.discard.len(), 2);
    }

    #[test]
    fn wide_window_covers_times_past_later_narrow_windows() {
        let windows = vec![
            RetentionWindow {
                t_min: at(9, 0, 0),
                t_max: at(13, 0, 0),
            },
            RetentionWindow {
                t_min: at(10, 0, 0),
                t_max: at(10, 5, 0),
            },
        ];
        let partition = filter_images(&[image(12, 0, 0), image(13, 30, 0)], &windows);
        assert!(partition.keep.contains("2024_06_01T12_00_00.jpg"));
        assert!(partition.discard.contains("2024_06_01T13_30_00.jpg"));
    }

    #[test]
    fn matches_linear_scan_and_is_idempotent() {
        let windows = build_windows(
            &[at(10, 0, 0), at(10, 10, 0), at(13, 0, 0), at(13, 2, 0), at(16, 0, 0)],
            &RetentionPolicy::default(),
        );
        let images: Vec<TimestampedItem> = (0..24 * 60)
            .step_by(7)
            .map(|minute| image(minute / 60, minute % 60, 0))
            .collect();

        let first = filter_images(&images, &windows);
        for img in &images {
            let linear = windows.iter().any(|w| w.contains(img.time));
            assert_eq!(first.keep.contains(&img.id), linear, "{}", img.id);
        }
        assert_eq!(first.keep.len() + first.discard.len(), images.len());
        assert_eq!(filter_images(&images, &windows), first);
    }

    #[test]
    fn end_to_end_run_and_isolated_detection() {
        let windows = build_windows(
            &[at(10, 0, 0), at(10, 10, 0), at(14, 0, 0)],
            &RetentionPolicy::default(),
        );
        assert_eq!(windows.len(), 2);

        let images = [
            image(9, 45, 0),
            image(9, 45, 1),
            image(10, 24, 59),
            image(10, 25, 0),
            image(14, 0, 0),
        ];
        let partition = filter_images(&images, &windows);
        assert_eq!(
            partition.keep.into_iter().collect::<Vec<_>>(),
            vec!["2024_06_01T09_45_01.jpg", "2024_06_01T10_24_59.jpg"]
        );
        assert!(partition.discard.contains("2024_06_01T14_00_00.jpg"));
    }
}
