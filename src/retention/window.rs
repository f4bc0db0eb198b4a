use std::ops::Range;

use chrono::{Duration, NaiveDateTime};

use super::RetentionPolicy;
use crate::timestamp::TimestampedItem;

/// Closed time interval around a detection; membership is tested exclusively
/// by [`RetentionWindow::contains`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RetentionWindow {
    pub t_min: NaiveDateTime,
    pub t_max: NaiveDateTime,
}

impl RetentionWindow {
    /// Bounds saturate at the representable range instead of overflowing.
    pub fn around(event: NaiveDateTime, margin: Duration) -> Self {
        Self {
            t_min: event
                .checked_sub_signed(margin)
                .unwrap_or(NaiveDateTime::MIN),
            t_max: event
                .checked_add_signed(margin)
                .unwrap_or(NaiveDateTime::MAX),
        }
    }

    /// Strictly inside: boundary-exact times are outside.
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.t_min < t && t < self.t_max
    }
}

/// Index ranges of maximal runs over `sorted`, where each element is less
/// than `gap` after its predecessor. Only the predecessor is consulted, so a
/// run can be much longer than `gap` end to end.
fn run_ranges(sorted: &[NaiveDateTime], gap: Duration) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..sorted.len() {
        if sorted[i] - sorted[i - 1] >= gap {
            runs.push(start..i);
            start = i;
        }
    }
    if !sorted.is_empty() {
        runs.push(start..sorted.len());
    }
    runs
}

/// Group detection events into runs by consecutive gap, in time order.
pub fn detection_runs(events: &[TimestampedItem], gap: Duration) -> Vec<Vec<TimestampedItem>> {
    let mut sorted = events.to_vec();
    sorted.sort();
    let times: Vec<NaiveDateTime> = sorted.iter().map(|event| event.time).collect();
    run_ranges(&times, gap)
        .into_iter()
        .map(|range| sorted[range].to_vec())
        .collect()
}

/// Events belonging to runs of at least `policy.min_cluster_size` members.
pub fn retained_events(events: &[TimestampedItem], policy: &RetentionPolicy) -> Vec<TimestampedItem> {
    detection_runs(events, policy.gap)
        .into_iter()
        .filter(|run| run.len() >= policy.min_cluster_size)
        .flatten()
        .collect()
}

/// Build one retention window per detection of every retained run.
///
/// Windows may overlap; they are not merged, so the result has exactly as
/// many entries as there are retained detections.
pub fn build_windows(detections: &[NaiveDateTime], policy: &RetentionPolicy) -> Vec<RetentionWindow> {
    let mut sorted = detections.to_vec();
    sorted.sort();
    run_ranges(&sorted, policy.gap)
        .into_iter()
        .filter(|range| range.len() >= policy.min_cluster_size)
        .flat_map(|range| sorted[range].to_vec())
        .map(|t| RetentionWindow::around(t, policy.margin))
        .collect()
}
