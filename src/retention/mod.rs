//! Detection-driven frame retention.
//!
//! Detections are grouped into runs by consecutive gap; runs that are too
//! small are treated as false positives. Every detection of a surviving run
//! opens a window of `margin` on each side, and a frame is kept iff it falls
//! strictly inside at least one window.

mod filter;
mod window;

use chrono::Duration;

pub use filter::{filter_images, Partition};
pub use window::{build_windows, detection_runs, retained_events, RetentionWindow};

pub const DEFAULT_GAP_SECS: u64 = 15 * 60;
pub const DEFAULT_MARGIN_SECS: u64 = 15 * 60;
pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 2;
/// Upper bound on `gap` and `margin` accepted from configuration.
pub const MAX_RETENTION_SECS: u64 = 24 * 60 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Consecutive detections closer than this share a run.
    pub gap: Duration,
    /// Half-width of the window opened around each retained detection.
    pub margin: Duration,
    /// Runs with fewer detections are dropped.
    pub min_cluster_size: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            gap: Duration::seconds(DEFAULT_GAP_SECS as i64),
            margin: Duration::seconds(DEFAULT_MARGIN_SECS as i64),
            min_cluster_size: DEFAULT_MIN_CLUSTER_SIZE,
        }
    }
}
