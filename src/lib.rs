//! Pyro Scrapper
//!
//! Collects wildfire-camera time-lapse frames and keeps only the frames that
//! sit close in time to a smoke detection, as training material.
//!
//! # Architecture
//!
//! Three stages, each a binary, communicate through the filesystem:
//!
//! 1. **Scrape** (`awf_scrape`): download every camera's time-lapse into
//!    `dl_frames/<run>/<camera>/`, drop night and broken frames.
//! 2. **Split** (`split_cams`): read the pan angle printed on each frame and
//!    move panning cameras' frames into one folder per heading.
//! 3. **Detect** (`process_awf`): run the detector per folder, keep frames
//!    inside windows around sustained detections, archive them.
//!
//! # Module Structure
//!
//! - `timestamp`: capture times encoded in file names
//! - `retention`: detection runs, windows, keep/discard partition
//! - `cameras`: angle clustering and the OCR collaborator
//! - `detect`: detector collaborator and label parsing
//! - `pipeline`: per-folder orchestration and batches
//! - `scrape`, `layout`, `archive`, `pool`, `config`: plumbing

pub mod archive;
pub mod cameras;
pub mod config;
pub mod detect;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod pool;
pub mod process;
pub mod retention;
pub mod scrape;
pub mod timestamp;

pub use cameras::{assign_cameras, cluster_by_angle, AngleReader, AngleSample, CameraAssignment};
pub use config::ScrapperConfig;
pub use detect::{DetectorRegistry, SmokeDetector, StubBackend, YoloCliBackend};
pub use error::{CollaboratorFailure, PipelineError};
pub use layout::CameraFolder;
pub use pipeline::{BatchSummary, FolderOutcome, FolderReport, Pipeline, PipelineSettings};
pub use pool::WorkerPool;
pub use retention::{build_windows, filter_images, Partition, RetentionPolicy, RetentionWindow};
pub use timestamp::{parse_timestamp, TimestampedItem};
