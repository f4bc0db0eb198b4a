mod backend;
mod backends;
mod registry;
mod result;

pub use backend::{DetectionJob, SmokeDetector};
pub use backends::{StubBackend, YoloCliBackend, YoloConfig};
pub use registry::DetectorRegistry;
pub use result::{
    parse_label_line, read_label_dir, DetectionEvent, DetectorOutput, LabelRecord,
};
