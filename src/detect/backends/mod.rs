pub mod stub;
pub mod yolo;

pub use stub::StubBackend;
pub use yolo::{YoloCliBackend, YoloConfig};
