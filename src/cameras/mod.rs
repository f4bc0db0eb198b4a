//! Camera identities for panning cameras.
//!
//! Many network cameras cycle through a few fixed headings. A download for
//! such a camera interleaves frames of unrelated scenes, which breaks the
//! time-window logic downstream. The pan angle printed on each frame is read
//! back, readings are clustered into headings, and every accepted heading
//! becomes its own `cam_NN` folder.

pub mod cluster;
pub mod ocr;
pub mod split;

pub use cluster::{
    assign_cameras, assign_clusters, camera_name, cluster_by_angle, is_static_camera, AngleSample,
    CameraAssignment, CameraCluster, CameraGroup, ClusterParams, NO_ROTATION_CAMERA,
    UNREADABLE_ANGLE,
};
pub use ocr::{
    extract_x_value, normalize_overlay_text, AngleReader, CommandAngleReader, FixedAngleReader,
};
pub use split::{is_complete_day, split_camera_folder, SplitOutcome, SplitSettings};
