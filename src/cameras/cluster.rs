use std::cmp::Ordering;

/// Reading used when no angle could be extracted from a frame overlay.
pub const UNREADABLE_ANGLE: f64 = -1000.0;

pub const DEFAULT_ANGLE_THRESHOLD: f64 = 5.0;
pub const DEFAULT_STATIC_THRESHOLD: f64 = 15.0;
pub const DEFAULT_MIN_CAMERA_SIZE: usize = 4;

/// Synthetic identity for cameras that do not pan.
pub const NO_ROTATION_CAMERA: &str = "cam_00";

#[derive(Clone, Debug, PartialEq)]
pub struct AngleSample {
    pub id: String,
    pub angle: f64,
}

impl AngleSample {
    pub fn new(id: impl Into<String>, angle: f64) -> Self {
        Self {
            id: id.into(),
            angle,
        }
    }

    pub fn is_unreadable(&self) -> bool {
        self.angle == UNREADABLE_ANGLE
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CameraCluster {
    pub samples: Vec<AngleSample>,
}

impl CameraCluster {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// A cluster is a camera position if it is large enough and its lowest
    /// reading is a real angle. Unreadable frames sort first, so a cluster
    /// led by the sentinel is the "unreadable" bucket.
    pub fn is_accepted(&self, min_size: usize) -> bool {
        match self.samples.first() {
            Some(first) => self.samples.len() >= min_size && !first.is_unreadable(),
            None => false,
        }
    }

    pub fn angles(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.angle).collect()
    }
}

/// Sorted single-linkage grouping.
///
/// Samples are stably sorted by angle; each one joins the current cluster
/// when it is within `threshold` of the sample right before it. Only the
/// predecessor is compared, so a cluster can drift well beyond `threshold`
/// across many small steps.
pub fn cluster_by_angle(samples: &[AngleSample], threshold: f64) -> Vec<CameraCluster> {
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.angle.partial_cmp(&b.angle).unwrap_or(Ordering::Equal));

    let mut clusters: Vec<CameraCluster> = Vec::new();
    let mut previous: Option<f64> = None;
    for sample in sorted {
        let joins = previous.is_some_and(|prev| (sample.angle - prev).abs() <= threshold);
        previous = Some(sample.angle);
        match clusters.last_mut() {
            Some(current) if joins => current.samples.push(sample),
            _ => clusters.push(CameraCluster {
                samples: vec![sample],
            }),
        }
    }
    clusters
}

/// A camera is static when it has fewer than two readings or when the
/// spread of its readings, modulo a full turn, stays under `threshold`.
pub fn is_static_camera(readings: &[f64], threshold: f64) -> bool {
    if readings.len() < 2 {
        return true;
    }
    let max = readings.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = readings.iter().copied().fold(f64::INFINITY, f64::min);
    (max - min).rem_euclid(360.0) < threshold
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClusterParams {
    pub angle_threshold: f64,
    pub static_threshold: f64,
    pub min_camera_size: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            angle_threshold: DEFAULT_ANGLE_THRESHOLD,
            static_threshold: DEFAULT_STATIC_THRESHOLD,
            min_camera_size: DEFAULT_MIN_CAMERA_SIZE,
        }
    }
}

/// Frames grouped under one camera identity.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraGroup {
    pub camera: String,
    pub ids: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CameraAssignment {
    pub cameras: Vec<CameraGroup>,
    /// Frames in clusters too small or unreadable to be a camera.
    pub rejected: Vec<String>,
}

pub fn camera_name(index: usize) -> String {
    format!("cam_{:02}", index)
}

/// Assign every sample either to a camera identity or to `rejected`.
///
/// Cameras are numbered by their cluster's position among all clusters, so
/// a rejected cluster leaves a gap in the numbering.
pub fn assign_cameras(samples: &[AngleSample], params: &ClusterParams) -> CameraAssignment {
    if samples.is_empty() {
        return CameraAssignment::default();
    }
    let readings: Vec<f64> = samples.iter().map(|s| s.angle).collect();
    if is_static_camera(&readings, params.static_threshold) {
        return CameraAssignment {
            cameras: vec![CameraGroup {
                camera: NO_ROTATION_CAMERA.to_string(),
                ids: samples.iter().map(|s| s.id.clone()).collect(),
            }],
            rejected: Vec::new(),
        };
    }
    assign_clusters(samples, params)
}

/// Cluster and post-filter without the static shortcut, for cameras already
/// known to rotate.
pub fn assign_clusters(samples: &[AngleSample], params: &ClusterParams) -> CameraAssignment {
    let mut assignment = CameraAssignment::default();
    for (index, cluster) in cluster_by_angle(samples, params.angle_threshold)
        .into_iter()
        .enumerate()
    {
        let ids = cluster.samples.iter().map(|s| s.id.clone());
        if cluster.is_accepted(params.min_camera_size) {
            assignment.cameras.push(CameraGroup {
                camera: camera_name(index),
                ids: ids.collect(),
            });
        } else {
            assignment.rejected.extend(ids);
        }
    }
    assignment
}
