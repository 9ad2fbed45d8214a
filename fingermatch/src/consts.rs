use std::f64::consts::{FRAC_PI_4, FRAC_PI_6};

/// Maximal difference between corresponding triplet edges.
pub const TRIPLET_DISTANCE_THRESHOLD: f64 = 12.0;
/// Maximal difference between corresponding alpha and beta angles.
pub const TRIPLET_ANGLE_THRESHOLD: f64 = FRAC_PI_6;
/// Maximal difference between raw minutia directions for matchers that expect no rotation.
pub const NO_ROTATION_DIRECTION_THRESHOLD: f64 = FRAC_PI_4;

pub const GLOBAL_DISTANCE_THRESHOLD: f64 = 12.0;
pub const GLOBAL_ANGLE_THRESHOLD: f64 = FRAC_PI_6;

/// Neighbors considered when building nearest-neighbor triplets.
pub const NEAREST_NEIGHBORS: usize = 2;

/// Descriptors are only built for fingerprints with more minutiae than this.
pub const MIN_MINUTIAE_FOR_DESCRIPTORS: usize = 3;
pub const MIN_NUMBER_OF_MINUTIAE: usize = 4;

pub const REGION_MIN_COUNT: usize = 6;
pub const REGION_MARGIN: f64 = 8.0;

/// Points closer than this on both axes are treated as one by the triangulation.
pub const DELAUNAY_EPSILON: f64 = 1e-6;

/// Angle buckets used by the triplet angle code.
pub const ANGLE_CODE_BUCKETS: u16 = 8;
pub const ANGLE_CODE_BITS: u16 = 4;

/// Coordinates of the compact encoding take 11 bits each.
pub const MAX_ENCODED_COORDINATE: i32 = (1 << 11) - 1;
