use std::f64::consts::TAU;

use crate::consts::{ANGLE_CODE_BITS, ANGLE_CODE_BUCKETS, MIN_MINUTIAE_FOR_DESCRIPTORS};
use crate::delaunay::triangulate;
use crate::math::{angle_between, bearing, minutia_distance, minutia_distance_squared};
use crate::types::{Minutia, MinutiaId};

/// Local descriptor built from three minutiae of one fingerprint.
///
/// Vertex `k` is followed by vertex `(k + 1) % 3`; the order is fixed at construction
/// and every per-vertex quantity below follows it.
#[derive(Debug, Clone)]
pub struct Triplet {
    vertices: [MinutiaId; 3],
    /// `distances[k]` is the length of the edge from vertex `k` to vertex `k + 1`.
    distances: [f64; 3],
    /// `alpha[k][0]` is the angle from the direction of vertex `k` to the edge towards
    /// vertex `k + 1`, `alpha[k][1]` to the edge towards vertex `k + 2`.
    alpha: [[f64; 2]; 3],
    /// `beta[k]` is the angle from the direction of vertex `k` to the direction of vertex `k + 1`.
    beta: [f64; 3],
    max_distance: f64,
    code: u16,
}

impl Triplet {
    /// Builds a descriptor over `vertices`, which index into `minutiae`.
    pub fn new(minutiae: &[Minutia], vertices: [MinutiaId; 3]) -> Self {
        let m = |k: usize| &minutiae[vertices[k % 3].as_usize()];

        let mut distances = [0.0; 3];
        let mut alpha = [[0.0; 2]; 3];
        let mut beta = [0.0; 3];
        for k in 0..3 {
            let (current, next, last) = (m(k), m(k + 1), m(k + 2));
            distances[k] = minutia_distance(current, next);
            alpha[k][0] = angle_between(current.angle, bearing(current.position(), next.position()));
            alpha[k][1] = angle_between(current.angle, bearing(current.position(), last.position()));
            beta[k] = angle_between(current.angle, next.angle);
        }

        let max_distance = distances.iter().copied().fold(0.0, f64::max);
        let code = merge_codes([
            angle_bucket(alpha[0][0]),
            angle_bucket(alpha[1][0]),
            angle_bucket(alpha[2][0]),
        ]);

        Triplet {
            vertices,
            distances,
            alpha,
            beta,
            max_distance,
            code,
        }
    }

    #[inline]
    pub fn vertices(&self) -> [MinutiaId; 3] {
        self.vertices
    }

    #[inline]
    pub fn distances(&self) -> &[f64; 3] {
        &self.distances
    }

    #[inline]
    pub fn alpha(&self) -> &[[f64; 2]; 3] {
        &self.alpha
    }

    #[inline]
    pub fn beta(&self) -> &[f64; 3] {
        &self.beta
    }

    /// Length of the longest edge.
    #[inline]
    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    /// Discretized alpha angles, 4 bits per vertex.
    #[inline]
    pub fn angle_code(&self) -> u16 {
        self.code
    }

    /// The code a template triplet would have if its vertex `(k + rotation) % 3`
    /// corresponded to vertex `k` of this one.
    pub fn rotated_code(&self, rotation: usize) -> u16 {
        let mut buckets = [0; 3];
        for k in 0..3 {
            buckets[(k + rotation) % 3] = angle_bucket(self.alpha[k][0]);
        }
        merge_codes(buckets)
    }
}

#[inline]
fn angle_bucket(angle: f64) -> u16 {
    let bucket = (angle / (TAU / ANGLE_CODE_BUCKETS as f64)) as u16;
    bucket.min(ANGLE_CODE_BUCKETS - 1)
}

#[inline]
fn merge_codes(buckets: [u16; 3]) -> u16 {
    buckets
        .iter()
        .enumerate()
        .fold(0, |code, (k, &bucket)| code | bucket << (ANGLE_CODE_BITS * k as u16))
}

/// Builds one triplet per pair of the `neighbors` nearest minutiae of every minutia,
/// ordered as (main, nearer, farther).
pub fn nearest_neighbor_triplets(minutiae: &[Minutia], neighbors: usize) -> Vec<Triplet> {
    if minutiae.len() <= MIN_MINUTIAE_FOR_DESCRIPTORS || neighbors < 2 {
        return vec![];
    }

    let neighbors = neighbors.min(minutiae.len() - 1);
    let mut triplets = Vec::with_capacity(minutiae.len() * neighbors * (neighbors - 1) / 2);
    let mut nearest: Vec<(i64, usize)> = Vec::with_capacity(neighbors);

    for (main, minutia) in minutiae.iter().enumerate() {
        find_nearest(minutiae, main, minutia, neighbors, &mut nearest);

        for a in 0..nearest.len() {
            for b in a + 1..nearest.len() {
                triplets.push(Triplet::new(
                    minutiae,
                    [main.into(), nearest[a].1.into(), nearest[b].1.into()],
                ));
            }
        }
    }

    triplets
}

/// Linear scan keeping the `count` closest minutiae; `nearest` ends up sorted by
/// distance, ties broken by index.
fn find_nearest(
    minutiae: &[Minutia],
    main: usize,
    minutia: &Minutia,
    count: usize,
    nearest: &mut Vec<(i64, usize)>,
) {
    nearest.clear();
    let mut worst = 0;

    for (index, other) in minutiae.iter().enumerate() {
        if index == main {
            continue;
        }

        let candidate = (minutia_distance_squared(minutia, other), index);
        if nearest.len() < count {
            nearest.push(candidate);
            if nearest.len() == count {
                worst = position_of_worst(nearest);
            }
        } else if candidate < nearest[worst] {
            nearest[worst] = candidate;
            worst = position_of_worst(nearest);
        }
    }

    nearest.sort();
}

#[inline]
fn position_of_worst(nearest: &[(i64, usize)]) -> usize {
    let mut worst = 0;
    for i in 1..nearest.len() {
        if nearest[i] > nearest[worst] {
            worst = i;
        }
    }
    worst
}

const PERMUTATIONS: [[usize; 3]; 6] = [
    [0, 1, 2],
    [0, 2, 1],
    [1, 0, 2],
    [1, 2, 0],
    [2, 0, 1],
    [2, 1, 0],
];

/// Builds triplets from the Delaunay triangles of the minutia positions, each
/// triangle under all 6 orderings of its vertices.
pub fn delaunay_triplets(minutiae: &[Minutia]) -> Vec<Triplet> {
    if minutiae.len() <= MIN_MINUTIAE_FOR_DESCRIPTORS {
        return vec![];
    }

    let points: Vec<_> = minutiae.iter().map(Minutia::position).collect();
    let triangles = triangulate(&points);

    let mut triplets = Vec::with_capacity(triangles.len() * PERMUTATIONS.len());
    for triangle in &triangles {
        for permutation in &PERMUTATIONS {
            triplets.push(Triplet::new(
                minutiae,
                [
                    triangle[permutation[0]].into(),
                    triangle[permutation[1]].into(),
                    triangle[permutation[2]].into(),
                ],
            ));
        }
    }

    triplets
}
