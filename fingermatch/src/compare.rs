use crate::config::TripletThresholds;
use crate::math::angle_difference;
use crate::triplets::Triplet;
use crate::types::{Minutia, MinutiaId};

/// Outcome of a successful comparison between a query and a template triplet.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TripletMatch {
    /// Position of the query triplet in its feature set.
    pub query: usize,
    /// Position of the template triplet in its feature set.
    pub template: usize,
    /// Similarity within `(0, 1]`.
    pub similarity: f64,
    /// Template vertex `(k + rotation) % 3` corresponds to query vertex `k`.
    pub rotation: usize,
}

impl TripletMatch {
    /// The three minutia correspondences implied by the best rotation.
    pub fn minutia_pairs(
        &self,
        query: &Triplet,
        template: &Triplet,
    ) -> [(MinutiaId, MinutiaId); 3] {
        let q = query.vertices();
        let t = template.vertices();
        [
            (q[0], t[self.rotation % 3]),
            (q[1], t[(1 + self.rotation) % 3]),
            (q[2], t[(2 + self.rotation) % 3]),
        ]
    }
}

/// Similarity of `query` and `template` when template vertex `(k + rotation) % 3`
/// is paired with query vertex `k`; 0 when any gate rejects the pairing.
pub fn compare_rotation(
    query: &Triplet,
    query_minutiae: &[Minutia],
    template: &Triplet,
    template_minutiae: &[Minutia],
    rotation: usize,
    thresholds: &TripletThresholds,
) -> f64 {
    let mut max_distance_difference: f64 = 0.0;
    let mut max_alpha_difference: f64 = 0.0;
    let mut max_beta_difference: f64 = 0.0;

    for k in 0..3 {
        let j = (k + rotation) % 3;

        let difference = (query.distances()[k] - template.distances()[j]).abs();
        if difference > thresholds.distance {
            return 0.0;
        }
        max_distance_difference = max_distance_difference.max(difference);
    }

    for k in 0..3 {
        let j = (k + rotation) % 3;
        let difference = angle_difference(query.beta()[k], template.beta()[j]);
        if difference > thresholds.angle {
            return 0.0;
        }
        max_beta_difference = max_beta_difference.max(difference);
    }

    for k in 0..3 {
        let j = (k + rotation) % 3;
        for side in 0..2 {
            let difference = angle_difference(query.alpha()[k][side], template.alpha()[j][side]);
            if difference > thresholds.angle {
                return 0.0;
            }
            max_alpha_difference = max_alpha_difference.max(difference);
        }
    }

    if let Some(direction) = thresholds.direction {
        for k in 0..3 {
            let j = (k + rotation) % 3;
            let q = &query_minutiae[query.vertices()[k].as_usize()];
            let t = &template_minutiae[template.vertices()[j].as_usize()];
            if angle_difference(q.angle, t.angle) >= direction {
                return 0.0;
            }
        }
    }

    let distance_similarity = 1.0 - max_distance_difference / thresholds.distance;
    let alpha_similarity = 1.0 - max_alpha_difference / thresholds.angle;
    let beta_similarity = 1.0 - max_beta_difference / thresholds.angle;

    1.0 - (1.0 - distance_similarity) * (1.0 - alpha_similarity) * (1.0 - beta_similarity)
}

/// Compares two triplets under the three cyclic rotations of the template and keeps
/// the best one. Returns `None` when every rotation is rejected.
pub fn compare(
    query_index: usize,
    query: &Triplet,
    query_minutiae: &[Minutia],
    template_index: usize,
    template: &Triplet,
    template_minutiae: &[Minutia],
    thresholds: &TripletThresholds,
) -> Option<TripletMatch> {
    let mut best: Option<TripletMatch> = None;

    for rotation in 0..3 {
        let similarity = compare_rotation(
            query,
            query_minutiae,
            template,
            template_minutiae,
            rotation,
            thresholds,
        );
        if similarity <= 0.0 {
            continue;
        }
        if best.map_or(true, |b| similarity > b.similarity) {
            best = Some(TripletMatch {
                query: query_index,
                template: template_index,
                similarity,
                rotation,
            });
        }
    }

    best
}
