use std::sync::atomic::{AtomicBool, Ordering};

use crate::associations::{MinutiaAssociations, MinutiaRelation};
use crate::config::AlignmentThresholds;
use crate::error::{Error, Result};
use crate::math::{angle_difference, bearing, distance, RigidTransform};
use crate::types::{Minutia, MinutiaPair};

/// The largest consistent set of correspondences found by [`align`].
#[derive(Debug, Clone, Default)]
pub struct Alignment {
    /// Accepted correspondences, the seed first.
    pub pairs: Vec<MinutiaPair>,
    /// Transform derived from the seed of the best set.
    pub transform: Option<RigidTransform>,
}

impl Alignment {
    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Outcome of growing a set from one seed.
#[derive(Debug)]
enum Growth {
    Completed { mismatches: usize },
    Abandoned,
}

/// Tries every candidate as the seed of a rigid alignment and keeps the seed that
/// gathers the most consistent correspondences.
///
/// Candidates are scanned in the given order, so callers should pass them ranked by
/// similarity. Seeds that reject as many candidates as the current best one are
/// abandoned early. Ties go to the earlier seed.
pub fn align(
    query: &[Minutia],
    template: &[Minutia],
    candidates: &[MinutiaPair],
    thresholds: &AlignmentThresholds,
    cancel: Option<&AtomicBool>,
) -> Result<Alignment> {
    let mut associations = MinutiaAssociations::new();
    let mut accepted = Vec::with_capacity(query.len().min(template.len()));
    let mut best = Alignment::default();
    let mut best_mismatch_bound = usize::MAX;

    for seed in candidates {
        if cancel.map_or(false, |flag| flag.load(Ordering::Relaxed)) {
            return Err(Error::Cancelled);
        }

        let transform = RigidTransform::from_seed(
            &query[seed.query.as_usize()],
            &template[seed.template.as_usize()],
        );

        associations.reset(query.len(), template.len());
        accepted.clear();

        let growth = grow_from_seed(
            query,
            template,
            candidates,
            seed,
            &transform,
            thresholds,
            best_mismatch_bound,
            &mut associations,
            &mut accepted,
        );

        match growth {
            Growth::Completed { mismatches } if accepted.len() > best.pairs.len() => {
                log::trace!(
                    "seed {:?} -> {:?} aligned {} pairs with {} mismatches",
                    seed.query,
                    seed.template,
                    accepted.len(),
                    mismatches
                );
                best.pairs.clear();
                best.pairs.extend_from_slice(&accepted);
                best.transform = Some(transform);
                best_mismatch_bound = mismatches;
            }
            Growth::Completed { .. } => {}
            Growth::Abandoned => log::trace!(
                "seed {:?} -> {:?} abandoned after {} mismatches",
                seed.query,
                seed.template,
                best_mismatch_bound
            ),
        }
    }

    log::debug!(
        "best alignment has {} of {} candidate pairs",
        best.pairs.len(),
        candidates.len()
    );
    Ok(best)
}

#[allow(clippy::too_many_arguments)]
fn grow_from_seed(
    query: &[Minutia],
    template: &[Minutia],
    candidates: &[MinutiaPair],
    seed: &MinutiaPair,
    transform: &RigidTransform,
    thresholds: &AlignmentThresholds,
    mismatch_bound: usize,
    associations: &mut MinutiaAssociations,
    accepted: &mut Vec<MinutiaPair>,
) -> Growth {
    associations.associate(seed.query, seed.template);
    accepted.push(*seed);

    let seed_query = transform.apply(&query[seed.query.as_usize()]);
    let seed_template = template[seed.template.as_usize()].position();
    let mut mismatches = 0;

    for pair in candidates {
        // the seed itself, or a pair reusing an already matched minutia
        if associations.get_status(pair.query, pair.template) != MinutiaRelation::Unassociated {
            continue;
        }

        let mapped = transform.apply(&query[pair.query.as_usize()]);
        let target = &template[pair.template.as_usize()];

        let consistent = (distance(seed_query.position, mapped.position)
            - distance(seed_template, target.position()))
        .abs()
            <= thresholds.distance
            && angle_difference(mapped.angle, target.angle) <= thresholds.angle
            && angle_difference(
                bearing(seed_template, target.position()),
                bearing(seed_query.position, mapped.position),
            ) <= thresholds.angle;

        if consistent {
            associations.associate(pair.query, pair.template);
            accepted.push(*pair);
        } else {
            mismatches += 1;
            if mismatches >= mismatch_bound {
                return Growth::Abandoned;
            }
        }
    }

    Growth::Completed { mismatches }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::types::{MinutiaId, MinutiaKind};

    fn sample() -> Vec<Minutia> {
        [
            (20, 30, 0.3),
            (150, 40, 1.2),
            (90, 120, 2.5),
            (30, 200, 3.6),
            (180, 180, 4.4),
            (110, 250, 5.1),
            (60, 80, 0.8),
            (210, 100, 2.0),
        ]
        .iter()
        .map(|&(x, y, angle)| Minutia::new(x, y, angle, MinutiaKind::End))
        .collect()
    }

    /// Rotates by 90° around the origin and shifts.
    fn rotated(minutiae: &[Minutia]) -> Vec<Minutia> {
        minutiae
            .iter()
            .map(|m| Minutia::new(-m.y + 400, m.x + 15, m.angle + FRAC_PI_2, m.kind))
            .collect()
    }

    fn identity_pairs(count: usize) -> Vec<MinutiaPair> {
        (0..count)
            .map(|i| MinutiaPair::new(MinutiaId::from(i), MinutiaId::from(i), 1.0))
            .collect()
    }

    #[test]
    fn no_candidates_no_alignment() {
        let minutiae = sample();
        let alignment =
            align(&minutiae, &minutiae, &[], &AlignmentThresholds::default(), None).unwrap();
        assert!(alignment.is_empty());
        assert!(alignment.transform.is_none());
    }

    #[test]
    fn rotated_copy_aligns_completely() {
        let query = sample();
        let template = rotated(&query);
        let candidates = identity_pairs(query.len());
        let alignment =
            align(&query, &template, &candidates, &AlignmentThresholds::default(), None).unwrap();

        assert_eq!(alignment.len(), query.len());
        assert_eq!(alignment.pairs[0], candidates[0]);
        let transform = alignment.transform.unwrap();
        assert_abs_diff_eq!(transform.rotation, FRAC_PI_2, epsilon = 1e-9);
    }

    #[test]
    fn inconsistent_pair_is_left_out() {
        let query = sample();
        let template = rotated(&query);
        let mut candidates = vec![MinutiaPair::new(0usize.into(), 4usize.into(), 1.0)];
        candidates.extend(
            identity_pairs(query.len())
                .into_iter()
                .skip(1)
                .filter(|p| p.template != MinutiaId::from(4usize)),
        );

        let alignment =
            align(&query, &template, &candidates, &AlignmentThresholds::default(), None).unwrap();
        assert_eq!(alignment.len(), query.len() - 2);
        assert!(alignment.pairs.iter().all(|p| p.query == p.template));
    }

    #[test]
    fn tighter_thresholds_never_match_more() {
        let query = sample();
        let mut template = rotated(&query);
        template[2].angle = (template[2].angle + 0.3) % (2.0 * PI);
        template[5].angle = (template[5].angle + 0.3) % (2.0 * PI);
        let candidates = identity_pairs(query.len());

        let loose = AlignmentThresholds {
            distance: 20.0,
            angle: PI,
        };
        let tight = AlignmentThresholds {
            distance: 1.0,
            angle: 0.05,
        };

        let loose = align(&query, &template, &candidates, &loose, None).unwrap();
        let default = align(&query, &template, &candidates, &AlignmentThresholds::default(), None)
            .unwrap();
        let tight = align(&query, &template, &candidates, &tight, None).unwrap();

        assert_eq!(loose.len(), query.len());
        assert_eq!(tight.len(), query.len() - 2);
        assert!(tight.len() <= default.len() && default.len() <= loose.len());
    }

    #[test]
    fn cancellation_stops_the_search() {
        let minutiae = sample();
        let cancel = AtomicBool::new(true);
        let result = align(
            &minutiae,
            &minutiae,
            &identity_pairs(minutiae.len()),
            &AlignmentThresholds::default(),
            Some(&cancel),
        );
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    fn pair(query: usize, template: usize) -> MinutiaPair {
        MinutiaPair::new(MinutiaId::from(query), MinutiaId::from(template), 1.0)
    }

    fn minutiae(points: &[(i32, i32)]) -> Vec<Minutia> {
        points
            .iter()
            .map(|&(x, y)| Minutia::new(x, y, 1.0, MinutiaKind::End))
            .collect()
    }

    #[test]
    fn mirrored_neighbor_is_rejected() {
        // minutia 1 sits at the same distance from the seed with the same direction,
        // but on the other side of it
        let query = minutiae(&[(100, 100), (160, 100), (100, 170)]);
        let template = minutiae(&[(100, 100), (40, 100), (100, 170)]);
        let candidates = identity_pairs(3);

        let alignment =
            align(&query, &template, &candidates, &AlignmentThresholds::default(), None).unwrap();
        assert_eq!(alignment.pairs, vec![pair(0, 0), pair(2, 2)]);
    }

    /// Two hypotheses: the identity, and a shift of 300 along x. The shift explains
    /// more pairs but only after rejecting the first candidate.
    fn competing_hypotheses() -> (Vec<Minutia>, Vec<Minutia>, Vec<MinutiaPair>) {
        let query = minutiae(&[(450, 450), (500, 460), (480, 540), (200, 460)]);
        let template = minutiae(&[(450, 450), (500, 460), (780, 540), (800, 460)]);
        let candidates = vec![pair(0, 0), pair(2, 2), pair(1, 1), pair(1, 3), pair(3, 1)];
        (query, template, candidates)
    }

    #[test]
    fn seed_reaching_best_mismatches_is_abandoned() {
        let (query, template, candidates) = competing_hypotheses();
        let seed = &candidates[1];
        let transform = RigidTransform::from_seed(&query[2], &template[2]);
        let thresholds = AlignmentThresholds::default();
        let mut associations = MinutiaAssociations::new();
        let mut accepted = vec![];

        let mut grow = |bound: usize, accepted: &mut Vec<MinutiaPair>| {
            associations.reset(query.len(), template.len());
            accepted.clear();
            grow_from_seed(
                &query,
                &template,
                &candidates,
                seed,
                &transform,
                &thresholds,
                bound,
                &mut associations,
                accepted,
            )
        };

        let unbounded = grow(usize::MAX, &mut accepted);
        assert!(matches!(unbounded, Growth::Completed { mismatches: 2 }));
        assert_eq!(accepted, vec![pair(2, 2), pair(1, 3), pair(3, 1)]);

        let bounded = grow(1, &mut accepted);
        assert!(matches!(bounded, Growth::Abandoned), "{:?}", bounded);
    }

    #[test]
    fn abandoned_seed_does_not_replace_best() {
        let (query, template, candidates) = competing_hypotheses();
        let alignment =
            align(&query, &template, &candidates, &AlignmentThresholds::default(), None).unwrap();

        // the shift would gather 3 pairs, but its seed meets a mismatch first
        assert_eq!(alignment.pairs, vec![pair(0, 0), pair(1, 1)]);
        let transform = alignment.transform.unwrap();
        assert_eq!(transform.rotation, 0.0);
        assert_eq!(
            transform.apply_point(query[1].position()),
            template[1].position()
        );
    }
}
