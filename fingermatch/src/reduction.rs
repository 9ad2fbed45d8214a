use std::cmp::Ordering;

use crate::compare::TripletMatch;
use crate::config::{CandidateLookup, TripletThresholds};
use crate::features::TripletFeatures;
use crate::types::MinutiaPair;

/// Runs candidate retrieval for every query triplet and returns all matches,
/// ordered by descending similarity. Matches of equal similarity keep the order in
/// which they were found.
pub fn collect_triplet_matches(
    query: &TripletFeatures,
    template: &TripletFeatures,
    lookup: CandidateLookup,
    thresholds: &TripletThresholds,
) -> Vec<TripletMatch> {
    let mut matches = Vec::new();
    let index = template.index();

    for (position, triplet) in query.index().triplets().iter().enumerate() {
        match lookup {
            CandidateLookup::DistanceWindow => index.find_candidates(
                position,
                triplet,
                query.minutiae(),
                template.minutiae(),
                thresholds,
                &mut matches,
            ),
            CandidateLookup::AngleBuckets => index.find_candidates_by_angle_code(
                position,
                triplet,
                query.minutiae(),
                template.minutiae(),
                thresholds,
                &mut matches,
            ),
        }
    }

    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
    });
    matches
}

/// Turns ranked triplet matches into minutia correspondences.
///
/// A correspondence is emitted when at least one of its minutiae has not been used
/// by an earlier one; both are marked used afterwards. The output keeps the order
/// of `matches`, every pair carrying the similarity of the triplet match it came from.
pub fn reduce_to_minutia_pairs(
    matches: &[TripletMatch],
    query: &TripletFeatures,
    template: &TripletFeatures,
) -> Vec<MinutiaPair> {
    let mut query_used = vec![false; query.minutiae().len()];
    let mut template_used = vec![false; template.minutiae().len()];
    let mut pairs = Vec::new();

    for found in matches {
        let query_triplet = query.index().get(found.query);
        let template_triplet = template.index().get(found.template);

        for (q, t) in found.minutia_pairs(query_triplet, template_triplet).iter().copied() {
            let (q_used, t_used) = (&mut query_used[q.as_usize()], &mut template_used[t.as_usize()]);
            if *q_used && *t_used {
                continue;
            }
            *q_used = true;
            *t_used = true;
            pairs.push(MinutiaPair::new(q, t, found.similarity));
        }
    }

    log::trace!(
        "reduced {} triplet matches to {} minutia pairs",
        matches.len(),
        pairs.len()
    );
    pairs
}
