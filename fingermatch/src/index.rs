use std::cmp::Ordering;
use std::collections::HashMap;
use std::ops::Range;

use crate::compare::{compare, TripletMatch};
use crate::config::TripletThresholds;
use crate::triplets::Triplet;
use crate::types::Minutia;

/// Immutable lookup structure over the triplets of one fingerprint.
///
/// Triplets are stored sorted by their longest edge, so positions handed out by
/// this index (and stored in [`TripletMatch`]) refer to that order.
#[derive(Debug, Clone)]
pub struct TripletIndex {
    triplets: Vec<Triplet>,
    buckets: HashMap<u16, Vec<usize>>,
}

impl TripletIndex {
    pub fn new(mut triplets: Vec<Triplet>) -> Self {
        triplets.sort_by(|a, b| {
            a.max_distance()
                .partial_cmp(&b.max_distance())
                .unwrap_or(Ordering::Equal)
        });

        let mut buckets: HashMap<u16, Vec<usize>> = HashMap::new();
        for (position, triplet) in triplets.iter().enumerate() {
            buckets.entry(triplet.angle_code()).or_default().push(position);
        }

        TripletIndex { triplets, buckets }
    }

    #[inline]
    pub fn triplets(&self) -> &[Triplet] {
        &self.triplets
    }

    #[inline]
    pub fn get(&self, position: usize) -> &Triplet {
        &self.triplets[position]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.triplets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triplets.is_empty()
    }

    /// Positions of triplets whose longest edge lies within `[low, high]`.
    pub fn range_by_max_distance(&self, low: f64, high: f64) -> Range<usize> {
        let start = self.triplets.partition_point(|t| t.max_distance() < low);
        let end = self.triplets.partition_point(|t| t.max_distance() <= high);
        start..end.max(start)
    }

    /// Positions of triplets with the given angle code.
    pub fn bucket(&self, code: u16) -> &[usize] {
        self.buckets.get(&code).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Compares `query` with every triplet whose longest edge is within the distance
    /// threshold of its own and appends the matches to `out`.
    pub fn find_candidates(
        &self,
        query_index: usize,
        query: &Triplet,
        query_minutiae: &[Minutia],
        template_minutiae: &[Minutia],
        thresholds: &TripletThresholds,
        out: &mut Vec<TripletMatch>,
    ) {
        let range = self.range_by_max_distance(
            query.max_distance() - thresholds.distance,
            query.max_distance() + thresholds.distance,
        );

        for position in range {
            if let Some(found) = compare(
                query_index,
                query,
                query_minutiae,
                position,
                &self.triplets[position],
                template_minutiae,
                thresholds,
            ) {
                out.push(found);
            }
        }
    }

    /// Like [`TripletIndex::find_candidates`], but only looks at the buckets the
    /// query's angle code falls into under each of the three rotations.
    pub fn find_candidates_by_angle_code(
        &self,
        query_index: usize,
        query: &Triplet,
        query_minutiae: &[Minutia],
        template_minutiae: &[Minutia],
        thresholds: &TripletThresholds,
        out: &mut Vec<TripletMatch>,
    ) {
        let mut positions: Vec<usize> = (0..3)
            .flat_map(|rotation| self.bucket(query.rotated_code(rotation)).iter().copied())
            .collect();
        positions.sort_unstable();
        positions.dedup();

        for position in positions {
            if let Some(found) = compare(
                query_index,
                query,
                query_minutiae,
                position,
                &self.triplets[position],
                template_minutiae,
                thresholds,
            ) {
                out.push(found);
            }
        }
    }
}
