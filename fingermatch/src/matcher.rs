use std::sync::atomic::AtomicBool;

use crate::alignment::{align, Alignment};
use crate::config::MatcherConfig;
use crate::error::{Error, Result};
use crate::features::{FeatureExtractor, Features, TripletFeatures};
use crate::math::{signed_angle_difference, Averager, RigidTransform};
use crate::reduction::{collect_triplet_matches, reduce_to_minutia_pairs};
use crate::scoring::score_alignment;
use crate::types::{Minutia, MinutiaPair};

/// Outcome of one comparison.
#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    /// Similarity in `[0, 100]`.
    pub score: f64,
    /// Correspondences of the best alignment.
    pub pairs: Vec<MinutiaPair>,
    /// Transform mapping the query onto the template, when an alignment was found.
    pub transform: Option<RigidTransform>,
    /// Mean rotation between the directions of the corresponding minutiae.
    pub rotation: Option<f64>,
}

impl MatchResult {
    fn empty() -> Self {
        Self::default()
    }
}

/// Compares fingerprints described by [`Features`] of one descriptor kind.
///
/// The matcher holds no mutable state, so one instance can serve many threads.
#[derive(Debug, Clone)]
pub struct Matcher {
    config: MatcherConfig,
    extractor: FeatureExtractor,
}

impl Matcher {
    pub fn new(config: MatcherConfig) -> Result<Self> {
        config.validate()?;
        let extractor = FeatureExtractor::new(&config);
        Ok(Matcher { config, extractor })
    }

    #[inline]
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Builds features this matcher accepts.
    pub fn extract(&self, minutiae: Vec<Minutia>) -> Features {
        self.extractor.extract(minutiae)
    }

    pub fn score(&self, query: &Features, template: &Features) -> Result<f64> {
        Ok(self.match_features(query, template)?.score)
    }

    pub fn match_features(&self, query: &Features, template: &Features) -> Result<MatchResult> {
        self.run(query, template, None)
    }

    /// Like [`Matcher::match_features`], but gives up with [`Error::Cancelled`] once
    /// `cancel` is set.
    pub fn match_with_cancel(
        &self,
        query: &Features,
        template: &Features,
        cancel: &AtomicBool,
    ) -> Result<MatchResult> {
        self.run(query, template, Some(cancel))
    }

    fn run(
        &self,
        query: &Features,
        template: &Features,
        cancel: Option<&AtomicBool>,
    ) -> Result<MatchResult> {
        let query = self.accept(query)?;
        let template = self.accept(template)?;

        let floor = self.config.min_minutiae;
        if query.minutiae().len() < floor || template.minutiae().len() < floor {
            log::debug!(
                "not enough minutiae to match ({} and {}, need {})",
                query.minutiae().len(),
                template.minutiae().len(),
                floor
            );
            return Ok(MatchResult::empty());
        }

        let matches = collect_triplet_matches(query, template, self.config.lookup, &self.config.triplet);
        let candidates = reduce_to_minutia_pairs(&matches, query, template);
        if candidates.is_empty() {
            return Ok(MatchResult::empty());
        }

        let alignment = align(
            query.minutiae(),
            template.minutiae(),
            &candidates,
            &self.config.alignment,
            cancel,
        )?;

        let score = score_alignment(
            self.config.score,
            self.config.region_gate.as_ref(),
            query.minutiae(),
            template.minutiae(),
            &alignment,
        );
        let rotation = mean_rotation(query, template, &alignment);

        Ok(MatchResult {
            score,
            transform: alignment.transform,
            rotation,
            pairs: alignment.pairs,
        })
    }

    fn accept<'a>(&self, features: &'a Features) -> Result<&'a TripletFeatures> {
        if features.kind() != self.config.descriptor {
            return Err(Error::InvalidFeatureType {
                expected: self.config.descriptor,
                found: features.kind(),
            });
        }
        Ok(features.triplets())
    }
}

fn mean_rotation(query: &TripletFeatures, template: &TripletFeatures, alignment: &Alignment) -> Option<f64> {
    let mut averager = Averager::new();
    for pair in &alignment.pairs {
        let q = query.minutia(pair.query);
        let t = template.minutia(pair.template);
        averager.push(signed_angle_difference(t.angle, q.angle));
    }
    averager.average()
}
