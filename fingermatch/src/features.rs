use crate::config::{DescriptorKind, MatcherConfig};
use crate::error::{Error, Result};
use crate::index::TripletIndex;
use crate::triplets::{delaunay_triplets, nearest_neighbor_triplets};
use crate::types::{Minutia, MinutiaId};

/// Minutiae of one fingerprint together with the index of their triplets.
///
/// The minutiae form an arena that is never modified after construction; triplets
/// refer to it through [`MinutiaId`].
#[derive(Debug, Clone)]
pub struct TripletFeatures {
    minutiae: Box<[Minutia]>,
    index: TripletIndex,
}

impl TripletFeatures {
    #[inline]
    pub fn minutiae(&self) -> &[Minutia] {
        &self.minutiae
    }

    #[inline]
    pub fn minutia(&self, id: MinutiaId) -> &Minutia {
        &self.minutiae[id.as_usize()]
    }

    #[inline]
    pub fn index(&self) -> &TripletIndex {
        &self.index
    }
}

/// Features of one fingerprint, tagged with the descriptor that produced them.
#[derive(Debug, Clone)]
pub enum Features {
    NearestNeighbor(TripletFeatures),
    Delaunay(TripletFeatures),
}

impl Features {
    pub fn kind(&self) -> DescriptorKind {
        match self {
            Features::NearestNeighbor(_) => DescriptorKind::NearestNeighbor,
            Features::Delaunay(_) => DescriptorKind::Delaunay,
        }
    }

    pub fn triplets(&self) -> &TripletFeatures {
        match self {
            Features::NearestNeighbor(features) | Features::Delaunay(features) => features,
        }
    }

    pub fn minutiae(&self) -> &[Minutia] {
        self.triplets().minutiae()
    }
}

/// Builds [`Features`] of the kind a matcher configuration expects.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    descriptor: DescriptorKind,
    neighbors: usize,
}

impl FeatureExtractor {
    pub fn new(config: &MatcherConfig) -> Self {
        FeatureExtractor {
            descriptor: config.descriptor,
            neighbors: config.neighbors,
        }
    }

    pub fn extract(&self, minutiae: Vec<Minutia>) -> Features {
        let triplets = match self.descriptor {
            DescriptorKind::NearestNeighbor => nearest_neighbor_triplets(&minutiae, self.neighbors),
            DescriptorKind::Delaunay => delaunay_triplets(&minutiae),
        };
        log::trace!(
            "built {} {} descriptors from {} minutiae",
            triplets.len(),
            self.descriptor,
            minutiae.len()
        );

        let features = TripletFeatures {
            minutiae: minutiae.into_boxed_slice(),
            index: TripletIndex::new(triplets),
        };
        match self.descriptor {
            DescriptorKind::NearestNeighbor => Features::NearestNeighbor(features),
            DescriptorKind::Delaunay => Features::Delaunay(features),
        }
    }
}

/// Produces the minutiae of a fingerprint from some input (an image, a template file...).
///
/// The order of the returned minutiae must be stable for a given input.
pub trait MinutiaSource<I: ?Sized> {
    fn extract(&self, input: &I) -> Result<Vec<Minutia>>;
}

impl<I: ?Sized, F> MinutiaSource<I> for F
where
    F: Fn(&I) -> Result<Vec<Minutia>>,
{
    fn extract(&self, input: &I) -> Result<Vec<Minutia>> {
        self(input)
    }
}

/// Connects a minutia source to a feature extractor.
pub struct FeaturePipeline<I: ?Sized> {
    source: Option<Box<dyn MinutiaSource<I> + Send + Sync>>,
    extractor: FeatureExtractor,
}

impl<I: ?Sized> FeaturePipeline<I> {
    pub fn new(config: &MatcherConfig) -> Self {
        FeaturePipeline {
            source: None,
            extractor: FeatureExtractor::new(config),
        }
    }

    pub fn with_minutia_source(
        mut self,
        source: impl MinutiaSource<I> + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn extract(&self, input: &I) -> Result<Features> {
        let source = self
            .source
            .as_ref()
            .ok_or(Error::UnconfiguredDependency("minutia source"))?;
        let minutiae = source.extract(input)?;
        Ok(self.extractor.extract(minutiae))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MinutiaKind;

    fn square(_: &str) -> Result<Vec<Minutia>> {
        Ok([(0, 0), (50, 0), (50, 50), (0, 50), (20, 30)]
            .iter()
            .map(|&(x, y)| Minutia::new(x, y, 1.0, MinutiaKind::End))
            .collect())
    }

    #[test]
    fn extractor_tags_features() {
        let minutiae = square("").unwrap();
        let nn = FeatureExtractor::new(&MatcherConfig::nearest_neighbor()).extract(minutiae.clone());
        assert_eq!(nn.kind(), DescriptorKind::NearestNeighbor);
        assert_eq!(nn.triplets().index().len(), 5);

        let delaunay = FeatureExtractor::new(&MatcherConfig::delaunay()).extract(minutiae);
        assert_eq!(delaunay.kind(), DescriptorKind::Delaunay);
        assert_eq!(delaunay.triplets().index().len(), 4 * 6);
        assert_eq!(delaunay.minutiae().len(), 5);
    }

    #[test]
    fn pipeline_requires_a_source() {
        let pipeline: FeaturePipeline<str> = FeaturePipeline::new(&MatcherConfig::default());
        match pipeline.extract("finger.xyt") {
            Err(Error::UnconfiguredDependency(name)) => assert_eq!(name, "minutia source"),
            other => panic!("unexpected result: {:?}", other.map(|f| f.kind())),
        }

        let pipeline = pipeline.with_minutia_source(square);
        assert_eq!(pipeline.extract("finger.xyt").unwrap().minutiae().len(), 5);
    }

    #[test]
    fn source_errors_propagate() {
        let failing = |_: &str| -> Result<Vec<Minutia>> { Err(Error::InvalidArgument("broken".into())) };
        let pipeline = FeaturePipeline::new(&MatcherConfig::default()).with_minutia_source(failing);
        assert!(matches!(pipeline.extract("x"), Err(Error::InvalidArgument(_))));
    }
}
