//! Minutiae-based fingerprint matching with triplet descriptors.
//!
//! Every fingerprint is described by triplets of nearby minutiae (chosen by
//! nearest neighbors or by a Delaunay triangulation). Similar triplets of two
//! fingerprints vote for minutia correspondences, the largest set of mutually
//! consistent correspondences under one rigid transform is searched, and its size
//! is turned into a score in `[0, 100]`.

pub use alignment::{align, Alignment};
pub use config::{
    AlignmentThresholds, CandidateLookup, DescriptorKind, MatcherConfig, RegionGate,
    ScoreFormula, TripletThresholds,
};
pub use error::{Error, Result};
pub use features::{FeatureExtractor, FeaturePipeline, Features, MinutiaSource, TripletFeatures};
pub use matcher::{MatchResult, Matcher};
pub use math::RigidTransform;
pub use parsing::{parse, prune};
pub use types::{Minutia, MinutiaId, MinutiaKind, MinutiaPair, Point};

mod alignment;
mod associations;
pub mod compare;
pub mod config;
pub mod consts;
pub mod delaunay;
pub mod encoding;
mod error;
pub mod features;
pub mod index;
mod matcher;
pub mod math;
pub mod parsing;
pub mod reduction;
pub mod scoring;
pub mod triplets;
pub mod types;
