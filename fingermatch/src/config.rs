use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::{
    GLOBAL_ANGLE_THRESHOLD, GLOBAL_DISTANCE_THRESHOLD, MIN_NUMBER_OF_MINUTIAE, NEAREST_NEIGHBORS,
    NO_ROTATION_DIRECTION_THRESHOLD, REGION_MARGIN, REGION_MIN_COUNT, TRIPLET_ANGLE_THRESHOLD,
    TRIPLET_DISTANCE_THRESHOLD,
};
use crate::error::{Error, Result};

/// Strategy used to pick the neighborhood of every minutia.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptorKind {
    NearestNeighbor,
    Delaunay,
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DescriptorKind::NearestNeighbor => f.write_str("nearest-neighbor triplet"),
            DescriptorKind::Delaunay => f.write_str("delaunay triplet"),
        }
    }
}

/// How candidate template triplets are retrieved for a query triplet.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateLookup {
    /// Binary search on the longest edge, then full comparison.
    DistanceWindow,
    /// Hash buckets of the discretized alpha angles, then full comparison.
    AngleBuckets,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFormula {
    /// `100·m/max(q,t)`
    MaxNormalized,
    /// `100·m²/(q·t)`
    ProductNormalized,
    /// `100·√(m²/(q·t))`
    GeometricMean,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripletThresholds {
    pub distance: f64,
    pub angle: f64,
    /// Gate on the raw minutia directions; only for captures without rotation.
    pub direction: Option<f64>,
}

impl Default for TripletThresholds {
    fn default() -> Self {
        TripletThresholds {
            distance: TRIPLET_DISTANCE_THRESHOLD,
            angle: TRIPLET_ANGLE_THRESHOLD,
            direction: None,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentThresholds {
    pub distance: f64,
    pub angle: f64,
}

impl Default for AlignmentThresholds {
    fn default() -> Self {
        AlignmentThresholds {
            distance: GLOBAL_DISTANCE_THRESHOLD,
            angle: GLOBAL_ANGLE_THRESHOLD,
        }
    }
}

/// Restricts scoring to the area both fingerprints cover after alignment.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionGate {
    /// Both in-region minutia counts must exceed this value.
    pub min_count: usize,
    /// Growth of the bounding boxes on every side.
    pub margin: f64,
}

impl Default for RegionGate {
    fn default() -> Self {
        RegionGate {
            min_count: REGION_MIN_COUNT,
            margin: REGION_MARGIN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    pub descriptor: DescriptorKind,
    /// Neighbors per minutia for nearest-neighbor triplets.
    pub neighbors: usize,
    pub lookup: CandidateLookup,
    pub triplet: TripletThresholds,
    pub alignment: AlignmentThresholds,
    /// Fingerprints with fewer minutiae score 0 without searching.
    pub min_minutiae: usize,
    pub score: ScoreFormula,
    pub region_gate: Option<RegionGate>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self::nearest_neighbor()
    }
}

impl MatcherConfig {
    pub fn nearest_neighbor() -> Self {
        MatcherConfig {
            descriptor: DescriptorKind::NearestNeighbor,
            neighbors: NEAREST_NEIGHBORS,
            lookup: CandidateLookup::DistanceWindow,
            triplet: TripletThresholds::default(),
            alignment: AlignmentThresholds::default(),
            min_minutiae: MIN_NUMBER_OF_MINUTIAE,
            score: ScoreFormula::ProductNormalized,
            region_gate: None,
        }
    }

    /// Nearest-neighbor triplets for captures that share their orientation.
    pub fn no_rotation() -> Self {
        MatcherConfig {
            triplet: TripletThresholds {
                direction: Some(NO_ROTATION_DIRECTION_THRESHOLD),
                ..TripletThresholds::default()
            },
            ..Self::nearest_neighbor()
        }
    }

    pub fn delaunay() -> Self {
        MatcherConfig {
            descriptor: DescriptorKind::Delaunay,
            score: ScoreFormula::GeometricMean,
            region_gate: Some(RegionGate::default()),
            ..Self::nearest_neighbor()
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "nn" | "nearest-neighbor" => Some(Self::nearest_neighbor()),
            "no-rotation" => Some(Self::no_rotation()),
            "delaunay" => Some(Self::delaunay()),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        fn positive(name: &str, value: f64) -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidArgument(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )))
            }
        }

        positive("triplet distance threshold", self.triplet.distance)?;
        positive("triplet angle threshold", self.triplet.angle)?;
        if let Some(direction) = self.triplet.direction {
            positive("direction threshold", direction)?;
        }
        positive("alignment distance threshold", self.alignment.distance)?;
        positive("alignment angle threshold", self.alignment.angle)?;
        if let Some(gate) = &self.region_gate {
            if !(gate.margin.is_finite() && gate.margin >= 0.0) {
                return Err(Error::InvalidArgument(format!(
                    "region margin must be non-negative, got {}",
                    gate.margin
                )));
            }
        }
        if self.descriptor == DescriptorKind::NearestNeighbor && self.neighbors < 2 {
            return Err(Error::InvalidArgument(format!(
                "nearest-neighbor triplets need at least 2 neighbors, got {}",
                self.neighbors
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        for name in &["nn", "no-rotation", "delaunay"] {
            MatcherConfig::preset(name).unwrap().validate().unwrap();
        }
        assert!(MatcherConfig::preset("unknown").is_none());
    }

    #[test]
    fn rejects_bad_thresholds() {
        let mut config = MatcherConfig::nearest_neighbor();
        config.alignment.angle = -1.0;
        assert!(matches!(config.validate(), Err(Error::InvalidArgument(_))));

        let mut config = MatcherConfig::nearest_neighbor();
        config.neighbors = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: MatcherConfig =
            serde_json::from_str(r#"{ "descriptor": "delaunay", "min_minutiae": 6 }"#).unwrap();
        assert_eq!(config.descriptor, DescriptorKind::Delaunay);
        assert_eq!(config.min_minutiae, 6);
        assert_eq!(config.neighbors, NEAREST_NEIGHBORS);
        assert_eq!(config.region_gate, None);

        let json = serde_json::to_string(&MatcherConfig::delaunay()).unwrap();
        let back: MatcherConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, MatcherConfig::delaunay());
    }
}
