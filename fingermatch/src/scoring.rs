use crate::alignment::Alignment;
use crate::config::{RegionGate, ScoreFormula};
use crate::math::RigidTransform;
use crate::types::{Minutia, Point};

/// Normalizes `matched` correspondences against the minutia counts of both fingerprints.
pub fn normalized_score(
    formula: ScoreFormula,
    matched: usize,
    query_count: usize,
    template_count: usize,
) -> f64 {
    if matched == 0 || query_count == 0 || template_count == 0 {
        return 0.0;
    }

    let m = matched as f64;
    let q = query_count as f64;
    let t = template_count as f64;
    match formula {
        ScoreFormula::MaxNormalized => 100.0 * m / q.max(t),
        ScoreFormula::ProductNormalized => 100.0 * m * m / (q * t),
        ScoreFormula::GeometricMean => 100.0 * (m * m / (q * t)).sqrt(),
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    pub fn of(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bounds = BoundingBox {
            min: first,
            max: first,
        };
        for p in points {
            bounds.min.x = bounds.min.x.min(p.x);
            bounds.min.y = bounds.min.y.min(p.y);
            bounds.max.x = bounds.max.x.max(p.x);
            bounds.max.y = bounds.max.y.max(p.y);
        }
        Some(bounds)
    }

    pub fn grown(&self, margin: f64) -> Self {
        BoundingBox {
            min: Point::new(self.min.x - margin, self.min.y - margin),
            max: Point::new(self.max.x + margin, self.max.y + margin),
        }
    }

    #[inline]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// Which minutiae of each fingerprint lie in the area covered by the other one.
#[derive(Debug, Clone)]
pub struct Overlap {
    pub query: Vec<bool>,
    pub template: Vec<bool>,
}

impl Overlap {
    pub fn query_count(&self) -> usize {
        self.query.iter().filter(|&&inside| inside).count()
    }

    pub fn template_count(&self) -> usize {
        self.template.iter().filter(|&&inside| inside).count()
    }
}

/// Maps the query into the template frame and tests both sides against the
/// bounding box of the other one, grown by `margin`.
pub fn overlap(
    query: &[Minutia],
    template: &[Minutia],
    transform: &RigidTransform,
    margin: f64,
) -> Overlap {
    let mapped: Vec<Point> = query.iter().map(|m| transform.apply(m).position).collect();

    let template_box = BoundingBox::of(template.iter().map(Minutia::position)).map(|b| b.grown(margin));
    let query_box = BoundingBox::of(mapped.iter().copied()).map(|b| b.grown(margin));

    Overlap {
        query: mapped
            .iter()
            .map(|&p| template_box.map_or(false, |b| b.contains(p)))
            .collect(),
        template: template
            .iter()
            .map(|m| query_box.map_or(false, |b| b.contains(m.position())))
            .collect(),
    }
}

/// Scores an alignment, optionally restricting the counts to the overlapping area.
pub fn score_alignment(
    formula: ScoreFormula,
    gate: Option<&RegionGate>,
    query: &[Minutia],
    template: &[Minutia],
    alignment: &Alignment,
) -> f64 {
    let gate = match gate {
        Some(gate) => gate,
        None => return normalized_score(formula, alignment.len(), query.len(), template.len()),
    };
    let transform = match &alignment.transform {
        Some(transform) => transform,
        None => return 0.0,
    };

    let overlap = overlap(query, template, transform, gate.margin);
    let query_count = overlap.query_count();
    let template_count = overlap.template_count();
    if query_count <= gate.min_count || template_count <= gate.min_count {
        log::debug!(
            "overlap too small: {} query and {} template minutiae",
            query_count,
            template_count
        );
        return 0.0;
    }

    let matched = alignment
        .pairs
        .iter()
        .filter(|p| overlap.query[p.query.as_usize()] && overlap.template[p.template.as_usize()])
        .count();
    normalized_score(formula, matched, query_count, template_count)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::types::{MinutiaKind, MinutiaPair};

    fn grid(offset_x: i32, columns: i32) -> Vec<Minutia> {
        (0..columns)
            .flat_map(|i| (0..3).map(move |j| (i, j)))
            .map(|(i, j)| Minutia::new(offset_x + i * 20, j * 20, 0.5, MinutiaKind::End))
            .collect()
    }

    fn identity_alignment(minutiae: &[Minutia], count: usize) -> Alignment {
        Alignment {
            pairs: (0..count)
                .map(|i| MinutiaPair::new(i.into(), i.into(), 1.0))
                .collect(),
            transform: Some(RigidTransform::from_seed(&minutiae[0], &minutiae[0])),
        }
    }

    #[test]
    fn formulas() {
        assert_abs_diff_eq!(normalized_score(ScoreFormula::MaxNormalized, 10, 20, 40), 25.0);
        assert_abs_diff_eq!(normalized_score(ScoreFormula::ProductNormalized, 10, 20, 40), 12.5);
        assert_abs_diff_eq!(
            normalized_score(ScoreFormula::GeometricMean, 10, 20, 40),
            12.5f64.sqrt() * 10.0,
            epsilon = 1e-12
        );
        for formula in &[
            ScoreFormula::MaxNormalized,
            ScoreFormula::ProductNormalized,
            ScoreFormula::GeometricMean,
        ] {
            assert_eq!(normalized_score(*formula, 0, 20, 40), 0.0);
            assert_eq!(normalized_score(*formula, 3, 0, 40), 0.0);
            assert_abs_diff_eq!(normalized_score(*formula, 15, 15, 15), 100.0);
        }
    }

    #[test]
    fn bounding_box() {
        assert!(BoundingBox::of(std::iter::empty::<Point>()).is_none());
        let bounds = BoundingBox::of(vec![Point::new(3.0, 4.0), Point::new(-1.0, 10.0)]).unwrap();
        assert_eq!(bounds.min, Point::new(-1.0, 4.0));
        assert_eq!(bounds.max, Point::new(3.0, 10.0));
        assert!(bounds.contains(Point::new(3.0, 4.0)));
        assert!(!bounds.contains(Point::new(3.5, 4.0)));
        assert!(bounds.grown(1.0).contains(Point::new(3.5, 4.0)));
    }

    #[test]
    fn gate_counts_only_the_overlap() {
        // template covers columns 0..6, query columns 3..9 of the same grid
        let template = grid(0, 6);
        let query = grid(60, 6);
        // query column c sits at template column c + 3: pair the overlapping 3 columns
        let alignment = Alignment {
            pairs: (0usize..9)
                .map(|i| MinutiaPair::new(i.into(), (i + 9).into(), 1.0))
                .collect(),
            transform: Some(RigidTransform::from_seed(&query[0], &template[9])),
        };
        let gate = RegionGate {
            min_count: 6,
            margin: 8.0,
        };

        let gated = score_alignment(
            ScoreFormula::GeometricMean,
            Some(&gate),
            &query,
            &template,
            &alignment,
        );
        assert_abs_diff_eq!(gated, 100.0, epsilon = 1e-9);

        let plain = score_alignment(ScoreFormula::GeometricMean, None, &query, &template, &alignment);
        assert_abs_diff_eq!(plain, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn small_overlap_scores_zero() {
        let minutiae = grid(0, 2);
        let alignment = identity_alignment(&minutiae, minutiae.len());
        let gate = RegionGate {
            min_count: 6,
            margin: 8.0,
        };
        // 6 minutiae in region does not exceed the minimum
        assert_eq!(
            score_alignment(ScoreFormula::GeometricMean, Some(&gate), &minutiae, &minutiae, &alignment),
            0.0
        );

        let minutiae = grid(0, 3);
        let alignment = identity_alignment(&minutiae, minutiae.len());
        assert_abs_diff_eq!(
            score_alignment(ScoreFormula::GeometricMean, Some(&gate), &minutiae, &minutiae, &alignment),
            100.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn gate_without_transform_scores_zero() {
        let minutiae = grid(0, 4);
        let gate = RegionGate::default();
        let alignment = Alignment::default();
        assert_eq!(
            score_alignment(ScoreFormula::MaxNormalized, Some(&gate), &minutiae, &minutiae, &alignment),
            0.0
        );
    }
}
