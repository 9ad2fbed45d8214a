use std::collections::HashSet;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

use approx::assert_abs_diff_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use fingermatch::encoding::{decode, encode};
use fingermatch::{
    Error, FeaturePipeline, Matcher, MatcherConfig, Minutia, MinutiaKind, Result,
};

fn random_minutiae(seed: u64, count: usize) -> Vec<Minutia> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seen = HashSet::new();
    let mut minutiae = Vec::with_capacity(count);
    while minutiae.len() < count {
        let x = rng.random_range(20..420);
        let y = rng.random_range(20..420);
        if !seen.insert((x, y)) {
            continue;
        }
        let kind = if rng.random_bool(0.5) {
            MinutiaKind::End
        } else {
            MinutiaKind::Bifurcation
        };
        minutiae.push(Minutia::new(x, y, rng.random_range(0.0..TAU), kind));
    }
    minutiae
}

/// Quarter turn counter-clockwise, then a shift.
fn turned(minutiae: &[Minutia]) -> Vec<Minutia> {
    minutiae
        .iter()
        .map(|m| Minutia::new(500 - m.y, m.x + 30, m.angle + FRAC_PI_2, m.kind))
        .collect()
}

fn shifted(minutiae: &[Minutia], dx: i32, dy: i32) -> Vec<Minutia> {
    minutiae
        .iter()
        .map(|m| Minutia::new(m.x + dx, m.y + dy, m.angle, m.kind))
        .collect()
}

fn score(config: MatcherConfig, query: &[Minutia], template: &[Minutia]) -> f64 {
    let matcher = Matcher::new(config).unwrap();
    let query = matcher.extract(query.to_vec());
    let template = matcher.extract(template.to_vec());
    matcher.score(&query, &template).unwrap()
}

fn presets() -> Vec<MatcherConfig> {
    vec![
        MatcherConfig::nearest_neighbor(),
        MatcherConfig::no_rotation(),
        MatcherConfig::delaunay(),
    ]
}

#[test]
fn identical_fingerprints_match_completely() {
    let minutiae = random_minutiae(1, 20);
    for config in presets() {
        let matcher = Matcher::new(config).unwrap();
        let features = matcher.extract(minutiae.clone());
        let result = matcher.match_features(&features, &features).unwrap();
        assert_eq!(result.pairs.len(), 20);
        assert_abs_diff_eq!(result.score, 100.0, epsilon = 1e-9);
        assert!(result.pairs.iter().all(|p| p.query == p.template));
    }
}

#[test]
fn rotation_and_translation_do_not_matter() {
    for seed in 2..6 {
        let minutiae = random_minutiae(seed, 25);
        let moved = turned(&minutiae);

        let nn = score(MatcherConfig::nearest_neighbor(), &minutiae, &moved);
        assert_abs_diff_eq!(nn, 100.0, epsilon = 1e-9);

        let delaunay = score(MatcherConfig::delaunay(), &minutiae, &moved);
        assert!(delaunay >= 90.0, "seed {} scored {}", seed, delaunay);
    }
}

#[test]
fn no_rotation_matcher_rejects_turned_fingerprints() {
    let minutiae = random_minutiae(7, 25);
    assert_abs_diff_eq!(
        score(MatcherConfig::no_rotation(), &minutiae, &shifted(&minutiae, 17, -9)),
        100.0,
        epsilon = 1e-9
    );
    assert_eq!(score(MatcherConfig::no_rotation(), &minutiae, &turned(&minutiae)), 0.0);
}

#[test]
fn half_turn_is_found_by_rotation_tolerant_matchers() {
    let minutiae = random_minutiae(8, 25);
    let flipped: Vec<Minutia> = minutiae
        .iter()
        .map(|m| Minutia::new(600 - m.x, 600 - m.y, m.angle + PI, m.kind))
        .collect();

    let matcher = Matcher::new(MatcherConfig::nearest_neighbor()).unwrap();
    let result = matcher
        .match_features(
            &matcher.extract(minutiae.clone()),
            &matcher.extract(flipped.clone()),
        )
        .unwrap();
    assert_abs_diff_eq!(result.score, 100.0, epsilon = 1e-9);
    assert_abs_diff_eq!(result.rotation.unwrap(), PI, epsilon = 1e-9);
}

#[test]
fn matching_is_repeatable() {
    let a = random_minutiae(9, 30);
    let mut b = turned(&a);
    b.truncate(24);
    for config in presets() {
        let matcher = Matcher::new(config).unwrap();
        let first = matcher.match_features(&matcher.extract(a.clone()), &matcher.extract(b.clone())).unwrap();
        let second = matcher.match_features(&matcher.extract(a.clone()), &matcher.extract(b.clone())).unwrap();
        assert_eq!(first.score, second.score);
        assert_eq!(first.pairs, second.pairs);
    }
}

#[test]
fn genuine_pairs_score_above_impostors() {
    let finger = random_minutiae(11, 25);
    let mut partial = turned(&finger);
    partial.remove(20);
    partial.remove(12);
    partial.remove(3);
    let stranger = random_minutiae(12, 25);

    let config = MatcherConfig::nearest_neighbor();
    for (query, template) in &[(&finger, &partial), (&partial, &finger)] {
        let genuine = score(config.clone(), query, template);
        assert!(genuine > 20.0, "genuine pair scored {}", genuine);
    }
    for (query, template) in &[(&finger, &stranger), (&stranger, &finger)] {
        let impostor = score(config.clone(), query, template);
        assert!(impostor < 10.0, "impostor pair scored {}", impostor);
    }
}

#[test]
fn matcher_refuses_foreign_features() {
    let minutiae = random_minutiae(13, 15);
    let nn = Matcher::new(MatcherConfig::nearest_neighbor()).unwrap();
    let delaunay = Matcher::new(MatcherConfig::delaunay()).unwrap();
    let features = delaunay.extract(minutiae);
    assert!(matches!(
        nn.score(&features, &features),
        Err(Error::InvalidFeatureType { .. })
    ));
}

#[test]
fn compact_templates_flow_through_the_pipeline() {
    let minutiae = random_minutiae(14, 20);
    let bytes = encode(&minutiae).unwrap();
    assert_eq!(bytes.len(), 80);

    let config = MatcherConfig::nearest_neighbor();
    let pipeline: FeaturePipeline<[u8]> = FeaturePipeline::new(&config);
    assert!(matches!(
        pipeline.extract(&bytes),
        Err(Error::UnconfiguredDependency("minutia source"))
    ));

    let pipeline = pipeline.with_minutia_source(|bytes: &[u8]| -> Result<Vec<Minutia>> { decode(bytes) });
    let decoded = pipeline.extract(&bytes).unwrap();

    let matcher = Matcher::new(config).unwrap();
    let original = matcher.extract(minutiae);
    assert_abs_diff_eq!(matcher.score(&original, &decoded).unwrap(), 100.0, epsilon = 1e-9);
}
