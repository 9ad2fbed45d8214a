//! Incremental (Bowyer-Watson) Delaunay triangulation of minutia positions.
//!
//! Points are inserted one by one into a triangulation that starts from a
//! synthetic super-triangle enclosing all of them. Every triangle whose
//! circumcircle contains the new point is removed and the hole is re-triangulated
//! by connecting its boundary edges to the point. Triangles that still touch the
//! super-triangle at the end are discarded.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::consts::DELAUNAY_EPSILON;
use crate::types::Point;

/// Relative tolerance of the squared-radius comparison.
const CIRCLE_TOLERANCE: f64 = 1e-12;

/// Undirected edge; endpoints are kept ordered so both directions hash the same.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct Edge(usize, usize);

impl Edge {
    #[inline]
    fn new(a: usize, b: usize) -> Self {
        if a < b {
            Edge(a, b)
        } else {
            Edge(b, a)
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Circumcircle {
    center: Point,
    radius_squared: f64,
}

impl Circumcircle {
    fn of(a: Point, b: Point, c: Point) -> Option<Self> {
        let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
        if d.abs() < f64::EPSILON {
            return None;
        }

        let a2 = a.x * a.x + a.y * a.y;
        let b2 = b.x * b.x + b.y * b.y;
        let c2 = c.x * c.x + c.y * c.y;
        let center = Point::new(
            (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d,
            (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d,
        );
        let radius_squared = (a.x - center.x).powi(2) + (a.y - center.y).powi(2);
        Some(Circumcircle {
            center,
            radius_squared,
        })
    }

    /// Strict containment, points on the circle (within tolerance) are outside.
    #[inline]
    fn contains(&self, p: Point) -> bool {
        let distance_squared = (p.x - self.center.x).powi(2) + (p.y - self.center.y).powi(2);
        distance_squared < self.radius_squared * (1.0 - CIRCLE_TOLERANCE)
    }
}

#[derive(Clone, Copy, Debug)]
struct Triangle {
    vertices: [usize; 3],
    circle: Circumcircle,
}

/// Triangulates `points` and returns triangles as triples of indices into `points`.
///
/// Fewer than 3 distinct points, or only collinear points, give an empty result.
pub fn triangulate(points: &[Point]) -> Vec<[usize; 3]> {
    triangulate_with_tolerance(points, DELAUNAY_EPSILON)
}

pub fn triangulate_with_tolerance(points: &[Point], epsilon: f64) -> Vec<[usize; 3]> {
    if points.len() < 3 {
        return vec![];
    }

    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by(|&a, &b| {
        let (pa, pb) = (points[a], points[b]);
        pa.y.partial_cmp(&pb.y)
            .unwrap_or(Ordering::Equal)
            .then(pa.x.partial_cmp(&pb.x).unwrap_or(Ordering::Equal))
            .then(a.cmp(&b))
    });

    // vertices of the working triangulation: input points followed by the super-triangle
    let mut vertices: Vec<Point> = points.to_vec();
    let super_start = vertices.len();
    vertices.extend_from_slice(&super_triangle(points));

    let mut triangles = Vec::with_capacity(points.len() * 2 + 1);
    match Circumcircle::of(
        vertices[super_start],
        vertices[super_start + 1],
        vertices[super_start + 2],
    ) {
        Some(circle) => triangles.push(Triangle {
            vertices: [super_start, super_start + 1, super_start + 2],
            circle,
        }),
        None => return vec![],
    }

    let mut edges: HashMap<Edge, u32> = HashMap::new();
    let mut previous: Option<Point> = None;

    for &index in &order {
        let point = points[index];
        if let Some(prev) = previous {
            if (point.x - prev.x).abs() <= epsilon && (point.y - prev.y).abs() <= epsilon {
                continue;
            }
        }
        previous = Some(point);

        edges.clear();
        triangles.retain(|triangle| {
            if !triangle.circle.contains(point) {
                return true;
            }
            let [a, b, c] = triangle.vertices;
            for edge in [Edge::new(a, b), Edge::new(b, c), Edge::new(c, a)] {
                *edges.entry(edge).or_insert(0) += 1;
            }
            false
        });

        // deterministic order of the boundary edges
        let mut boundary: Vec<Edge> = edges
            .iter()
            .filter(|(_, &count)| count == 1)
            .map(|(&edge, _)| edge)
            .collect();
        boundary.sort_by_key(|edge| (edge.0, edge.1));

        for Edge(a, b) in boundary {
            if let Some(circle) = Circumcircle::of(vertices[a], vertices[b], point) {
                triangles.push(Triangle {
                    vertices: [a, b, index],
                    circle,
                });
            }
        }
    }

    triangles
        .into_iter()
        .filter(|triangle| triangle.vertices.iter().all(|&v| v < super_start))
        .map(|triangle| triangle.vertices)
        .collect()
}

fn super_triangle(points: &[Point]) -> [Point; 3] {
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    let delta = (max_x - min_x).max(max_y - min_y).max(1.0) * 100.0;
    let mid_x = (min_x + max_x) / 2.0;
    let mid_y = (min_y + max_y) / 2.0;
    [
        Point::new(mid_x - 2.0 * delta, mid_y - delta),
        Point::new(mid_x, mid_y + 2.0 * delta),
        Point::new(mid_x + 2.0 * delta, mid_y - delta),
    ]
}
