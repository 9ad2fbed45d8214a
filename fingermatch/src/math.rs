use std::f64::consts::{PI, TAU};

use crate::types::{Minutia, Point};

/// Maps any angle into `[0, 2π)`.
#[inline]
pub fn normalize_angle(rad: f64) -> f64 {
    let angle = rad.rem_euclid(TAU);
    // rem_euclid can round up to exactly 2π for tiny negative inputs
    if angle >= TAU {
        0.0
    } else {
        angle
    }
}

/// Counter-clockwise angle needed to turn `from` into `to`, within `[0, 2π)`.
#[inline]
pub fn angle_between(from: f64, to: f64) -> f64 {
    normalize_angle(to - from)
}

/// Signed difference `a - b` wrapped into `(-π, π]`.
#[inline]
pub fn signed_angle_difference(a: f64, b: f64) -> f64 {
    let difference = normalize_angle(a - b);
    if difference > PI {
        difference - TAU
    } else {
        difference
    }
}

/// Smallest rotation between two angles, within `[0, π]`.
#[inline]
pub fn angle_difference(a: f64, b: f64) -> f64 {
    signed_angle_difference(a, b).abs()
}

#[inline]
pub fn distance(a: Point, b: Point) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

#[inline]
pub fn minutia_distance(a: &Minutia, b: &Minutia) -> f64 {
    distance(a.position(), b.position())
}

/// Squared distance between minutiae, exact for integer coordinates.
#[inline]
pub fn minutia_distance_squared(a: &Minutia, b: &Minutia) -> i64 {
    let dx = (b.x - a.x) as i64;
    let dy = (b.y - a.y) as i64;
    dx * dx + dy * dy
}

/// Direction of the segment going from `from` to `to`, within `[0, 2π)`.
#[inline]
pub fn bearing(from: Point, to: Point) -> f64 {
    normalize_angle((to.y - from.y).atan2(to.x - from.x))
}

/// Circular mean of angles.
pub struct Averager {
    sum_of_sines: f64,
    sum_of_cosines: f64,
    count: usize,
}

impl Averager {
    #[inline]
    pub fn new() -> Self {
        Averager {
            sum_of_sines: 0.0,
            sum_of_cosines: 0.0,
            count: 0,
        }
    }

    #[inline]
    pub fn push(&mut self, angle: f64) {
        self.sum_of_sines += angle.sin();
        self.sum_of_cosines += angle.cos();
        self.count += 1;
    }

    /// Mean direction, or `None` when nothing was pushed or the angles cancel out.
    #[inline]
    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        let magnitude = self.sum_of_sines.hypot(self.sum_of_cosines) / self.count as f64;
        if magnitude < 1e-9 {
            return None;
        }
        Some(normalize_angle(self.sum_of_sines.atan2(self.sum_of_cosines)))
    }
}

impl Default for Averager {
    fn default() -> Self {
        Self::new()
    }
}

/// Rotation around the origin followed by a translation, mapping the query frame
/// onto the template frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct RigidTransform {
    pub rotation: f64,
    cos: f64,
    sin: f64,
    dx: f64,
    dy: f64,
}

/// A minutia moved by a [`RigidTransform`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MappedMinutia {
    pub position: Point,
    pub angle: f64,
}

impl RigidTransform {
    /// Builds the transform that maps `query` exactly onto `template`.
    pub fn from_seed(query: &Minutia, template: &Minutia) -> Self {
        let rotation = angle_between(query.angle, template.angle);
        let (sin, cos) = rotation.sin_cos();
        let qx = query.x as f64;
        let qy = query.y as f64;
        RigidTransform {
            rotation,
            cos,
            sin,
            dx: template.x as f64 - (cos * qx - sin * qy),
            dy: template.y as f64 - (sin * qx + cos * qy),
        }
    }

    #[inline]
    pub fn apply_point(&self, p: Point) -> Point {
        Point::new(
            self.cos * p.x - self.sin * p.y + self.dx,
            self.sin * p.x + self.cos * p.y + self.dy,
        )
    }

    #[inline]
    pub fn apply(&self, minutia: &Minutia) -> MappedMinutia {
        MappedMinutia {
            position: self.apply_point(minutia.position()),
            angle: normalize_angle(minutia.angle + self.rotation),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    use super::*;
    use crate::types::MinutiaKind;

    #[test]
    fn differences_wrap_around() {
        assert_abs_diff_eq!(angle_difference(0.1, TAU - 0.1), 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(signed_angle_difference(0.1, TAU - 0.1), 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(signed_angle_difference(TAU - 0.1, 0.1), -0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(angle_difference(0.0, PI), PI, epsilon = 1e-12);
        assert_abs_diff_eq!(angle_between(3.0 * FRAC_PI_2, 0.0), FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn normalization_stays_in_range() {
        assert_eq!(normalize_angle(-1e-20), 0.0);
        assert_abs_diff_eq!(normalize_angle(-FRAC_PI_2), 3.0 * FRAC_PI_2, epsilon = 1e-12);
        assert_abs_diff_eq!(normalize_angle(5.0 * PI), PI, epsilon = 1e-12);
    }

    #[test]
    fn circular_mean_crosses_zero() {
        let mut averager = Averager::new();
        averager.push(TAU - 0.2);
        averager.push(0.4);
        assert_abs_diff_eq!(averager.average().unwrap(), 0.1, epsilon = 1e-12);

        let mut opposite = Averager::new();
        opposite.push(0.0);
        opposite.push(PI);
        assert!(opposite.average().is_none());
        assert!(Averager::new().average().is_none());
    }

    #[test]
    fn transform_maps_seed_exactly() {
        let query = Minutia::new(10, 20, 0.3, MinutiaKind::End);
        let template = Minutia::new(110, -40, 1.9, MinutiaKind::End);
        let transform = RigidTransform::from_seed(&query, &template);
        let mapped = transform.apply(&query);
        assert_abs_diff_eq!(mapped.position.x, 110.0, epsilon = 1e-9);
        assert_abs_diff_eq!(mapped.position.y, -40.0, epsilon = 1e-9);
        assert_abs_diff_eq!(mapped.angle, 1.9, epsilon = 1e-12);
    }

    #[test]
    fn transform_preserves_distances_and_bearings() {
        let a = Minutia::new(0, 0, 0.0, MinutiaKind::End);
        let b = Minutia::new(30, 40, 0.0, MinutiaKind::End);
        let transform = RigidTransform::from_seed(&a, &Minutia::new(5, 5, FRAC_PI_2, MinutiaKind::End));
        let ma = transform.apply(&a).position;
        let mb = transform.apply(&b).position;
        assert_abs_diff_eq!(distance(ma, mb), 50.0, epsilon = 1e-9);
        let turned = bearing(ma, mb);
        assert_abs_diff_eq!(
            angle_difference(turned, bearing(a.position(), b.position()) + FRAC_PI_2),
            0.0,
            epsilon = 1e-9
        );
    }
}
