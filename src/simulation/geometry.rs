//! 2D geometry helpers on renderer-local points
//!
//! All tests here work in the x/z ground plane and ignore altitude.

use super::types::{r2d, Point};

/// Compass heading [deg] of travel from one point to another,
/// clockwise from north (-z), in `[0, 360)`
pub fn heading_between(from: &Point, to: &Point) -> f32 {
    heading_of(to.x - from.x, to.z - from.z)
}

/// Compass heading [deg] of a direction vector in the x/z plane
pub fn heading_of(dx: f32, dz: f32) -> f32 {
    normalize_heading(r2d(dx.atan2(-dz)))
}

pub fn normalize_heading(heading: f32) -> f32 {
    let h = heading % 360.0;
    if h < 0.0 {
        h + 360.0
    } else {
        h
    }
}

/// Is the point inside the polygon?
///
/// Crossing-number test; points exactly on an edge may land either way.
pub fn inside(p: &Point, poly: &[Point]) -> bool {
    let mut c = false;
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (&poly[i], &poly[j]);
        if ((pi.z <= p.z && p.z < pj.z) || (pj.z <= p.z && p.z < pi.z))
            && p.x < (pj.x - pi.x) * (p.z - pi.z) / (pj.z - pi.z) + pi.x
        {
            c = !c;
        }
        j = i;
    }
    c
}

/// Does the segment p0->p1 intersect p2->p3?
///
/// Parallel segments never intersect by this test.
pub fn intersect(p0: &Point, p1: &Point, p2: &Point, p3: &Point) -> bool {
    let s1_x = p1.x - p0.x;
    let s1_z = p1.z - p0.z;
    let s2_x = p3.x - p2.x;
    let s2_z = p3.z - p2.z;
    let d = -s2_x * s1_z + s1_x * s2_z;
    if d == 0.0 {
        return false;
    }
    let s = (-s1_z * (p0.x - p2.x) + s1_x * (p0.z - p2.z)) / d;
    let t = (s2_x * (p0.z - p2.z) - s2_z * (p0.x - p2.x)) / d;

    (0.0..=1.0).contains(&s) && (0.0..=1.0).contains(&t)
}

/// Shortest distance from a point to the segment a->b
pub fn point_segment_distance(p: &Point, a: &Point, b: &Point) -> f32 {
    let seg_x = b.x - a.x;
    let seg_z = b.z - a.z;
    let len_sq = seg_x * seg_x + seg_z * seg_z;
    if len_sq <= f32::EPSILON {
        return p.distance_2d(a);
    }
    let t = (((p.x - a.x) * seg_x + (p.z - a.z) * seg_z) / len_sq).clamp(0.0, 1.0);
    let closest = Point::new(a.x + t * seg_x, p.y, a.z + t * seg_z);
    p.distance_2d(&closest)
}

/// Shortest distance between segments p0->p1 and p2->p3
pub fn segment_distance(p0: &Point, p1: &Point, p2: &Point, p3: &Point) -> f32 {
    if intersect(p0, p1, p2, p3) {
        return 0.0;
    }
    point_segment_distance(p0, p2, p3)
        .min(point_segment_distance(p1, p2, p3))
        .min(point_segment_distance(p2, p0, p1))
        .min(point_segment_distance(p3, p0, p1))
}

/// Cubic Bezier curve used to round off a turn at a waypoint
#[derive(Debug, Clone, Copy)]
pub struct Bezier {
    pub p0: Point,
    pub c0: Point,
    pub c1: Point,
    pub p1: Point,
}

impl Bezier {
    /// Turn that enters at `start`, is pulled towards the waypoint `corner`,
    /// and leaves at `end`
    pub fn turn(start: Point, corner: Point, end: Point) -> Self {
        Self {
            p0: start,
            c0: start.lerp(&corner, 2.0 / 3.0),
            c1: end.lerp(&corner, 2.0 / 3.0),
            p1: end,
        }
    }

    pub fn point(&self, t: f32) -> Point {
        let u = 1.0 - t;
        let a = u * u * u;
        let b = 3.0 * u * u * t;
        let c = 3.0 * u * t * t;
        let d = t * t * t;
        Point::new(
            a * self.p0.x + b * self.c0.x + c * self.c1.x + d * self.p1.x,
            a * self.p0.y + b * self.c0.y + c * self.c1.y + d * self.p1.y,
            a * self.p0.z + b * self.c0.z + c * self.c1.z + d * self.p1.z,
        )
    }

    /// First derivative in the x/z plane
    pub fn derivative(&self, t: f32) -> (f32, f32) {
        let u = 1.0 - t;
        let a = 3.0 * u * u;
        let b = 6.0 * u * t;
        let c = 3.0 * t * t;
        (
            a * (self.c0.x - self.p0.x) + b * (self.c1.x - self.c0.x) + c * (self.p1.x - self.c1.x),
            a * (self.c0.z - self.p0.z) + b * (self.c1.z - self.c0.z) + c * (self.p1.z - self.c1.z),
        )
    }

    /// Second derivative in the x/z plane
    fn second_derivative(&self, t: f32) -> (f32, f32) {
        let u = 1.0 - t;
        (
            6.0 * u * (self.c1.x - 2.0 * self.c0.x + self.p0.x)
                + 6.0 * t * (self.p1.x - 2.0 * self.c1.x + self.c0.x),
            6.0 * u * (self.c1.z - 2.0 * self.c0.z + self.p0.z)
                + 6.0 * t * (self.p1.z - 2.0 * self.c1.z + self.c0.z),
        )
    }

    /// Compass heading [deg] of travel along the curve
    pub fn heading(&self, t: f32) -> f32 {
        let (dx, dz) = self.derivative(t);
        heading_of(dx, dz)
    }

    /// Signed curvature [1/m]; positive when turning right
    pub fn curvature(&self, t: f32) -> f32 {
        let (dx, dz) = self.derivative(t);
        let (ddx, ddz) = self.second_derivative(t);
        let speed_sq = dx * dx + dz * dz;
        if speed_sq <= f32::EPSILON {
            return 0.0;
        }
        // x east, z south: a clockwise (right) turn has a positive cross product
        (dx * ddz - dz * ddx) / (speed_sq * speed_sq.sqrt())
    }
}
