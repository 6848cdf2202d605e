//! Closed boundary polygons and signed distance queries.
//!
//! A [`BoundaryPolygon`] is validated once at construction: at least three
//! distinct finite vertices, non-zero area and no self-intersections. The
//! closing edge is implicit; a repeated first vertex (the GeoJSON ring
//! convention) is accepted and dropped. Vertices are stored counter-clockwise
//! so the inward normal of every edge is its left normal.
//!
//! # Signed distance
//!
//! ```text
//!            outside: d < 0
//!        +-----------------------+
//!        |                       |
//!        |    inside: d > 0      |  <-- d = 0 on the edges
//!        |          p            |
//!        |          |  |p - q|   |
//!        +----------q------------+
//! ```
//!
//! The distance magnitude is the Euclidean distance to the nearest point `q`
//! on any edge; the sign comes from a crossing-number point-in-polygon test,
//! so non-convex boundaries work. The gradient with respect to `p` is
//! `(p - q)/|p - q|` inside and `-(p - q)/|p - q|` outside; both point into
//! the polygon. Exactly on an edge the inward edge normal is returned.

use crate::error::{WfloError, WfloResult};
use crate::geometry::Point;
use serde::Serialize;

/// Relative tolerance used for degeneracy checks
const GEOM_EPS: f64 = 1e-12;

/// Validated simple polygon, counter-clockwise
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryPolygon {
    vertices: Vec<Point>,
    /// Edge lengths, edge `i` runs from vertex `i` to vertex `i + 1`
    #[serde(skip)]
    edge_lengths: Vec<f64>,
}

/// Nearest point on the polygon boundary
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryProjection {
    pub point: Point,
    pub edge: usize,
    pub distance: f64,
}

impl BoundaryPolygon {
    /// Validate and normalize a vertex ring.
    pub fn new(vertices: Vec<Point>) -> WfloResult<Self> {
        if let Some(i) = vertices.iter().position(|p| !p.is_finite()) {
            return Err(WfloError::input(format!(
                "boundary vertex {} is not finite",
                i
            )));
        }

        // Drop consecutive duplicates and the explicit closing vertex
        let mut ring: Vec<Point> = Vec::with_capacity(vertices.len());
        for v in vertices {
            if ring.last().map_or(true, |last| *last != v) {
                ring.push(v);
            }
        }
        while ring.len() > 1 && ring.first() == ring.last() {
            ring.pop();
        }

        if ring.len() < 3 {
            return Err(WfloError::input(format!(
                "boundary needs at least 3 distinct vertices, got {}",
                ring.len()
            )));
        }

        let area = shoelace_area(&ring);
        let scale = bbox_diagonal(&ring);
        if area.abs() <= GEOM_EPS * scale * scale {
            return Err(WfloError::input("boundary polygon has zero area"));
        }

        if let Some((a, b)) = find_self_intersection(&ring, scale) {
            return Err(WfloError::input(format!(
                "boundary polygon is self-intersecting (edges {} and {})",
                a, b
            )));
        }

        if area < 0.0 {
            ring.reverse();
        }

        let n = ring.len();
        let edge_lengths = (0..n)
            .map(|i| ring[i].distance(&ring[(i + 1) % n]))
            .collect();

        Ok(Self {
            vertices: ring,
            edge_lengths,
        })
    }

    /// Axis-aligned rectangle
    pub fn rectangle(min: Point, max: Point) -> WfloResult<Self> {
        Self::new(vec![
            min,
            Point::new(max.x, min.y),
            max,
            Point::new(min.x, max.y),
        ])
    }

    /// Counter-clockwise vertices, closing vertex not repeated
    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    pub fn num_edges(&self) -> usize {
        self.vertices.len()
    }

    /// Enclosed area, m²
    pub fn area(&self) -> f64 {
        shoelace_area(&self.vertices)
    }

    pub fn perimeter(&self) -> f64 {
        self.edge_lengths.iter().sum()
    }

    /// `(min, max)` corners of the bounding box
    pub fn bounding_box(&self) -> (Point, Point) {
        bbox(&self.vertices)
    }

    /// Crossing-number point-in-polygon test. Points exactly on an edge may
    /// land on either side; use [`Self::signed_distance`] when that matters.
    pub fn contains(&self, p: &Point) -> bool {
        let n = self.vertices.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let vi = &self.vertices[i];
            let vj = &self.vertices[j];
            if (vi.y > p.y) != (vj.y > p.y) {
                let x_cross = vj.x + (p.y - vj.y) * (vi.x - vj.x) / (vi.y - vj.y);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Nearest point on any edge
    pub fn project(&self, p: &Point) -> BoundaryProjection {
        let n = self.vertices.len();
        let mut best = BoundaryProjection {
            point: self.vertices[0],
            edge: 0,
            distance: f64::INFINITY,
        };
        for i in 0..n {
            let a = &self.vertices[i];
            let b = &self.vertices[(i + 1) % n];
            let q = closest_point_on_segment(p, a, b);
            let d = p.distance(&q);
            if d < best.distance {
                best = BoundaryProjection {
                    point: q,
                    edge: i,
                    distance: d,
                };
            }
        }
        best
    }

    /// Signed distance to the boundary: positive inside, negative outside,
    /// zero on an edge.
    pub fn signed_distance(&self, p: &Point) -> f64 {
        let proj = self.project(p);
        if proj.distance == 0.0 || self.contains(p) {
            proj.distance
        } else {
            -proj.distance
        }
    }

    /// Signed distance and its gradient with respect to `p`. The gradient is
    /// unit length and points into the polygon.
    pub fn signed_distance_with_gradient(&self, p: &Point) -> (f64, [f64; 2]) {
        let proj = self.project(p);
        let tiny = GEOM_EPS * self.perimeter().max(1.0);

        let inside = proj.distance == 0.0 || self.contains(p);
        let value = if inside { proj.distance } else { -proj.distance };

        // On the edge the direction to the nearest point is ill-conditioned
        if proj.distance <= tiny {
            return (value, self.inward_normal(proj.edge));
        }

        let (dx, dy) = p.sub(&proj.point);
        let ux = dx / proj.distance;
        let uy = dy / proj.distance;
        if inside {
            (value, [ux, uy])
        } else {
            (value, [-ux, -uy])
        }
    }

    /// Unit inward normal of edge `i` (left normal of a CCW edge)
    pub fn inward_normal(&self, edge: usize) -> [f64; 2] {
        let n = self.vertices.len();
        let a = &self.vertices[edge % n];
        let b = &self.vertices[(edge + 1) % n];
        let len = self.edge_lengths[edge % n];
        [-(b.y - a.y) / len, (b.x - a.x) / len]
    }
}

fn shoelace_area(ring: &[Point]) -> f64 {
    let n = ring.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let a = &ring[i];
            let b = &ring[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum();
    0.5 * twice
}

fn bbox(ring: &[Point]) -> (Point, Point) {
    let mut min = Point::new(f64::INFINITY, f64::INFINITY);
    let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in ring {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    (min, max)
}

fn bbox_diagonal(ring: &[Point]) -> f64 {
    let (min, max) = bbox(ring);
    min.distance(&max)
}

fn closest_point_on_segment(p: &Point, a: &Point, b: &Point) -> Point {
    let (abx, aby) = b.sub(a);
    let len2 = abx * abx + aby * aby;
    if len2 == 0.0 {
        return *a;
    }
    let (apx, apy) = p.sub(a);
    let t = ((apx * abx + apy * aby) / len2).clamp(0.0, 1.0);
    Point::new(a.x + t * abx, a.y + t * aby)
}

/// z-component of (b - a) x (c - a)
fn cross(a: &Point, b: &Point, c: &Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn on_segment(p: &Point, a: &Point, b: &Point) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

fn segments_intersect(p1: &Point, p2: &Point, q1: &Point, q2: &Point, tol: f64) -> bool {
    let d1 = cross(q1, q2, p1);
    let d2 = cross(q1, q2, p2);
    let d3 = cross(p1, p2, q1);
    let d4 = cross(p1, p2, q2);

    if ((d1 > tol && d2 < -tol) || (d1 < -tol && d2 > tol))
        && ((d3 > tol && d4 < -tol) || (d3 < -tol && d4 > tol))
    {
        return true;
    }

    (d1.abs() <= tol && on_segment(p1, q1, q2))
        || (d2.abs() <= tol && on_segment(p2, q1, q2))
        || (d3.abs() <= tol && on_segment(q1, p1, p2))
        || (d4.abs() <= tol && on_segment(q2, p1, p2))
}

/// First pair of crossing edges, if any. Adjacent edges only count when
/// they fold back onto each other.
fn find_self_intersection(ring: &[Point], scale: f64) -> Option<(usize, usize)> {
    let n = ring.len();
    let tol = GEOM_EPS * scale * scale;

    for i in 0..n {
        let a = &ring[i];
        let b = &ring[(i + 1) % n];
        let c = &ring[(i + 2) % n];
        // Spike: next edge doubles back along this one
        if cross(a, b, c).abs() <= tol {
            let dot = (a.x - b.x) * (c.x - b.x) + (a.y - b.y) * (c.y - b.y);
            if dot > 0.0 {
                return Some((i, (i + 1) % n));
            }
        }
    }

    for i in 0..n {
        let p1 = &ring[i];
        let p2 = &ring[(i + 1) % n];
        for j in (i + 2)..n {
            // Edge n-1 and edge 0 share vertex 0
            if i == 0 && j == n - 1 {
                continue;
            }
            let q1 = &ring[j];
            let q2 = &ring[(j + 1) % n];
            if segments_intersect(p1, p2, q1, q2, tol) {
                return Some((i, j));
            }
        }
    }
    None
}
