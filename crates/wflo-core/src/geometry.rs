//! Planar geometry primitives: points and turbine layouts.
//!
//! Coordinates are meters in a projected planar system (UTM or any local
//! east/north frame). Projection from lon/lat happens before data reaches
//! this crate.
//!
//! # Flat design vector
//!
//! Optimizers see a layout as a single `Vec<f64>` with the x-block first and
//! the y-block second:
//!
//! ```text
//!   index:  0    1    ...  N-1   N    N+1  ...  2N-1
//!   value:  x_0  x_1  ...  x_N-1 y_0  y_1  ...  y_N-1
//! ```
//!
//! [`Layout::to_flat`] and [`Layout::from_flat`] convert between the two
//! representations; [`x_index`] and [`y_index`] give the column of a
//! turbine's coordinate in constraint Jacobians.

use crate::error::{WfloError, WfloResult};
use serde::{Deserialize, Serialize};

/// A position in the plane, meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Euclidean distance to another point
    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Component-wise difference `self - other`
    #[inline]
    pub fn sub(&self, other: &Point) -> (f64, f64) {
        (self.x - other.x, self.y - other.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Column of turbine `i`'s x coordinate in the flat design vector
#[inline]
pub fn x_index(i: usize) -> usize {
    i
}

/// Column of turbine `i`'s y coordinate in the flat design vector
#[inline]
pub fn y_index(i: usize, n_turbines: usize) -> usize {
    n_turbines + i
}

/// Ordered turbine positions. The turbine count is fixed for a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Layout {
    positions: Vec<Point>,
}

impl Layout {
    pub fn new(positions: Vec<Point>) -> Self {
        Self { positions }
    }

    /// Build from separate coordinate arrays (the shape turbine tables are
    /// usually exported in).
    pub fn from_xy(xs: &[f64], ys: &[f64]) -> WfloResult<Self> {
        if xs.len() != ys.len() {
            return Err(WfloError::input(format!(
                "coordinate arrays differ in length: {} x values, {} y values",
                xs.len(),
                ys.len()
            )));
        }
        Ok(Self {
            positions: xs.iter().zip(ys).map(|(&x, &y)| Point::new(x, y)).collect(),
        })
    }

    /// Rebuild a layout from a flat `[x.., y..]` design vector
    pub fn from_flat(flat: &[f64]) -> WfloResult<Self> {
        if flat.len() % 2 != 0 {
            return Err(WfloError::input(format!(
                "flat design vector has odd length {}",
                flat.len()
            )));
        }
        let n = flat.len() / 2;
        Self::from_xy(&flat[..n], &flat[n..])
    }

    /// Flatten into `[x_0 .. x_{N-1}, y_0 .. y_{N-1}]`
    pub fn to_flat(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(2 * self.positions.len());
        flat.extend(self.positions.iter().map(|p| p.x));
        flat.extend(self.positions.iter().map(|p| p.y));
        flat
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Point] {
        &self.positions
    }

    pub fn get(&self, i: usize) -> Option<&Point> {
        self.positions.get(i)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.positions.iter()
    }

    pub fn xs(&self) -> Vec<f64> {
        self.positions.iter().map(|p| p.x).collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.positions.iter().map(|p| p.y).collect()
    }

    /// Fails with an input error on an empty layout or any non-finite
    /// coordinate.
    pub fn validate(&self) -> WfloResult<()> {
        if self.positions.is_empty() {
            return Err(WfloError::input("layout contains no turbines"));
        }
        if let Some(i) = self.positions.iter().position(|p| !p.is_finite()) {
            return Err(WfloError::input(format!(
                "turbine {} has a non-finite coordinate",
                i
            )));
        }
        Ok(())
    }

    /// Smallest pairwise center distance, `None` for fewer than two turbines
    pub fn min_pairwise_distance(&self) -> Option<f64> {
        let n = self.positions.len();
        let mut best: Option<f64> = None;
        for i in 0..n {
            for j in (i + 1)..n {
                let d = self.positions[i].distance(&self.positions[j]);
                best = Some(best.map_or(d, |b| b.min(d)));
            }
        }
        best
    }
}

impl From<Vec<Point>> for Layout {
    fn from(positions: Vec<Point>) -> Self {
        Self::new(positions)
    }
}

impl FromIterator<Point> for Layout {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_layout_is_x_block_then_y_block() {
        let layout = Layout::new(vec![Point::new(1.0, 10.0), Point::new(2.0, 20.0)]);
        assert_eq!(layout.to_flat(), vec![1.0, 2.0, 10.0, 20.0]);
        assert_eq!(x_index(1), 1);
        assert_eq!(y_index(1, 2), 3);

        let back = Layout::from_flat(&layout.to_flat()).unwrap();
        assert_eq!(back, layout);
    }

    #[test]
    fn test_from_flat_rejects_odd_length() {
        let err = Layout::from_flat(&[1.0, 2.0, 3.0]).unwrap_err();
        assert!(matches!(err, WfloError::Input(_)));
    }

    #[test]
    fn test_validate_rejects_empty_and_nan() {
        assert!(Layout::default().validate().is_err());

        let layout = Layout::new(vec![Point::new(0.0, 0.0), Point::new(f64::NAN, 1.0)]);
        let err = layout.validate().unwrap_err();
        assert!(err.to_string().contains("turbine 1"));
    }

    #[test]
    fn test_min_pairwise_distance() {
        let layout = Layout::new(vec![
            Point::new(0.0, 0.0),
            Point::new(3.0, 4.0),
            Point::new(100.0, 0.0),
        ]);
        assert_eq!(layout.min_pairwise_distance(), Some(5.0));
        assert_eq!(Layout::new(vec![Point::new(0.0, 0.0)]).min_pairwise_distance(), None);
    }

    #[test]
    fn test_layout_serializes_as_point_list() {
        let layout = Layout::new(vec![Point::new(1.0, 2.0)]);
        let json = serde_json::to_string(&layout).unwrap();
        assert_eq!(json, r#"[{"x":1.0,"y":2.0}]"#);
    }
}
