//! Point observations feeding the interpolation engine

use crate::error::{Error, Result};

/// Minimum number of valid observations for any interpolation method.
pub const MIN_OBSERVATIONS: usize = 3;

/// Recommended minimum for variogram-based methods; below this the engine
/// degrades kriging requests to IDW.
pub const MIN_VARIOGRAM_OBSERVATIONS: usize = 6;

/// A sample point with planar coordinates and a measured value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

impl SamplePoint {
    pub fn new(x: f64, y: f64, value: f64) -> Self {
        Self { x, y, value }
    }

    /// Squared Euclidean distance to (other_x, other_y)
    #[inline]
    pub fn dist_sq(&self, other_x: f64, other_y: f64) -> f64 {
        let dx = self.x - other_x;
        let dy = self.y - other_y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to (other_x, other_y)
    #[inline]
    pub fn dist(&self, other_x: f64, other_y: f64) -> f64 {
        self.dist_sq(other_x, other_y).sqrt()
    }
}

/// An immutable, ordered collection of valid sample points.
///
/// Construction filters out points with non-finite coordinates or values;
/// fewer than [`MIN_OBSERVATIONS`] survivors is an error. The set is
/// read-only for the lifetime of an interpolation run.
#[derive(Debug, Clone)]
pub struct ObservationSet {
    points: Vec<SamplePoint>,
}

impl ObservationSet {
    /// Build from pre-validated points.
    pub fn try_new(points: Vec<SamplePoint>) -> Result<Self> {
        let valid: Vec<SamplePoint> = points
            .into_iter()
            .filter(|p| p.x.is_finite() && p.y.is_finite() && p.value.is_finite())
            .collect();
        if valid.len() < MIN_OBSERVATIONS {
            return Err(Error::InsufficientData {
                needed: MIN_OBSERVATIONS,
                got: valid.len(),
            });
        }
        Ok(Self { points: valid })
    }

    /// Build from parallel coordinate and value slices, skipping entries
    /// whose value is missing (NaN) or whose coordinates are not finite.
    pub fn from_coords_values(coords: &[(f64, f64)], values: &[f64]) -> Result<Self> {
        if coords.len() != values.len() {
            return Err(Error::InvalidParameter {
                name: "values",
                value: values.len().to_string(),
                reason: format!("expected {} entries to match coordinates", coords.len()),
            });
        }
        let points = coords
            .iter()
            .zip(values.iter())
            .map(|(&(x, y), &v)| SamplePoint::new(x, y, v))
            .collect();
        Self::try_new(points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[SamplePoint] {
        &self.points
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.value)
    }

    /// Arithmetic mean of the observed values.
    pub fn mean(&self) -> f64 {
        self.values().sum::<f64>() / self.len() as f64
    }

    /// Population variance of the observed values.
    pub fn variance(&self) -> f64 {
        let mean = self.mean();
        self.values().map(|v| (v - mean) * (v - mean)).sum::<f64>() / self.len() as f64
    }

    /// (min, max) of the observed values.
    pub fn value_range(&self) -> (f64, f64) {
        let mut lo = f64::MAX;
        let mut hi = f64::MIN;
        for v in self.values() {
            lo = lo.min(v);
            hi = hi.max(v);
        }
        (lo, hi)
    }

    /// Bounding box (min_x, min_y, max_x, max_y) of the point positions.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        (min_x, min_y, max_x, max_y)
    }

    /// Maximum pairwise distance between observations.
    pub fn max_pairwise_distance(&self) -> f64 {
        let n = self.points.len();
        let mut max = 0.0_f64;
        for i in 0..n {
            for j in (i + 1)..n {
                let d = self.points[i].dist(self.points[j].x, self.points[j].y);
                if d > max {
                    max = d;
                }
            }
        }
        max
    }

    /// New set with the point at `index` removed. Used by leave-one-out
    /// cross-validation; bypasses the minimum-count check deliberately.
    pub fn without(&self, index: usize) -> Self {
        let points = self
            .points
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, p)| *p)
            .collect();
        Self { points }
    }
}
