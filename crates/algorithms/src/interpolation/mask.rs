//! Area-of-interest masking
//!
//! Restricts a prediction surface to a polygon, by default the convex
//! hull of the observations. The mask is rasterized once against the
//! target grid by cell-center containment; applying it sets outside
//! cells to the no-data sentinel and leaves inside cells untouched.

use geo::{Contains, ConvexHull, MultiPoint, Point, Polygon};
use ndarray::Array2;
use terrastat_core::{Error, ObservationSet, Result, Surface, NO_DATA};

use super::grid::GridSpec;

/// Boolean validity raster aligned to a [`GridSpec`].
#[derive(Debug, Clone)]
pub struct AreaMask {
    inside: Array2<bool>,
}

impl AreaMask {
    /// Mask covering the convex hull of the observations.
    pub fn convex_hull(obs: &ObservationSet, grid: &GridSpec) -> Result<Self> {
        if obs.len() < 3 {
            return Err(Error::InsufficientData {
                needed: 3,
                got: obs.len(),
            });
        }
        let points: MultiPoint<f64> = obs
            .points()
            .iter()
            .map(|p| Point::new(p.x, p.y))
            .collect::<Vec<_>>()
            .into();
        let hull = points.convex_hull();
        Ok(Self::from_polygon(&hull, grid))
    }

    /// Mask from an arbitrary polygon. Containment is tested at cell
    /// centers; centers on the boundary count as outside.
    pub fn from_polygon(polygon: &Polygon<f64>, grid: &GridSpec) -> Self {
        let inside = Array2::from_shape_fn((grid.height, grid.width), |(row, col)| {
            let (x, y) = grid.cell_center(row, col);
            polygon.contains(&Point::new(x, y))
        });
        Self { inside }
    }

    /// Cells the mask keeps.
    pub fn inside_count(&self) -> usize {
        self.inside.iter().filter(|&&b| b).count()
    }

    pub fn dims(&self) -> (usize, usize) {
        self.inside.dim()
    }

    /// Set cells outside the mask to no-data. Returns the number of
    /// cells masked out; inside cells are not touched, so applying the
    /// mask twice is a no-op the second time around values already set.
    pub fn apply(&self, surface: &mut Surface) -> Result<usize> {
        let (rows, cols) = self.inside.dim();
        if surface.data().dim() != (rows, cols) {
            let (w, h) = (surface.data().dim().1, surface.data().dim().0);
            return Err(Error::InvalidDimensions { width: w, height: h });
        }
        let mut masked = 0;
        let data = surface.data_mut();
        for ((row, col), keep) in self.inside.indexed_iter() {
            if !keep {
                data[[row, col]] = NO_DATA;
                masked += 1;
            }
        }
        Ok(masked)
    }
}
