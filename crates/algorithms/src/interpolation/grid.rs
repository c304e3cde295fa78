//! Target grid construction
//!
//! Builds the regular prediction grid covering the padded bounding box of
//! the observations. Row 0 sits at the maximum y; predictors receive cell
//! centers, not corners.

use serde::Serialize;
use terrastat_core::{Error, GeoTransform, ObservationSet, Result};

use super::kdtree::KdTree;

/// Regular target grid specification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridSpec {
    /// X of the upper-left grid corner
    pub origin_x: f64,
    /// Y of the upper-left grid corner (maximum y)
    pub origin_y: f64,
    pub cell_size: f64,
    pub width: usize,
    pub height: usize,
}

impl GridSpec {
    pub fn try_new(
        origin_x: f64,
        origin_y: f64,
        cell_size: f64,
        width: usize,
        height: usize,
    ) -> Result<Self> {
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "cell_size",
                value: cell_size.to_string(),
                reason: "must be finite and positive".into(),
            });
        }
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        Ok(Self {
            origin_x,
            origin_y,
            cell_size,
            width,
            height,
        })
    }

    /// Grid covering the observation extent plus a padding margin.
    ///
    /// `cell_size` is used as given when provided, otherwise estimated
    /// from the point spacing (see [`estimate_cell_size`]). The padding
    /// is `max(cell_size, pad_mult · cell_size)`, so at least one cell.
    pub fn from_observations(
        obs: &ObservationSet,
        cell_size: Option<f64>,
        pad_mult: f64,
    ) -> Result<Self> {
        if !pad_mult.is_finite() || pad_mult < 0.0 {
            return Err(Error::InvalidParameter {
                name: "pad_mult",
                value: pad_mult.to_string(),
                reason: "must be finite and non-negative".into(),
            });
        }
        let cell = match cell_size {
            Some(c) => {
                if !c.is_finite() || c <= 0.0 {
                    return Err(Error::InvalidParameter {
                        name: "cell_size",
                        value: c.to_string(),
                        reason: "must be finite and positive".into(),
                    });
                }
                c
            }
            None => estimate_cell_size(obs),
        };

        let pad = cell.max(cell * pad_mult);
        let (min_x, min_y, max_x, max_y) = obs.bounds();
        let width = ((max_x - min_x + 2.0 * pad) / cell).ceil().max(1.0) as usize;
        let height = ((max_y - min_y + 2.0 * pad) / cell).ceil().max(1.0) as usize;

        Self::try_new(min_x - pad, max_y + pad, cell, width, height)
    }

    pub fn cells(&self) -> usize {
        self.width * self.height
    }

    /// Map coordinates of the center of cell (row, col).
    pub fn cell_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.cell_size,
            self.origin_y - (row as f64 + 0.5) * self.cell_size,
        )
    }

    pub fn to_transform(&self) -> GeoTransform {
        GeoTransform::new(self.origin_x, self.origin_y, self.cell_size, -self.cell_size)
    }

    /// (min_x, min_y, max_x, max_y) covered by the grid.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.to_transform().bounds(self.width, self.height)
    }
}

/// Cell size heuristic: median nearest-neighbor distance / 4, floored at
/// one distance unit. Falls back to 10.0 / 4 spacing when the point
/// pattern is degenerate (all co-located).
pub fn estimate_cell_size(obs: &ObservationSet) -> f64 {
    let tree = KdTree::build(obs.points());
    let mut nn: Vec<f64> = obs
        .points()
        .iter()
        .filter_map(|p| {
            // k=2: the point itself plus its nearest neighbor
            tree.k_nearest(p.x, p.y, 2)
                .get(1)
                .map(|n| n.distance())
        })
        .collect();
    nn.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let median = if nn.is_empty() {
        f64::NAN
    } else if nn.len() % 2 == 1 {
        nn[nn.len() / 2]
    } else {
        (nn[nn.len() / 2 - 1] + nn[nn.len() / 2]) / 2.0
    };

    let median = if median.is_finite() && median > 0.0 {
        median
    } else {
        10.0
    };
    (median / 4.0).max(1.0)
}
