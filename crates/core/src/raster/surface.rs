//! Dense prediction surface

use crate::error::{Error, Result};
use crate::raster::GeoTransform;
use ndarray::{Array2, ArrayView2};

/// No-data sentinel used throughout the engine. A cell that was masked
/// out or could not be resolved carries NaN, never a numeric zero.
pub const NO_DATA: f64 = f64::NAN;

/// A georeferenced 2-D grid of f64 values.
///
/// Row 0 is the topmost (maximum-y) row; columns increase in x.
/// Unresolved cells hold [`NO_DATA`].
#[derive(Debug, Clone)]
pub struct Surface {
    data: Array2<f64>,
    transform: GeoTransform,
}

impl Surface {
    /// Create a surface filled with a constant value.
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            data: Array2::from_elem((rows, cols), value),
            transform: GeoTransform::default(),
        }
    }

    /// Create a surface of no-data cells.
    pub fn empty(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, NO_DATA)
    }

    /// Create a surface from row-major data.
    pub fn from_vec(data: Vec<f64>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self {
            data: array,
            transform: GeoTransform::default(),
        })
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get value at (row, col).
    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col).
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        let (rows, cols) = self.data.dim();
        self.data
            .get_mut((row, col))
            .map(|v| *v = value)
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows,
                cols,
            })
    }

    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn data_mut(&mut self) -> &mut Array2<f64> {
        &mut self.data
    }

    pub fn transform(&self) -> GeoTransform {
        self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Count of cells holding a finite value.
    pub fn finite_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_finite()).count()
    }

    /// (min, max) over finite cells, or None if all cells are no-data.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        let mut range: Option<(f64, f64)> = None;
        for &v in self.data.iter() {
            if v.is_finite() {
                range = Some(match range {
                    Some((lo, hi)) => (lo.min(v), hi.max(v)),
                    None => (v, v),
                });
            }
        }
        range
    }
}
