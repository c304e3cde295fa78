//! Inverse Distance Weighting (IDW) interpolation
//!
//! Estimates values at target cells as a weighted average of nearby
//! observations, with weights inversely proportional to distance raised
//! to a power parameter. Serves both as a standalone method and as the
//! fallback when kriging fails.
//!
//! Two neighbor policies are supported: k-nearest (every cell resolves)
//! and radius-limited (cells with no neighbor in range fall back to the
//! population mean and are counted as defaulted).
//!
//! Reference:
//! Shepard, D. (1968). A two-dimensional interpolation function for
//! irregularly-spaced data. ACM National Conference.

use terrastat_core::{Error, ObservationSet, Result, Surface, NO_DATA};

use crate::maybe_rayon::*;

use super::grid::GridSpec;
use super::kdtree::KdTree;

/// Distances are clamped to this floor before weighting, so a target
/// coinciding with an observation reproduces the observed value.
const MIN_DISTANCE: f64 = 1e-12;

/// Neighbor selection policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IdwMode {
    /// Use the k nearest observations (ties break by index order).
    KNearest { k: usize },
    /// Use every observation within `search_radius`; cells with none get
    /// the population mean.
    RadiusLimited { search_radius: f64 },
}

/// Parameters for IDW interpolation.
#[derive(Debug, Clone)]
pub struct IdwParams {
    /// Power parameter; higher values weight near points more sharply
    pub power: f64,
    pub mode: IdwMode,
}

impl Default for IdwParams {
    fn default() -> Self {
        Self {
            power: 2.0,
            mode: IdwMode::KNearest { k: 12 },
        }
    }
}

/// Result of an IDW run over a grid.
#[derive(Debug)]
pub struct IdwOutput {
    pub values: Surface,
    /// Cells interpolated from at least one neighbor
    pub resolved_cells: usize,
    /// Cells left at the population mean (radius-limited mode only)
    pub defaulted_cells: usize,
}

fn validate(obs: &ObservationSet, params: &IdwParams) -> Result<()> {
    if obs.is_empty() {
        return Err(Error::InsufficientData {
            needed: 1,
            got: 0,
        });
    }
    if !params.power.is_finite() || params.power <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "power",
            value: params.power.to_string(),
            reason: "must be finite and positive".into(),
        });
    }
    match params.mode {
        IdwMode::KNearest { k } => {
            if k == 0 {
                return Err(Error::InvalidParameter {
                    name: "k",
                    value: "0".into(),
                    reason: "at least one neighbor is required".into(),
                });
            }
        }
        IdwMode::RadiusLimited { search_radius } => {
            if !search_radius.is_finite() || search_radius <= 0.0 {
                return Err(Error::InvalidParameter {
                    name: "search_radius",
                    value: search_radius.to_string(),
                    reason: "must be finite and positive".into(),
                });
            }
        }
    }
    Ok(())
}

/// Interpolate the observation set onto the target grid.
pub fn idw(obs: &ObservationSet, grid: &GridSpec, params: &IdwParams) -> Result<IdwOutput> {
    validate(obs, params)?;

    let tree = KdTree::build(obs.points());
    let mean = obs.mean();
    let power = params.power;
    let mode = params.mode;
    let (rows, cols) = (grid.height, grid.width);

    let cells: Vec<(f64, bool)> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![(NO_DATA, false); cols];
            for (col, slot) in row_data.iter_mut().enumerate() {
                let (x, y) = grid.cell_center(row, col);
                let neighbors = match mode {
                    IdwMode::KNearest { k } => tree.k_nearest(x, y, k.min(tree.len())),
                    IdwMode::RadiusLimited { search_radius } => {
                        tree.within_radius(x, y, search_radius)
                    }
                };

                if neighbors.is_empty() {
                    *slot = (mean, false);
                    continue;
                }

                let mut sum_w = 0.0;
                let mut sum_wz = 0.0;
                for n in &neighbors {
                    let d = n.distance().max(MIN_DISTANCE);
                    let w = 1.0 / d.powf(power);
                    sum_w += w;
                    sum_wz += w * tree.point(n.index).value;
                }
                *slot = (sum_wz / sum_w, true);
            }
            row_data
        })
        .collect();

    let resolved_cells = cells.iter().filter(|(_, ok)| *ok).count();
    let defaulted_cells = cells.len() - resolved_cells;

    let mut values = Surface::from_vec(cells.into_iter().map(|(v, _)| v).collect(), rows, cols)?;
    values.set_transform(grid.to_transform());

    Ok(IdwOutput {
        values,
        resolved_cells,
        defaulted_cells,
    })
}

/// Predict at a single location with the k-nearest policy.
pub fn idw_at(obs: &ObservationSet, x: f64, y: f64, k: usize, power: f64) -> Result<f64> {
    let params = IdwParams {
        power,
        mode: IdwMode::KNearest { k },
    };
    validate(obs, &params)?;

    let tree = KdTree::build(obs.points());
    let neighbors = tree.k_nearest(x, y, k.min(tree.len()));
    let mut sum_w = 0.0;
    let mut sum_wz = 0.0;
    for n in &neighbors {
        let d = n.distance().max(MIN_DISTANCE);
        let w = 1.0 / d.powf(power);
        sum_w += w;
        sum_wz += w * tree.point(n.index).value;
    }
    Ok(sum_wz / sum_w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use terrastat_core::SamplePoint;

    fn corner_obs() -> ObservationSet {
        ObservationSet::try_new(vec![
            SamplePoint::new(0.0, 0.0, 10.0),
            SamplePoint::new(10.0, 0.0, 20.0),
            SamplePoint::new(0.0, 10.0, 30.0),
            SamplePoint::new(10.0, 10.0, 40.0),
        ])
        .unwrap()
    }

    fn unit_grid() -> GridSpec {
        // 10x10 one-unit cells exactly covering (0,0)..(10,10)
        GridSpec::try_new(0.0, 10.0, 1.0, 10, 10).unwrap()
    }

    #[test]
    fn test_center_of_symmetric_square() {
        // Equidistant corners: exact average at the center
        let value = idw_at(&corner_obs(), 5.0, 5.0, 4, 2.0).unwrap();
        assert_relative_eq!(value, 25.0, epsilon = 1e-9);
    }

    #[test]
    fn test_reproduces_observation_at_own_coordinate() {
        let obs = corner_obs();
        for p in obs.points() {
            let value = idw_at(&obs, p.x, p.y, obs.len(), 2.0).unwrap();
            assert_relative_eq!(value, p.value, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_knn_grid_fully_resolved() {
        let out = idw(&corner_obs(), &unit_grid(), &IdwParams::default()).unwrap();
        assert_eq!(out.resolved_cells, 100);
        assert_eq!(out.defaulted_cells, 0);
        assert_eq!(out.values.finite_count(), 100);
    }

    #[test]
    fn test_radius_limited_defaults_far_cells() {
        let obs = corner_obs();
        let params = IdwParams {
            power: 2.0,
            mode: IdwMode::RadiusLimited {
                search_radius: 2.0,
            },
        };
        let out = idw(&obs, &unit_grid(), &params).unwrap();
        assert!(out.defaulted_cells > 0);
        assert!(out.resolved_cells > 0);

        // The grid center is farther than 2.0 from every corner and must
        // carry the population mean, not an interpolated value.
        let center = out.values.get(5, 5).unwrap();
        assert_relative_eq!(center, obs.mean(), epsilon = 1e-9);
    }

    #[test]
    fn test_higher_power_sharpens_falloff() {
        let obs = corner_obs();
        let grid = unit_grid();
        let low = idw(&obs, &grid, &IdwParams {
            power: 1.0,
            ..Default::default()
        })
        .unwrap();
        let high = idw(&obs, &grid, &IdwParams {
            power: 4.0,
            ..Default::default()
        })
        .unwrap();

        // Cell (9,0) centers at (0.5, 0.5), nearest to the 10.0 corner
        let near_low = low.values.get(9, 0).unwrap();
        let near_high = high.values.get(9, 0).unwrap();
        assert!((near_high - 10.0).abs() <= (near_low - 10.0).abs() + 1e-9);
    }

    #[test]
    fn test_invalid_power() {
        let result = idw(&corner_obs(), &unit_grid(), &IdwParams {
            power: 0.0,
            ..Default::default()
        });
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn test_invalid_radius() {
        let params = IdwParams {
            power: 2.0,
            mode: IdwMode::RadiusLimited {
                search_radius: f64::NAN,
            },
        };
        assert!(matches!(
            idw(&corner_obs(), &unit_grid(), &params),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
