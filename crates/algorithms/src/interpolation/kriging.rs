//! Ordinary kriging interpolation
//!
//! Predicts each target cell from its neighboring observations by solving
//! the ordinary kriging system: semivariogram-derived weights constrained
//! to sum to one through a Lagrange multiplier. Alongside each estimate
//! the kriging variance is available as a per-cell uncertainty measure.
//!
//! Cells whose local system turns out singular (duplicate or collinear
//! neighbors) fall back to inverse-distance weights over the same
//! neighborhood rather than failing the whole run.
//!
//! Reference:
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.

use log::{debug, warn};
use terrastat_core::{Error, ObservationSet, Result, Surface, NO_DATA};

use crate::maybe_rayon::*;

use super::grid::GridSpec;
use super::kdtree::{KdTree, Neighbor};
use super::variogram::FittedVariogram;

/// Squared distance below which a target is treated as coincident with an
/// observation and reproduces it exactly.
const SNAP_DISTANCE_SQ: f64 = 1e-24;

/// Pivot threshold for the Gaussian elimination.
const SINGULARITY_EPS: f64 = 1e-10;

/// Post-processing policy for kriged estimates.
///
/// Kriging weights can be negative, so estimates may overshoot the
/// observed value range. The default keeps the raw estimates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ClampPolicy {
    #[default]
    None,
    /// Clamp estimates into the observed range widened by
    /// `tolerance_frac` of the range span on each side.
    ObservedRange { tolerance_frac: f64 },
}

/// Parameters for ordinary kriging.
#[derive(Debug, Clone)]
pub struct KrigingParams {
    /// Neighbors per target cell
    pub max_neighbors: usize,
    /// Optional search radius; cells with no observation in range default
    /// to the population mean
    pub search_radius: Option<f64>,
    /// Produce the kriging variance surface alongside the estimates
    pub compute_variance: bool,
    pub clamp: ClampPolicy,
}

impl Default for KrigingParams {
    fn default() -> Self {
        Self {
            max_neighbors: 16,
            search_radius: None,
            compute_variance: true,
            clamp: ClampPolicy::None,
        }
    }
}

/// Result of a kriging run over a grid.
#[derive(Debug)]
pub struct KrigingOutput {
    pub values: Surface,
    /// Kriging variance per cell, when requested
    pub variance: Option<Surface>,
    /// Cells predicted by solving the kriging system
    pub resolved_cells: usize,
    /// Cells left at the population mean for lack of neighbors in range
    pub defaulted_cells: usize,
    /// Cells whose system was singular and used IDW weights instead
    pub fallback_cells: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CellStatus {
    Resolved,
    Defaulted,
    Fallback,
}

fn validate(obs: &ObservationSet, params: &KrigingParams) -> Result<()> {
    if params.max_neighbors < 2 {
        return Err(Error::InvalidParameter {
            name: "max_neighbors",
            value: params.max_neighbors.to_string(),
            reason: "kriging needs at least two neighbors".into(),
        });
    }
    if let Some(r) = params.search_radius {
        if !r.is_finite() || r <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "search_radius",
                value: r.to_string(),
                reason: "must be finite and positive".into(),
            });
        }
    }
    if let ClampPolicy::ObservedRange { tolerance_frac } = params.clamp {
        if !tolerance_frac.is_finite() || tolerance_frac < 0.0 {
            return Err(Error::InvalidParameter {
                name: "tolerance_frac",
                value: tolerance_frac.to_string(),
                reason: "must be finite and non-negative".into(),
            });
        }
    }
    if obs.len() < terrastat_core::MIN_OBSERVATIONS {
        return Err(Error::InsufficientData {
            needed: terrastat_core::MIN_OBSERVATIONS,
            got: obs.len(),
        });
    }
    Ok(())
}

/// Interpolate the observation set onto the target grid.
pub fn ordinary_kriging(
    obs: &ObservationSet,
    variogram: &FittedVariogram,
    grid: &GridSpec,
    params: &KrigingParams,
) -> Result<KrigingOutput> {
    validate(obs, params)?;

    let tree = KdTree::build(obs.points());
    let mean = obs.mean();
    let (rows, cols) = (grid.height, grid.width);
    let total = grid.cells();
    let batch = batch_size(obs.len(), total);
    debug!(
        "kriging {} cells over {} observations, batch size {}",
        total,
        obs.len(),
        batch
    );

    let clamp_range = clamp_bounds(obs, params.clamp);

    let mut cells: Vec<(f64, f64, CellStatus)> = Vec::with_capacity(total);
    let mut start = 0;
    while start < total {
        let end = (start + batch).min(total);
        let chunk: Vec<(f64, f64, CellStatus)> = (start..end)
            .into_par_iter()
            .map(|idx| {
                let (row, col) = (idx / cols, idx % cols);
                let (x, y) = grid.cell_center(row, col);
                predict_cell(&tree, variogram, x, y, params, mean, clamp_range)
            })
            .collect();
        cells.extend(chunk);
        start = end;
    }

    let resolved_cells = cells
        .iter()
        .filter(|(_, _, s)| *s == CellStatus::Resolved)
        .count();
    let defaulted_cells = cells
        .iter()
        .filter(|(_, _, s)| *s == CellStatus::Defaulted)
        .count();
    let fallback_cells = total - resolved_cells - defaulted_cells;

    if fallback_cells > 0 && resolved_cells == 0 {
        return Err(Error::NumericalFailure(
            "kriging system singular at every target cell".into(),
        ));
    }
    if fallback_cells > 0 {
        warn!(
            "{} of {} cells used inverse-distance weights after a singular kriging system",
            fallback_cells, total
        );
    }

    let mut values = Surface::from_vec(cells.iter().map(|(v, _, _)| *v).collect(), rows, cols)?;
    values.set_transform(grid.to_transform());

    let variance = if params.compute_variance {
        let mut var = Surface::from_vec(cells.iter().map(|(_, v, _)| *v).collect(), rows, cols)?;
        var.set_transform(grid.to_transform());
        Some(var)
    } else {
        None
    };

    Ok(KrigingOutput {
        values,
        variance,
        resolved_cells,
        defaulted_cells,
        fallback_cells,
    })
}

/// Kriging prediction at a single location. Used by cross-validation.
///
/// Returns `(estimate, variance)`. Errors with [`Error::NoValidNeighbors`]
/// when the radius excludes every observation and with
/// [`Error::NumericalFailure`] when the local system is singular.
pub fn predict_point(
    tree: &KdTree,
    variogram: &FittedVariogram,
    x: f64,
    y: f64,
    max_neighbors: usize,
    search_radius: Option<f64>,
) -> Result<(f64, f64)> {
    let neighbors = gather_neighbors(tree, x, y, max_neighbors, search_radius);
    if neighbors.is_empty() {
        return Err(Error::NoValidNeighbors);
    }
    if neighbors[0].distance_sq < SNAP_DISTANCE_SQ {
        return Ok((tree.point(neighbors[0].index).value, 0.0));
    }
    let weights = kriging_weights(tree, &neighbors, variogram)?;
    Ok(weighted_estimate(tree, &neighbors, &weights, variogram))
}

fn gather_neighbors(
    tree: &KdTree,
    x: f64,
    y: f64,
    max_neighbors: usize,
    search_radius: Option<f64>,
) -> Vec<Neighbor> {
    match search_radius {
        Some(r) => {
            let mut n = tree.within_radius(x, y, r);
            n.truncate(max_neighbors);
            n
        }
        None => tree.k_nearest(x, y, max_neighbors.min(tree.len())),
    }
}

fn predict_cell(
    tree: &KdTree,
    variogram: &FittedVariogram,
    x: f64,
    y: f64,
    params: &KrigingParams,
    mean: f64,
    clamp_range: Option<(f64, f64)>,
) -> (f64, f64, CellStatus) {
    let neighbors = gather_neighbors(tree, x, y, params.max_neighbors, params.search_radius);
    if neighbors.is_empty() {
        return (mean, NO_DATA, CellStatus::Defaulted);
    }
    if neighbors[0].distance_sq < SNAP_DISTANCE_SQ {
        let v = tree.point(neighbors[0].index).value;
        return (apply_clamp(v, clamp_range), 0.0, CellStatus::Resolved);
    }

    match kriging_weights(tree, &neighbors, variogram) {
        Ok(weights) => {
            let (est, var) = weighted_estimate(tree, &neighbors, &weights, variogram);
            (apply_clamp(est, clamp_range), var, CellStatus::Resolved)
        }
        Err(_) => {
            // Singular local system, usually duplicate neighbor locations
            let est = idw_estimate(tree, &neighbors);
            (apply_clamp(est, clamp_range), NO_DATA, CellStatus::Fallback)
        }
    }
}

/// Solve the ordinary kriging system for one target. Returns the `k + 1`
/// solution vector: `k` weights followed by the Lagrange multiplier.
fn kriging_weights(
    tree: &KdTree,
    neighbors: &[Neighbor],
    variogram: &FittedVariogram,
) -> Result<Vec<f64>> {
    let k = neighbors.len();
    let n = k + 1;

    // Row-major augmented system: semivariances between neighbors, a unit
    // row and column for the unbiasedness constraint.
    let mut mat = vec![0.0; n * n];
    let mut rhs = vec![0.0; n];
    for (i, ni) in neighbors.iter().enumerate() {
        let pi = tree.point(ni.index);
        for (j, nj) in neighbors.iter().enumerate().skip(i + 1) {
            let pj = tree.point(nj.index);
            let gamma = variogram.evaluate(pi.dist(pj.x, pj.y));
            mat[i * n + j] = gamma;
            mat[j * n + i] = gamma;
        }
        mat[i * n + k] = 1.0;
        mat[k * n + i] = 1.0;
        rhs[i] = variogram.evaluate(ni.distance());
    }
    rhs[k] = 1.0;

    solve(n, &mut mat, &mut rhs)?;
    Ok(rhs)
}

fn weighted_estimate(
    tree: &KdTree,
    neighbors: &[Neighbor],
    weights: &[f64],
    variogram: &FittedVariogram,
) -> (f64, f64) {
    let k = neighbors.len();
    let mut est = 0.0;
    let mut var = weights[k];
    for (i, nb) in neighbors.iter().enumerate() {
        est += weights[i] * tree.point(nb.index).value;
        var += weights[i] * variogram.evaluate(nb.distance());
    }
    (est, var.max(0.0))
}

fn idw_estimate(tree: &KdTree, neighbors: &[Neighbor]) -> f64 {
    let mut sum_w = 0.0;
    let mut sum_wz = 0.0;
    for n in neighbors {
        let d = n.distance().max(1e-12);
        let w = 1.0 / (d * d);
        sum_w += w;
        sum_wz += w * tree.point(n.index).value;
    }
    sum_wz / sum_w
}

fn clamp_bounds(obs: &ObservationSet, clamp: ClampPolicy) -> Option<(f64, f64)> {
    match clamp {
        ClampPolicy::None => None,
        ClampPolicy::ObservedRange { tolerance_frac } => {
            let (lo, hi) = obs.value_range();
            let slack = (hi - lo) * tolerance_frac;
            Some((lo - slack, hi + slack))
        }
    }
}

fn apply_clamp(value: f64, range: Option<(f64, f64)>) -> f64 {
    match range {
        Some((lo, hi)) => value.clamp(lo, hi),
        None => value,
    }
}

/// Gaussian elimination with partial pivoting, in place. `mat` is the
/// row-major `n x n` matrix and `rhs` holds the solution on return.
fn solve(n: usize, mat: &mut [f64], rhs: &mut [f64]) -> Result<()> {
    for col in 0..n {
        let mut pivot = col;
        let mut best = mat[col * n + col].abs();
        for row in col + 1..n {
            let v = mat[row * n + col].abs();
            if v > best {
                best = v;
                pivot = row;
            }
        }
        if best < SINGULARITY_EPS {
            return Err(Error::NumericalFailure(
                "singular kriging matrix".into(),
            ));
        }
        if pivot != col {
            for j in 0..n {
                mat.swap(col * n + j, pivot * n + j);
            }
            rhs.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = mat[row * n + col] / mat[col * n + col];
            if factor == 0.0 {
                continue;
            }
            for j in col..n {
                mat[row * n + j] -= factor * mat[col * n + j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }
    for col in (0..n).rev() {
        let mut acc = rhs[col];
        for j in col + 1..n {
            acc -= mat[col * n + j] * rhs[j];
        }
        rhs[col] = acc / mat[col * n + col];
    }
    Ok(())
}

/// Batch size for grid traversal, scaled down as the observation count
/// grows so each solve-heavy chunk stays responsive.
fn batch_size(n_obs: usize, cells: usize) -> usize {
    let b = if n_obs > 500 {
        (cells / 10).min(5000)
    } else if n_obs > 100 {
        (cells / 5).min(10000)
    } else {
        cells
    };
    b.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use terrastat_core::SamplePoint;

    use crate::interpolation::variogram::{FittedVariogram, VariogramModelKind};

    fn spherical(sill: f64, range: f64) -> FittedVariogram {
        FittedVariogram {
            kind: VariogramModelKind::Spherical,
            sill,
            range,
            nugget: 0.0,
            r_squared: 1.0,
            rss: 0.0,
        }
    }

    fn corner_obs() -> ObservationSet {
        ObservationSet::try_new(vec![
            SamplePoint::new(0.0, 0.0, 10.0),
            SamplePoint::new(10.0, 0.0, 20.0),
            SamplePoint::new(0.0, 10.0, 30.0),
            SamplePoint::new(10.0, 10.0, 40.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_weights_sum_to_one() {
        let obs = corner_obs();
        let tree = KdTree::build(obs.points());
        let vg = spherical(100.0, 20.0);
        let neighbors = tree.k_nearest(3.0, 4.0, 4);
        let weights = kriging_weights(&tree, &neighbors, &vg).unwrap();
        let sum: f64 = weights[..neighbors.len()].iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_exact_at_observation() {
        let obs = corner_obs();
        let tree = KdTree::build(obs.points());
        let vg = spherical(100.0, 20.0);
        let (est, var) = predict_point(&tree, &vg, 0.0, 0.0, 4, None).unwrap();
        assert_relative_eq!(est, 10.0);
        assert_relative_eq!(var, 0.0);
    }

    #[test]
    fn test_symmetric_center() {
        // Equidistant corners share one weight, so the estimate is the mean
        let obs = corner_obs();
        let tree = KdTree::build(obs.points());
        let vg = spherical(100.0, 20.0);
        let (est, var) = predict_point(&tree, &vg, 5.0, 5.0, 4, None).unwrap();
        assert_relative_eq!(est, 25.0, epsilon = 1e-9);
        assert!(var > 0.0);
    }

    #[test]
    fn test_grid_run_counts_and_variance() {
        let obs = corner_obs();
        let vg = spherical(100.0, 20.0);
        let grid = GridSpec::try_new(0.0, 10.0, 2.0, 5, 5).unwrap();
        let out = ordinary_kriging(&obs, &vg, &grid, &KrigingParams::default()).unwrap();
        assert_eq!(out.resolved_cells, 25);
        assert_eq!(out.defaulted_cells, 0);
        assert_eq!(out.fallback_cells, 0);
        let var = out.variance.unwrap();
        for &v in var.data().iter() {
            assert!(v.is_finite() && v >= 0.0);
        }
    }

    #[test]
    fn test_variance_disabled() {
        let obs = corner_obs();
        let vg = spherical(100.0, 20.0);
        let grid = GridSpec::try_new(0.0, 10.0, 5.0, 2, 2).unwrap();
        let params = KrigingParams {
            compute_variance: false,
            ..Default::default()
        };
        let out = ordinary_kriging(&obs, &vg, &grid, &params).unwrap();
        assert!(out.variance.is_none());
    }

    #[test]
    fn test_radius_limited_defaults_to_mean() {
        let obs = corner_obs();
        let vg = spherical(100.0, 20.0);
        // Grid shifted far away from every observation
        let grid = GridSpec::try_new(1000.0, 1010.0, 2.0, 3, 3).unwrap();
        let params = KrigingParams {
            search_radius: Some(5.0),
            ..Default::default()
        };
        let out = ordinary_kriging(&obs, &vg, &grid, &params).unwrap();
        assert_eq!(out.defaulted_cells, 9);
        assert_relative_eq!(out.values.get(0, 0).unwrap(), obs.mean());
        assert!(out.variance.unwrap().get(0, 0).unwrap().is_nan());
    }

    #[test]
    fn test_clamp_observed_range() {
        let obs = corner_obs();
        let vg = spherical(100.0, 20.0);
        let grid = GridSpec::from_observations(&obs, Some(1.0), 0.5).unwrap();
        let params = KrigingParams {
            clamp: ClampPolicy::ObservedRange {
                tolerance_frac: 0.0,
            },
            ..Default::default()
        };
        let out = ordinary_kriging(&obs, &vg, &grid, &params).unwrap();
        for &v in out.values.data().iter() {
            assert!(v >= 10.0 - 1e-9 && v <= 40.0 + 1e-9);
        }
    }

    #[test]
    fn test_duplicate_points_fall_back() {
        // Two identical neighbor locations make the system singular
        let obs = ObservationSet::try_new(vec![
            SamplePoint::new(0.0, 0.0, 10.0),
            SamplePoint::new(0.0, 0.0, 12.0),
            SamplePoint::new(10.0, 10.0, 20.0),
        ])
        .unwrap();
        let vg = spherical(50.0, 15.0);
        let tree = KdTree::build(obs.points());
        let result = predict_point(&tree, &vg, 5.0, 5.0, 3, None);
        assert!(matches!(result, Err(Error::NumericalFailure(_))));

        // A grid where every cell is singular reports a numerical failure
        let grid = GridSpec::try_new(4.0, 6.0, 2.0, 1, 1).unwrap();
        let out = ordinary_kriging(&obs, &vg, &grid, &KrigingParams::default());
        assert!(matches!(out, Err(Error::NumericalFailure(_))));
    }

    #[test]
    fn test_minimum_observation_count() {
        // three points is the accepted minimum
        let obs = ObservationSet::from_coords_values(
            &[(0.0, 0.0), (1.0, 2.0), (2.0, 0.5)],
            &[1.0, 2.0, 3.0],
        )
        .unwrap();
        let vg = spherical(10.0, 5.0);
        let grid = GridSpec::try_new(0.0, 2.0, 1.0, 2, 2).unwrap();
        assert!(ordinary_kriging(&obs, &vg, &grid, &KrigingParams::default()).is_ok());
    }

    #[test]
    fn test_batch_size_tiers() {
        assert_eq!(batch_size(50, 1000), 1000);
        assert_eq!(batch_size(200, 100_000), 10_000);
        assert_eq!(batch_size(200, 20_000), 4000);
        assert_eq!(batch_size(600, 100_000), 5000);
        assert_eq!(batch_size(600, 30_000), 3000);
        assert_eq!(batch_size(600, 5), 1);
    }

    #[test]
    fn test_solve_known_system() {
        // 2x + y = 5, x + 3y = 10 -> x = 1, y = 3
        let mut mat = vec![2.0, 1.0, 1.0, 3.0];
        let mut rhs = vec![5.0, 10.0];
        solve(2, &mut mat, &mut rhs).unwrap();
        assert_relative_eq!(rhs[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(rhs[1], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_singular() {
        let mut mat = vec![1.0, 2.0, 2.0, 4.0];
        let mut rhs = vec![3.0, 6.0];
        assert!(matches!(
            solve(2, &mut mat, &mut rhs),
            Err(Error::NumericalFailure(_))
        ));
    }
}
