//! Automatic variogram model selection
//!
//! Two strategies for choosing the variogram model (and its parameters)
//! that drives kriging:
//!
//! - leave-one-out cross-validation: krige each held-out observation
//!   under every candidate shape and keep the shape with the lowest
//!   prediction RMSE. O(n²) per fold, meant for observation sets in the
//!   hundreds.
//! - goodness-of-fit heuristic: fit every shape to one empirical
//!   variogram, keep the best R², and derive Gaussian-process style
//!   parameters from the fitted sill and range.

use log::{debug, warn};
use serde::Serialize;
use terrastat_core::{Error, ObservationSet, Result, MIN_VARIOGRAM_OBSERVATIONS};

use crate::maybe_rayon::*;

use super::kdtree::KdTree;
use super::kriging::predict_point;
use super::variogram::{
    default_spherical, empirical_variogram, fit_model, EmpiricalVariogram, FittedVariogram,
    NuggetMode, VariogramModelKind, VariogramParams,
};

/// Configuration shared by both selection strategies.
#[derive(Debug, Clone)]
pub struct SelectionConfig {
    pub nugget_mode: NuggetMode,
    /// Neighbors used when kriging held-out points
    pub max_neighbors: usize,
    /// Fraction of the maximum pairwise distance used as the variogram
    /// cutoff for the final refit after cross-validation
    pub max_distance_factor: f64,
    /// Pairwise-distance percentile bounding the variogram inside each
    /// cross-validation fold
    pub fold_percentile: f64,
    pub variogram: VariogramParams,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            nugget_mode: NuggetMode::Zero,
            max_neighbors: 16,
            max_distance_factor: 0.6,
            fold_percentile: 0.95,
            variogram: VariogramParams::default(),
        }
    }
}

/// Cross-validation summary for one candidate shape.
#[derive(Debug, Clone, Serialize)]
pub struct CrossValidationScore {
    pub kind: VariogramModelKind,
    pub rmse: f64,
    pub mae: f64,
    pub mean_bias: f64,
    /// Folds that produced a prediction
    pub folds: usize,
}

/// Outcome of model selection.
#[derive(Debug, Clone, Serialize)]
pub struct SelectedModel {
    pub model: FittedVariogram,
    /// Fit quality in [0, 1]
    pub quality: f64,
    /// Per-candidate scores; empty for the heuristic strategy
    pub scores: Vec<CrossValidationScore>,
}

/// Gaussian-process style parameters derived from a fitted variogram.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GpParameters {
    pub length_scale: f64,
    pub noise_level: f64,
    pub amplitude: f64,
}

fn validate(obs: &ObservationSet, cfg: &SelectionConfig) -> Result<()> {
    if obs.len() < MIN_VARIOGRAM_OBSERVATIONS {
        return Err(Error::InsufficientData {
            needed: MIN_VARIOGRAM_OBSERVATIONS,
            got: obs.len(),
        });
    }
    if !cfg.max_distance_factor.is_finite() || cfg.max_distance_factor <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "max_distance_factor",
            value: cfg.max_distance_factor.to_string(),
            reason: "must be finite and positive".into(),
        });
    }
    if !(0.0..=1.0).contains(&cfg.fold_percentile) {
        return Err(Error::InvalidParameter {
            name: "fold_percentile",
            value: cfg.fold_percentile.to_string(),
            reason: "must lie in [0, 1]".into(),
        });
    }
    Ok(())
}

/// Select the model shape by leave-one-out cross-validation.
///
/// Every candidate shape is scored by kriging each held-out observation
/// from the remaining ones; the shape with the lowest RMSE wins, ties
/// resolving in declaration order. The winner is refit once against all
/// observations with the `max_distance_factor` cutoff.
pub fn select_by_cross_validation(
    obs: &ObservationSet,
    cfg: &SelectionConfig,
) -> Result<SelectedModel> {
    validate(obs, cfg)?;
    let n = obs.len();

    let mut scores = Vec::with_capacity(VariogramModelKind::ALL.len());
    for kind in VariogramModelKind::ALL {
        let errors: Vec<f64> = (0..n)
            .into_par_iter()
            .filter_map(|held_out| loo_error(obs, held_out, kind, cfg))
            .collect();
        // A candidate that barely ever predicts carries no evidence
        if errors.len() < n / 2 {
            debug!(
                "{:?} dropped: only {} of {} folds predicted",
                kind,
                errors.len(),
                n
            );
            continue;
        }
        let folds = errors.len() as f64;
        let rmse = (errors.iter().map(|e| e * e).sum::<f64>() / folds).sqrt();
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / folds;
        let mean_bias = errors.iter().sum::<f64>() / folds;
        scores.push(CrossValidationScore {
            kind,
            rmse,
            mae,
            mean_bias,
            folds: errors.len(),
        });
    }

    let winner = scores
        .iter()
        .min_by(|a, b| {
            a.rmse
                .partial_cmp(&b.rmse)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|s| s.kind)
        .ok_or_else(|| {
            Error::NumericalFailure("no variogram model survived cross-validation".into())
        })?;
    debug!("cross-validation winner: {:?}", winner);

    // Production refit over all observations with the global cutoff
    let cutoff = cfg.max_distance_factor * obs.max_pairwise_distance();
    let params = VariogramParams {
        max_distance: Some(cutoff),
        ..cfg.variogram.clone()
    };
    let model = match empirical_variogram(obs, &params)
        .ok()
        .and_then(|emp| fit_model(&emp, winner, cfg.nugget_mode))
    {
        Some(m) => m,
        None => {
            warn!("refit of {:?} failed, using default spherical model", winner);
            default_spherical(obs)
        }
    };

    let quality = model.r_squared;
    Ok(SelectedModel {
        model,
        quality,
        scores,
    })
}

/// Prediction error for one held-out observation, or `None` when the
/// fold cannot be fit or kriged.
fn loo_error(
    obs: &ObservationSet,
    held_out: usize,
    kind: VariogramModelKind,
    cfg: &SelectionConfig,
) -> Option<f64> {
    let target = obs.points()[held_out];
    let training = obs.without(held_out);

    let cutoff = pairwise_distance_percentile(&training, cfg.fold_percentile)?;
    let params = VariogramParams {
        max_distance: Some(cutoff),
        ..cfg.variogram.clone()
    };
    let emp: EmpiricalVariogram = empirical_variogram(&training, &params).ok()?;
    let model = fit_model(&emp, kind, cfg.nugget_mode)?;

    let tree = KdTree::build(training.points());
    let (estimate, _) =
        predict_point(&tree, &model, target.x, target.y, cfg.max_neighbors, None).ok()?;
    Some(estimate - target.value)
}

fn pairwise_distance_percentile(obs: &ObservationSet, percentile: f64) -> Option<f64> {
    let points = obs.points();
    let n = points.len();
    if n < 2 {
        return None;
    }
    let mut distances = Vec::with_capacity(n * (n - 1) / 2);
    for i in 0..n {
        for j in (i + 1)..n {
            distances.push(points[i].dist(points[j].x, points[j].y));
        }
    }
    distances.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = ((distances.len() - 1) as f64 * percentile).round() as usize;
    let cutoff = distances[idx];
    if cutoff > 0.0 {
        Some(cutoff)
    } else {
        None
    }
}

/// Select the model shape by goodness of fit against one empirical
/// variogram, without cross-validation. Cheap enough for any run.
pub fn select_by_heuristic(obs: &ObservationSet, cfg: &SelectionConfig) -> Result<SelectedModel> {
    validate(obs, cfg)?;

    let emp = empirical_variogram(obs, &cfg.variogram)?;
    let mut best: Option<FittedVariogram> = None;
    for kind in VariogramModelKind::ALL {
        if let Some(fitted) = fit_model(&emp, kind, cfg.nugget_mode) {
            let better = match &best {
                Some(b) => fitted.r_squared > b.r_squared,
                None => true,
            };
            if better {
                best = Some(fitted);
            }
        }
    }

    let model = match best {
        Some(m) => m,
        None => {
            warn!("no variogram model fit the empirical bins, using default spherical");
            default_spherical(obs)
        }
    };
    let quality = model.r_squared;
    Ok(SelectedModel {
        model,
        quality,
        scores: Vec::new(),
    })
}

/// Map a fitted variogram onto Gaussian-process style parameters.
///
/// The length scale is the range expressed in coordinate standard
/// deviations, clamped to [0.01, 1.0]; the noise level is one percent of
/// the value variance floored at 1e-8; the amplitude is the square root
/// of the sill.
pub fn gp_parameters(obs: &ObservationSet, model: &FittedVariogram) -> GpParameters {
    let (sx, sy) = coordinate_std(obs);
    let spread = ((sx + sy) / 2.0).max(1e-12);
    GpParameters {
        length_scale: (model.range / spread).clamp(0.01, 1.0),
        noise_level: (0.01 * obs.variance()).max(1e-8),
        amplitude: model.sill.max(0.0).sqrt(),
    }
}

fn coordinate_std(obs: &ObservationSet) -> (f64, f64) {
    let points = obs.points();
    let n = points.len() as f64;
    let (mx, my) = points
        .iter()
        .fold((0.0, 0.0), |(ax, ay), p| (ax + p.x, ay + p.y));
    let (mx, my) = (mx / n, my / n);
    let (vx, vy) = points.iter().fold((0.0, 0.0), |(ax, ay), p| {
        (ax + (p.x - mx).powi(2), ay + (p.y - my).powi(2))
    });
    ((vx / n).sqrt(), (vy / n).sqrt())
}
