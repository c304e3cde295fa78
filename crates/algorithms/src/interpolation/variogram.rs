//! Variogram estimation and theoretical model fitting
//!
//! Computes the empirical (experimental) variogram from sample points and
//! fits theoretical models (spherical, exponential, Gaussian, linear).
//! Prerequisite for kriging interpolation.
//!
//! The semivariance γ(h) measures spatial dissimilarity as a function of
//! separation distance h:
//! ```text
//! γ(h) = (1/2N(h)) Σ [z(xᵢ) - z(xⱼ)]²   for all pairs with |xᵢ-xⱼ| in bin h
//! ```
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.

use serde::Serialize;
use terrastat_core::{Error, ObservationSet, Result};

/// One distance class of the empirical variogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagBin {
    /// Bin center distance
    pub distance: f64,
    /// Average semivariance γ(h) of pairs in the bin
    pub semivariance: f64,
    /// Number of unordered point pairs contributing
    pub pair_count: usize,
}

/// Empirical variogram: lag bins with strictly increasing distance.
/// Bins with fewer than [`VariogramParams::min_pairs`] pairs are dropped,
/// not zero-filled.
#[derive(Debug, Clone)]
pub struct EmpiricalVariogram {
    pub bins: Vec<LagBin>,
    /// Cutoff distance the bins were computed against
    pub max_distance: f64,
}

impl EmpiricalVariogram {
    /// Largest retained lag distance.
    pub fn max_lag(&self) -> Option<f64> {
        self.bins.last().map(|b| b.distance)
    }

    /// Largest retained semivariance.
    pub fn max_semivariance(&self) -> f64 {
        self.bins
            .iter()
            .map(|b| b.semivariance)
            .fold(0.0_f64, f64::max)
    }
}

/// Parameters for empirical variogram computation.
#[derive(Debug, Clone)]
pub struct VariogramParams {
    /// Number of equal-width lag bins; capped at n/2 for small sets
    pub bin_num: usize,
    /// Distance cutoff. `None` uses the full maximum pairwise distance.
    pub max_distance: Option<f64>,
    /// Minimum pairs for a bin to be retained
    pub min_pairs: usize,
}

impl Default for VariogramParams {
    fn default() -> Self {
        Self {
            bin_num: 12,
            max_distance: None,
            min_pairs: 2,
        }
    }
}

/// Compute the empirical variogram from an observation set.
///
/// Pairwise distances are grouped into `bin_num` equal-width bins up to
/// the cutoff; each unordered pair is counted once. Bins that attract
/// fewer than `min_pairs` pairs are omitted from the result.
pub fn empirical_variogram(
    obs: &ObservationSet,
    params: &VariogramParams,
) -> Result<EmpiricalVariogram> {
    let points = obs.points();
    let n = points.len();
    if n < 2 {
        return Err(Error::InsufficientData { needed: 2, got: n });
    }

    let max_distance = match params.max_distance {
        Some(d) => {
            if !d.is_finite() || d <= 0.0 {
                return Err(Error::InvalidParameter {
                    name: "max_distance",
                    value: d.to_string(),
                    reason: "must be finite and positive".into(),
                });
            }
            d
        }
        None => obs.max_pairwise_distance(),
    };
    if max_distance <= 0.0 {
        return Err(Error::InvalidParameter {
            name: "max_distance",
            value: max_distance.to_string(),
            reason: "all observations are co-located".into(),
        });
    }

    let bin_num = params.bin_num.min((n / 2).max(2)).max(2);
    let bin_width = max_distance / bin_num as f64;

    let mut sq_diff_sums = vec![0.0_f64; bin_num];
    let mut pair_counts = vec![0_usize; bin_num];

    for i in 0..n {
        for j in (i + 1)..n {
            let d = points[i].dist(points[j].x, points[j].y);
            if d > max_distance {
                continue;
            }
            let bin = ((d / bin_width) as usize).min(bin_num - 1);
            let dz = points[i].value - points[j].value;
            sq_diff_sums[bin] += dz * dz;
            pair_counts[bin] += 1;
        }
    }

    let bins: Vec<LagBin> = (0..bin_num)
        .filter(|&k| pair_counts[k] >= params.min_pairs)
        .map(|k| LagBin {
            distance: (k as f64 + 0.5) * bin_width,
            semivariance: sq_diff_sums[k] / (2.0 * pair_counts[k] as f64),
            pair_count: pair_counts[k],
        })
        .collect();

    Ok(EmpiricalVariogram { bins, max_distance })
}

/// Theoretical variogram model shape. The declaration order is the
/// deterministic tie-break order used everywhere candidates are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum VariogramModelKind {
    /// γ(h) = c₀ + c·[1.5(h/a) − 0.5(h/a)³] for h ≤ a; c₀ + c beyond
    Spherical,
    /// γ(h) = c₀ + c·[1 − exp(−3h/a)]
    Exponential,
    /// γ(h) = c₀ + c·[1 − exp(−3h²/a²)]
    Gaussian,
    /// γ(h) = c₀ + min(c·h/a, c)
    Linear,
}

impl VariogramModelKind {
    pub const ALL: [Self; 4] = [
        Self::Spherical,
        Self::Exponential,
        Self::Gaussian,
        Self::Linear,
    ];

    /// Fraction of the maximum lag anchoring the range search for this
    /// shape.
    fn range_anchor(&self) -> f64 {
        match self {
            Self::Spherical => 0.6,
            Self::Exponential => 0.3,
            Self::Gaussian => 0.5,
            Self::Linear => 1.0,
        }
    }
}

/// Whether the fitter estimates a nugget or pins it to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NuggetMode {
    #[default]
    Zero,
    Fit,
}

/// A fitted theoretical variogram.
///
/// `sill` is the variance contribution above the nugget, so
/// γ(h→∞) → sill + nugget. γ(0) is exactly 0; the nugget applies for
/// any h > 0.
#[derive(Debug, Clone, Serialize)]
pub struct FittedVariogram {
    pub kind: VariogramModelKind,
    pub sill: f64,
    pub range: f64,
    pub nugget: f64,
    /// Goodness of fit against the empirical bins, clamped to [0, 1]
    pub r_squared: f64,
    /// Pair-count-weighted residual sum of squares from fitting
    pub rss: f64,
}

impl FittedVariogram {
    /// Evaluate the model semivariance at lag distance h.
    pub fn evaluate(&self, h: f64) -> f64 {
        if h < 1e-15 {
            return 0.0;
        }
        let c = self.sill;
        let a = self.range;
        let structure = match self.kind {
            VariogramModelKind::Spherical => {
                if h >= a {
                    c
                } else {
                    let hr = h / a;
                    c * (1.5 * hr - 0.5 * hr * hr * hr)
                }
            }
            VariogramModelKind::Exponential => c * (1.0 - (-3.0 * h / a).exp()),
            VariogramModelKind::Gaussian => c * (1.0 - (-3.0 * h * h / (a * a)).exp()),
            VariogramModelKind::Linear => (c * h / a).min(c),
        };
        self.nugget + structure
    }
}

/// Fit one model shape to an empirical variogram by weighted least
/// squares over a sill/range (and optionally nugget) search grid, with
/// pair counts as weights. The range search is anchored to a
/// shape-dependent fraction of the maximum lag.
///
/// Returns `None` when fewer than 2 usable lag bins exist or the
/// empirical semivariances carry no signal.
pub fn fit_model(
    empirical: &EmpiricalVariogram,
    kind: VariogramModelKind,
    nugget_mode: NuggetMode,
) -> Option<FittedVariogram> {
    if empirical.bins.len() < 2 {
        return None;
    }
    let max_sv = empirical.max_semivariance();
    let max_lag = empirical.max_lag()?;
    if max_sv <= 0.0 || max_lag <= 0.0 {
        return None;
    }

    let anchor = kind.range_anchor() * max_lag;
    let nugget_steps: Vec<f64> = match nugget_mode {
        NuggetMode::Zero => vec![0.0],
        // 0 .. max_sv/2
        NuggetMode::Fit => (0..=8).map(|i| max_sv * i as f64 / 16.0).collect(),
    };

    let mut best: Option<FittedVariogram> = None;
    let mut best_rss = f64::MAX;

    for &nugget in &nugget_steps {
        for is in 1..=12 {
            let sill = max_sv * is as f64 / 8.0 - nugget;
            if sill <= 0.0 {
                continue;
            }
            for ir in 1..=20 {
                let range = anchor * ir as f64 / 10.0;
                let trial = FittedVariogram {
                    kind,
                    sill,
                    range,
                    nugget,
                    r_squared: 0.0,
                    rss: 0.0,
                };

                let mut rss = 0.0;
                for bin in &empirical.bins {
                    let residual = bin.semivariance - trial.evaluate(bin.distance);
                    rss += bin.pair_count as f64 * residual * residual;
                }
                // Strict < keeps the first-visited optimum, so repeated
                // fits are deterministic.
                if rss < best_rss {
                    best_rss = rss;
                    best = Some(trial);
                }
            }
        }
    }

    let mut fitted = best?;
    fitted.rss = best_rss;
    fitted.r_squared = r_squared(empirical, &fitted)?;
    Some(fitted)
}

/// Unweighted R² of a fitted model against the empirical bins,
/// clamped to [0, 1].
fn r_squared(empirical: &EmpiricalVariogram, model: &FittedVariogram) -> Option<f64> {
    let mean_sv = empirical
        .bins
        .iter()
        .map(|b| b.semivariance)
        .sum::<f64>()
        / empirical.bins.len() as f64;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for bin in &empirical.bins {
        let r = bin.semivariance - model.evaluate(bin.distance);
        ss_res += r * r;
        let t = bin.semivariance - mean_sv;
        ss_tot += t * t;
    }
    if ss_tot <= 0.0 {
        return None;
    }
    Some((1.0 - ss_res / ss_tot).clamp(0.0, 1.0))
}

/// Fit all four model shapes and keep the best by R². Ties resolve in
/// favor of the earlier shape in [`VariogramModelKind::ALL`].
pub fn fit_best_model(
    empirical: &EmpiricalVariogram,
    nugget_mode: NuggetMode,
) -> Option<FittedVariogram> {
    let mut best: Option<FittedVariogram> = None;
    for kind in VariogramModelKind::ALL {
        if let Some(fitted) = fit_model(empirical, kind, nugget_mode) {
            let better = match &best {
                Some(b) => fitted.r_squared > b.r_squared,
                None => true,
            };
            if better {
                best = Some(fitted);
            }
        }
    }
    best
}

/// Heuristic spherical model used when no shape fits acceptably:
/// sill from the observed value variance, range at half the maximum
/// pairwise distance.
pub fn default_spherical(obs: &ObservationSet) -> FittedVariogram {
    let sill = obs.variance().max(1e-12);
    let range = (obs.max_pairwise_distance() * 0.5).max(1e-6);
    FittedVariogram {
        kind: VariogramModelKind::Spherical,
        sill,
        range,
        nugget: 0.0,
        r_squared: 0.5,
        rss: f64::MAX,
    }
}
