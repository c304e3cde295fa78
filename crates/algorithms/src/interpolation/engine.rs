//! Interpolation pipeline orchestration
//!
//! Ties the pieces together for a whole-variable run: validate the
//! observations, build the target grid, pick and fit a variogram model,
//! predict with kriging (or IDW when configured or when kriging cannot
//! proceed), mask to the area of interest, and emit a run report.
//!
//! The method decision is made once, up front, from the configuration;
//! a kriging run that fails numerically degrades to IDW exactly one
//! level deep, with the degradation logged and recorded in the report.

use log::{info, warn};
use serde::Serialize;
use terrastat_core::{Error, ObservationSet, Result, Surface};

use crate::maybe_rayon::*;

use super::grid::GridSpec;
use super::idw::{idw, IdwParams};
use super::kriging::{ordinary_kriging, ClampPolicy, KrigingParams};
use super::mask::AreaMask;
use super::selection::{
    select_by_cross_validation, select_by_heuristic, SelectedModel, SelectionConfig,
};
use super::variogram::FittedVariogram;

/// Interpolation method actually used for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Method {
    Kriging,
    Idw,
}

/// How the kriging path chooses its variogram model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SelectionStrategy {
    /// Leave-one-out cross-validation over all candidate shapes
    CrossValidation,
    /// Single-fit goodness-of-fit comparison
    #[default]
    Heuristic,
}

/// Engine configuration. One object, resolved once per engine; no
/// environment probing at run time.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Preferred method; kriging may still degrade to IDW per run
    pub method: Method,
    pub selection: SelectionStrategy,
    pub selection_cfg: SelectionConfig,
    pub kriging: KrigingParams,
    pub idw: IdwParams,
    /// Explicit grid cell size; estimated from point spacing when `None`
    pub cell_size: Option<f64>,
    /// Padding around the observation extent, in cell sizes
    pub pad_mult: f64,
    /// Mask the surface to the convex hull of the observations
    pub mask: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            method: Method::Kriging,
            selection: SelectionStrategy::default(),
            selection_cfg: SelectionConfig::default(),
            kriging: KrigingParams::default(),
            idw: IdwParams::default(),
            cell_size: None,
            pad_mult: 0.5,
            mask: true,
        }
    }
}

/// Summary of one variable's interpolation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub variable: String,
    pub method: Method,
    /// True when kriging was requested but IDW was used
    pub degraded: bool,
    pub model: Option<FittedVariogram>,
    /// Model fit quality in [0, 1], kriging runs only
    pub quality: Option<f64>,
    pub grid: GridSpec,
    pub resolved_cells: usize,
    pub defaulted_cells: usize,
    /// Cells that used per-cell IDW weights after a singular system
    pub fallback_cells: usize,
    pub masked_cells: usize,
    pub range_before_clamp: Option<(f64, f64)>,
    pub range_after_clamp: Option<(f64, f64)>,
}

/// Surfaces plus report for one run.
#[derive(Debug)]
pub struct RunOutcome {
    pub values: Surface,
    pub variance: Option<Surface>,
    pub report: RunReport,
}

pub struct InterpolationEngine {
    config: EngineConfig,
}

impl InterpolationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build an observation set from raw slices and run. Non-finite
    /// entries are dropped; fewer than 3 survivors fail before any
    /// surface is allocated.
    pub fn run_from_coords(
        &self,
        coords: &[(f64, f64)],
        values: &[f64],
        variable: &str,
    ) -> Result<RunOutcome> {
        let obs = ObservationSet::from_coords_values(coords, values)?;
        self.run(&obs, variable)
    }

    /// Interpolate one variable onto its own grid.
    pub fn run(&self, obs: &ObservationSet, variable: &str) -> Result<RunOutcome> {
        let cfg = &self.config;
        let grid = GridSpec::from_observations(obs, cfg.cell_size, cfg.pad_mult)?;
        info!(
            "{}: {} observations onto a {}x{} grid (cell {})",
            variable,
            obs.len(),
            grid.width,
            grid.height,
            grid.cell_size
        );

        let (mut values, mut variance, mut report) = match cfg.method {
            Method::Kriging => self.kriging_path(obs, &grid, variable)?,
            Method::Idw => self.idw_path(obs, &grid, variable, false)?,
        };

        // Clamping happens here rather than inside the predictor so both
        // ranges can be reported.
        report.range_before_clamp = values.value_range();
        if let ClampPolicy::ObservedRange { tolerance_frac } = cfg.kriging.clamp {
            if report.method == Method::Kriging {
                clamp_surface(&mut values, obs, tolerance_frac)?;
            }
        }
        report.range_after_clamp = values.value_range();

        if cfg.mask {
            let mask = AreaMask::convex_hull(obs, &grid)?;
            report.masked_cells = mask.apply(&mut values)?;
            if let Some(var) = variance.as_mut() {
                mask.apply(var)?;
            }
        }

        info!(
            "{}: done via {:?}{} ({} resolved, {} defaulted, {} masked)",
            variable,
            report.method,
            if report.degraded { " (degraded)" } else { "" },
            report.resolved_cells,
            report.defaulted_cells,
            report.masked_cells
        );

        Ok(RunOutcome {
            values,
            variance,
            report,
        })
    }

    /// Run several variables in parallel. Each gets its own grid and
    /// report; failures stay per-variable.
    pub fn run_many(
        &self,
        variables: &[(String, ObservationSet)],
    ) -> Vec<(String, Result<RunOutcome>)> {
        variables
            .into_par_iter()
            .map(|(name, obs)| (name.clone(), self.run(obs, name)))
            .collect()
    }

    fn kriging_path(
        &self,
        obs: &ObservationSet,
        grid: &GridSpec,
        variable: &str,
    ) -> Result<(Surface, Option<Surface>, RunReport)> {
        let cfg = &self.config;
        let selected = match self.select_model(obs) {
            Ok(sel) => sel,
            Err(Error::InvalidParameter { name, value, reason }) => {
                return Err(Error::InvalidParameter { name, value, reason });
            }
            Err(err) => {
                warn!("{}: model selection failed ({}), degrading to IDW", variable, err);
                return self.idw_path(obs, grid, variable, true);
            }
        };

        // The predictor's own clamp stays off; the engine clamps after
        // recording the raw range.
        let params = KrigingParams {
            clamp: ClampPolicy::None,
            ..cfg.kriging.clone()
        };
        match ordinary_kriging(obs, &selected.model, grid, &params) {
            Ok(out) => {
                let report = RunReport {
                    variable: variable.to_string(),
                    method: Method::Kriging,
                    degraded: false,
                    model: Some(selected.model),
                    quality: Some(selected.quality),
                    grid: *grid,
                    resolved_cells: out.resolved_cells,
                    defaulted_cells: out.defaulted_cells,
                    fallback_cells: out.fallback_cells,
                    masked_cells: 0,
                    range_before_clamp: None,
                    range_after_clamp: None,
                };
                Ok((out.values, out.variance, report))
            }
            Err(Error::NumericalFailure(msg)) => {
                warn!("{}: kriging failed ({}), degrading to IDW", variable, msg);
                self.idw_path(obs, grid, variable, true)
            }
            Err(err) => Err(err),
        }
    }

    fn idw_path(
        &self,
        obs: &ObservationSet,
        grid: &GridSpec,
        variable: &str,
        degraded: bool,
    ) -> Result<(Surface, Option<Surface>, RunReport)> {
        let out = idw(obs, grid, &self.config.idw)?;
        let report = RunReport {
            variable: variable.to_string(),
            method: Method::Idw,
            degraded,
            model: None,
            quality: None,
            grid: *grid,
            resolved_cells: out.resolved_cells,
            defaulted_cells: out.defaulted_cells,
            fallback_cells: 0,
            masked_cells: 0,
            range_before_clamp: None,
            range_after_clamp: None,
        };
        Ok((out.values, None, report))
    }

    fn select_model(&self, obs: &ObservationSet) -> Result<SelectedModel> {
        match self.config.selection {
            SelectionStrategy::CrossValidation => {
                select_by_cross_validation(obs, &self.config.selection_cfg)
            }
            SelectionStrategy::Heuristic => select_by_heuristic(obs, &self.config.selection_cfg),
        }
    }
}

fn clamp_surface(surface: &mut Surface, obs: &ObservationSet, tolerance_frac: f64) -> Result<()> {
    if !tolerance_frac.is_finite() || tolerance_frac < 0.0 {
        return Err(Error::InvalidParameter {
            name: "tolerance_frac",
            value: tolerance_frac.to_string(),
            reason: "must be finite and non-negative".into(),
        });
    }
    let (lo, hi) = obs.value_range();
    let slack = (hi - lo) * tolerance_frac;
    let (lo, hi) = (lo - slack, hi + slack);
    for v in surface.data_mut().iter_mut() {
        if v.is_finite() {
            *v = v.clamp(lo, hi);
        }
    }
    Ok(())
}
