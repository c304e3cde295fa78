//! Spatial interpolation
//!
//! Surface estimation from sparse point observations: empirical
//! variogram analysis and model fitting, automatic model selection,
//! ordinary kriging with estimation variance, inverse distance
//! weighting, target grid construction and area-of-interest masking.
//! The [`engine`] module drives a full run end to end.

pub mod engine;
pub mod grid;
pub mod idw;
pub mod kdtree;
pub mod kriging;
pub mod mask;
pub mod selection;
pub mod variogram;

pub use engine::{
    EngineConfig, InterpolationEngine, Method, RunOutcome, RunReport, SelectionStrategy,
};
pub use grid::{estimate_cell_size, GridSpec};
pub use idw::{idw, idw_at, IdwMode, IdwOutput, IdwParams};
pub use kdtree::{KdTree, Neighbor};
pub use kriging::{
    ordinary_kriging, predict_point, ClampPolicy, KrigingOutput, KrigingParams,
};
pub use mask::AreaMask;
pub use selection::{
    gp_parameters, select_by_cross_validation, select_by_heuristic, CrossValidationScore,
    GpParameters, SelectedModel, SelectionConfig,
};
pub use variogram::{
    empirical_variogram, fit_best_model, fit_model, EmpiricalVariogram, FittedVariogram,
    LagBin, NuggetMode, VariogramModelKind, VariogramParams,
};
