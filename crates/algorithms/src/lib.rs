//! terrastat-algorithms: spatial interpolation algorithms
//!
//! Estimates continuous surfaces from sparse point measurements.
//! Variogram analysis, ordinary kriging with estimation variance and
//! inverse distance weighting, with automatic model selection and a
//! run-orchestrating engine on top.
//!
//! ## Example
//!
//! ```no_run
//! use terrastat_algorithms::prelude::*;
//! use terrastat_core::ObservationSet;
//!
//! # fn main() -> terrastat_core::Result<()> {
//! let obs = ObservationSet::from_coords_values(
//!     &[(0.0, 0.0), (40.0, 0.0), (0.0, 40.0), (40.0, 40.0), (20.0, 20.0)],
//!     &[6.1, 6.8, 5.9, 7.2, 6.5],
//! )?;
//! let engine = InterpolationEngine::new(EngineConfig::default());
//! let outcome = engine.run(&obs, "ph")?;
//! println!("{:?}", outcome.report);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `parallel` (default): rayon parallelism over grid batches, folds
//!   and variables. Disable for single-threaded builds.

pub mod interpolation;
mod maybe_rayon;

pub use interpolation::{
    EngineConfig, InterpolationEngine, Method, RunOutcome, RunReport, SelectionStrategy,
};

/// Common imports for working with the interpolation pipeline.
pub mod prelude {
    pub use crate::interpolation::{
        empirical_variogram, fit_best_model, idw, ordinary_kriging, select_by_cross_validation,
        select_by_heuristic, AreaMask, ClampPolicy, EngineConfig, FittedVariogram, GridSpec,
        IdwMode, IdwParams, InterpolationEngine, KdTree, KrigingParams, Method, NuggetMode,
        RunOutcome, RunReport, SelectionConfig, SelectionStrategy, VariogramModelKind,
        VariogramParams,
    };
    pub use terrastat_core::prelude::*;
}
