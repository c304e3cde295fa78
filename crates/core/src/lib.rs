//! # Terrastat Core
//!
//! Core types for the Terrastat geostatistical interpolation engine.
//!
//! This crate provides:
//! - `ObservationSet`: validated, immutable point measurements
//! - `Surface`: dense 2-D prediction grid with no-data handling
//! - `GeoTransform`: affine mapping between pixels and map coordinates
//! - `Error`/`Result`: the error contract shared by all components

pub mod error;
pub mod observations;
pub mod raster;

pub use error::{Error, Result};
pub use observations::{ObservationSet, SamplePoint, MIN_OBSERVATIONS, MIN_VARIOGRAM_OBSERVATIONS};
pub use raster::{GeoTransform, Surface, NO_DATA};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::observations::{ObservationSet, SamplePoint};
    pub use crate::raster::{GeoTransform, Surface, NO_DATA};
}
