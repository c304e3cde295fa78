//! Raster primitives: geotransform and prediction surface

mod geotransform;
mod surface;

pub use geotransform::GeoTransform;
pub use surface::{Surface, NO_DATA};
