mod points;

pub mod op;

pub use points::{Points, PointsConversionError};
