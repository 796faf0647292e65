//! CSV and GeoJSON input and output.

pub mod export;
pub mod input;
/// Tolerant numeric deserializers for messy source columns.
pub mod lenient;
