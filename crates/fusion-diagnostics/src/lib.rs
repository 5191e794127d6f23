//! Camera diagnostics: projection of device coordinates into camera images.
//!
//! Points are given as 3×… arrays of Cartesian device coordinates (m).
//! Two strategies build the pixel transform: the legacy Rodrigues-rotation
//! mapping used by the precalibrated views, and a direct image-plane basis
//! that supports two-point calibration.

pub mod calibration;
pub mod projection;
pub mod reference;

pub use calibration::{CalibrationCatalog, CalibrationEntry};
pub use projection::{
    CameraGeometry, CameraPose, DirectStrategy, ImageSize, LegacyStrategy, ProjectionEngine,
    ProjectionStrategy, ProjectionTransform, QuadraticRoot, TwoPointCalibration, ViewAppearance,
};
pub use reference::{read_reference_points, write_reference_points};
