//! Geometry kernels for SCPN Fusion Core camera diagnostics.

pub mod linalg;
