// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Error Taxonomy
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("Unknown magnetic configuration '{0}'")]
    UnknownConfiguration(String),

    #[error("No surface metadata file found at {}", .0.display())]
    MissingMetadata(PathBuf),

    #[error("Directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("Invalid field-line direction '{0}': expected forward, backward or both")]
    InvalidDirection(String),

    #[error("Selection format error: {0}")]
    SelectionFormat(String),

    #[error("Selection type error: {0}")]
    SelectionType(String),

    #[error("Selected index {index} out of range for axis of length {len}")]
    SelectionOutOfRange { index: i64, len: usize },

    #[error("No field-line data: {0}")]
    NoData(String),

    #[error("Calibration lookup failed: {0}")]
    Lookup(String),

    #[error("Shape error: {0}")]
    Shape(String),

    #[error("Degenerate camera geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Calibration file format error: {0}")]
    CalibrationFormat(String),

    #[error("Record data error: {0}")]
    DataFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type FusionResult<T> = Result<T, FusionError>;
