// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Reference Points
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Whitespace-separated tables of device points used for calibration checks.
//!
//! One point per row (x y z). Arrays are handed out component-major, 3×N,
//! which is what the projection engine consumes.

use fusion_types::error::{FusionError, FusionResult};
use ndarray::Array2;
use std::path::Path;

/// Read a point table. Blank lines and `#` comments are skipped.
pub fn read_reference_points(path: impl AsRef<Path>) -> FusionResult<Array2<f64>> {
    let text = std::fs::read_to_string(path)?;
    parse_reference_points(&text)
}

pub fn parse_reference_points(text: &str) -> FusionResult<Array2<f64>> {
    let mut columns: Option<usize> = None;
    let mut values = Vec::new();
    let mut rows = 0;

    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|v| v.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| FusionError::CalibrationFormat(format!("line {}: {e}", number + 1)))?;
        match columns {
            None => columns = Some(row.len()),
            Some(n) if n != row.len() => {
                return Err(FusionError::CalibrationFormat(format!(
                    "line {}: expected {n} values, found {}",
                    number + 1,
                    row.len()
                )))
            }
            Some(_) => {}
        }
        values.extend(row);
        rows += 1;
    }

    let n = columns.unwrap_or(0);
    let table = Array2::from_shape_vec((rows, n), values)
        .map_err(|e| FusionError::Shape(format!("reference table: {e}")))?;
    Ok(table.reversed_axes().as_standard_layout().into_owned())
}

/// Write a component-major array, one point per row.
pub fn write_reference_points(path: impl AsRef<Path>, points: &Array2<f64>) -> FusionResult<()> {
    let mut out = String::new();
    for point in points.columns() {
        let row: Vec<String> = point.iter().map(|v| format!("{v:.10}")).collect();
        out.push_str(&row.join("\t"));
        out.push('\n');
    }
    std::fs::write(path, out)?;
    Ok(())
}
