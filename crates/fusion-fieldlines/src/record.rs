// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Surface Records
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Positional-field records stored as `.npz` archives.
//!
//! Field `N` of a record is the archive entry `field_NN`. A surface record
//! holds, for each channel, six (line × toroidal) arrays starting at the
//! channel's base position: x, y, z forward, then x, y, z backward.

use fusion_types::constants::{
    FIELD_GRADIENT_POSITION, FIELD_LINE_POSITION, MAGNETIC_FIELD_POSITION,
};
use fusion_types::error::{FusionError, FusionResult};
use ndarray::{
    concatenate, s, stack, Array, Array2, Array3, ArrayBase, Axis, Data, Dimension, Ix2, OwnedRepr,
};
use ndarray_npy::{NpzReader, NpzWriter, ReadableElement, WritableElement};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Archive entry name of a positional field.
pub fn field_name(position: usize) -> String {
    format!("field_{position:02}")
}

/// Which traced orientation of the field lines to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
    /// Backward lines reversed along the toroidal axis, followed by the forward lines.
    Both,
}

impl Direction {
    /// Toroidal extent of the assembled slab for a record with `samples` points per line.
    pub fn toroidal_len(self, samples: usize) -> usize {
        match self {
            Direction::Both => 2 * samples,
            Direction::Forward | Direction::Backward => samples,
        }
    }
}

impl FromStr for Direction {
    type Err = FusionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forward" => Ok(Direction::Forward),
            "backward" => Ok(Direction::Backward),
            "both" => Ok(Direction::Both),
            other => Err(FusionError::InvalidDirection(other.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Both => "both",
        };
        f.write_str(name)
    }
}

/// Data channel of a surface record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    FieldLines,
    MagneticField,
    FieldGradient,
}

impl Channel {
    /// Position of the channel's forward x array.
    pub fn base_position(self) -> usize {
        match self {
            Channel::FieldLines => FIELD_LINE_POSITION,
            Channel::MagneticField => MAGNETIC_FIELD_POSITION,
            Channel::FieldGradient => FIELD_GRADIENT_POSITION,
        }
    }
}

/// Resolved line and toroidal indices shared by every slab of one load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisPlan {
    pub lines: Vec<usize>,
    pub toroidal: Vec<usize>,
}

/// Read a positional field of any element type and rank.
pub fn read_field<A, D>(npz: &mut NpzReader<File>, position: usize) -> FusionResult<Array<A, D>>
where
    A: ReadableElement,
    D: Dimension,
{
    let key = field_name(position);
    npz.by_name::<OwnedRepr<A>, D>(&format!("{key}.npy"))
        .or_else(|_| npz.by_name::<OwnedRepr<A>, D>(&key))
        .map_err(|e| FusionError::DataFormat(format!("Failed to read {key} from npz: {e}")))
}

/// Open record archive.
pub struct SurfaceRecord {
    path: PathBuf,
    npz: NpzReader<File>,
}

impl SurfaceRecord {
    pub fn open(path: impl AsRef<Path>) -> FusionResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let npz = NpzReader::new(file).map_err(|e| {
            FusionError::DataFormat(format!("Failed to open npz '{}': {e}", path.display()))
        })?;
        Ok(SurfaceRecord { path, npz })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn component(&mut self, position: usize) -> FusionResult<Array2<f64>> {
        read_field::<f64, Ix2>(&mut self.npz, position)
    }

    /// (lines, toroidal samples) of the forward x field-line array.
    pub fn extents(&mut self) -> FusionResult<(usize, usize)> {
        Ok(self.component(FIELD_LINE_POSITION)?.dim())
    }

    /// Build the shared axis plan from this record's extents.
    pub fn plan_axes(
        &mut self,
        lines: &crate::selection::Selection,
        toroidal: &crate::selection::Selection,
        direction: Direction,
    ) -> FusionResult<AxisPlan> {
        let (n_lines, n_samples) = self.extents()?;
        Ok(AxisPlan {
            lines: lines.resolve(n_lines)?,
            toroidal: toroidal.resolve(direction.toroidal_len(n_samples))?,
        })
    }

    /// Assemble one channel as a (3 × line × toroidal) slab.
    pub fn extract(
        &mut self,
        channel: Channel,
        direction: Direction,
        plan: &AxisPlan,
    ) -> FusionResult<Array3<f64>> {
        let base = channel.base_position();
        let mut coords = Vec::with_capacity(3);
        for k in 0..3 {
            let assembled = match direction {
                Direction::Forward => self.component(base + k)?,
                Direction::Backward => self.component(base + 3 + k)?,
                Direction::Both => {
                    let backward = self.component(base + 3 + k)?;
                    let forward = self.component(base + k)?;
                    if backward.nrows() != forward.nrows() {
                        return Err(FusionError::Shape(format!(
                            "{}: backward and forward line counts differ ({} vs {})",
                            self.path.display(),
                            backward.nrows(),
                            forward.nrows()
                        )));
                    }
                    concatenate(
                        Axis(1),
                        &[backward.slice(s![.., ..;-1]), forward.view()],
                    )
                    .map_err(|e| FusionError::Shape(e.to_string()))?
                }
            };
            coords.push(self.select(assembled, plan)?);
        }
        let views: Vec<_> = coords.iter().map(|c| c.view()).collect();
        stack(Axis(0), &views).map_err(|e| FusionError::Shape(e.to_string()))
    }

    fn select(&self, component: Array2<f64>, plan: &AxisPlan) -> FusionResult<Array2<f64>> {
        let (rows, cols) = component.dim();
        let line_ok = plan.lines.iter().all(|&i| i < rows);
        let tor_ok = plan.toroidal.iter().all(|&j| j < cols);
        if !line_ok || !tor_ok {
            return Err(FusionError::Shape(format!(
                "{}: record extent ({rows}, {cols}) too small for the selected lines/toroidal range",
                self.path.display()
            )));
        }
        Ok(component
            .select(Axis(0), &plan.lines)
            .select(Axis(1), &plan.toroidal))
    }
}

/// Writes positional-field records, e.g. when converting traced field lines.
pub struct RecordWriter {
    npz: NpzWriter<File>,
}

impl RecordWriter {
    pub fn create(path: impl AsRef<Path>) -> FusionResult<Self> {
        let file = File::create(path)?;
        Ok(RecordWriter {
            npz: NpzWriter::new(file),
        })
    }

    pub fn add_field<S, D>(&mut self, position: usize, array: &ArrayBase<S, D>) -> FusionResult<()>
    where
        S: Data,
        S::Elem: WritableElement,
        D: Dimension,
    {
        self.npz
            .add_array(field_name(position), array)
            .map_err(|e| FusionError::DataFormat(format!("Failed to write field {position}: {e}")))
    }

    pub fn finish(self) -> FusionResult<()> {
        self.npz
            .finish()
            .map(|_| ())
            .map_err(|e| FusionError::DataFormat(format!("Failed to finish npz: {e}")))
    }
}
