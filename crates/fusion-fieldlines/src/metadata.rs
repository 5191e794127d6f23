// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Surface Metadata
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Per-configuration flux-surface table (`fs_info`).

use crate::record::{read_field, RecordWriter};
use fusion_types::error::{FusionError, FusionResult};
use ndarray::{Array1, Array2, Ix1, Ix2};
use ndarray_npy::NpzReader;
use std::fs::File;
use std::path::Path;

const IOTA_POSITION: usize = 3;
const REFF_POSITION: usize = 4;
const SEPARATRIX_POSITION: usize = 6;
const ISLAND_NAMES_POSITION: usize = 7;
const ISLAND_FLAGS_POSITION: usize = 8;

/// Scalar properties of every flux surface of one magnetic configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceMetadata {
    pub iota: Array1<f64>,
    pub reff: Array1<f64>,
    /// Separatrix surfaces: main plasma first, then one per island chain.
    pub separatrix: Vec<usize>,
    pub island_names: Vec<String>,
    /// Island membership per surface, 0 for surfaces outside any island.
    pub island_flags: Array1<i64>,
}

/// Metadata row of a single surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceInfo {
    pub surface: usize,
    pub iota: f64,
    pub reff: f64,
    pub island_flag: i64,
}

impl SurfaceMetadata {
    pub fn read(path: impl AsRef<Path>) -> FusionResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mut npz = NpzReader::new(file).map_err(|e| {
            FusionError::DataFormat(format!("Failed to open npz '{}': {e}", path.display()))
        })?;

        let iota: Array1<f64> = read_field::<f64, Ix1>(&mut npz, IOTA_POSITION)?;
        let reff: Array1<f64> = read_field::<f64, Ix1>(&mut npz, REFF_POSITION)?;
        let separatrix = read_field::<i64, Ix1>(&mut npz, SEPARATRIX_POSITION)?
            .iter()
            .map(|&s| {
                usize::try_from(s).map_err(|_| {
                    FusionError::DataFormat(format!("negative separatrix surface {s}"))
                })
            })
            .collect::<FusionResult<Vec<_>>>()?;
        let names: Array2<u8> = read_field::<u8, Ix2>(&mut npz, ISLAND_NAMES_POSITION)?;
        let island_names = names
            .rows()
            .into_iter()
            .map(|row| decode_name(&row.to_vec()))
            .collect();
        let island_flags: Array1<i64> = read_field::<i64, Ix1>(&mut npz, ISLAND_FLAGS_POSITION)?;

        let meta = SurfaceMetadata {
            iota,
            reff,
            separatrix,
            island_names,
            island_flags,
        };
        meta.validate()?;
        Ok(meta)
    }

    fn validate(&self) -> FusionResult<()> {
        let n = self.surface_count();
        if self.reff.len() != n || self.island_flags.len() != n {
            return Err(FusionError::DataFormat(format!(
                "surface metadata columns disagree: iota {n}, reff {}, flags {}",
                self.reff.len(),
                self.island_flags.len()
            )));
        }
        if let Some(&s) = self.separatrix.iter().find(|&&s| s >= n) {
            return Err(FusionError::DataFormat(format!(
                "separatrix surface {s} beyond {n} surfaces"
            )));
        }
        Ok(())
    }

    /// Write the table in the same positional layout `read` expects.
    pub fn write(&self, path: impl AsRef<Path>) -> FusionResult<()> {
        let width = self
            .island_names
            .iter()
            .map(String::len)
            .max()
            .unwrap_or(0)
            .max(1);
        let mut names = Array2::<u8>::zeros((self.island_names.len(), width));
        for (mut row, name) in names.rows_mut().into_iter().zip(&self.island_names) {
            for (dst, &b) in row.iter_mut().zip(name.as_bytes()) {
                *dst = b;
            }
        }
        let separatrix: Array1<i64> = self.separatrix.iter().map(|&s| s as i64).collect();

        let mut writer = RecordWriter::create(path)?;
        writer.add_field(IOTA_POSITION, &self.iota)?;
        writer.add_field(REFF_POSITION, &self.reff)?;
        writer.add_field(SEPARATRIX_POSITION, &separatrix)?;
        writer.add_field(ISLAND_NAMES_POSITION, &names)?;
        writer.add_field(ISLAND_FLAGS_POSITION, &self.island_flags)?;
        writer.finish()
    }

    pub fn surface_count(&self) -> usize {
        self.iota.len()
    }

    /// Last surface of the main confined plasma.
    pub fn main_separatrix(&self) -> Option<usize> {
        self.separatrix.first().copied()
    }

    pub fn is_island_surface(&self, surface: usize) -> bool {
        self.island_flags.get(surface).is_some_and(|&f| f != 0)
    }

    pub fn info(&self, surface: usize) -> Option<SurfaceInfo> {
        Some(SurfaceInfo {
            surface,
            iota: *self.iota.get(surface)?,
            reff: *self.reff.get(surface)?,
            island_flag: *self.island_flags.get(surface)?,
        })
    }
}

fn decode_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
}
