// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Field-Line Store
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Lazily loaded, cached field-line coordinates of selected flux surfaces.
//!
//! Selection state (surfaces, lines, toroidal range, direction) is set through
//! [`FieldLineStore::update_read_parameters`]; [`FieldLineStore::load_data`]
//! reads only the surfaces whose cache entry is dirty. Aggregates are always
//! held as (coordinate × line × toroidal × surface) and the surface axis is
//! dropped only by the accessors, when a single surface is loaded.

use crate::metadata::{SurfaceInfo, SurfaceMetadata};
use crate::record::{AxisPlan, Channel, Direction, SurfaceRecord};
use crate::selection::{parse_selection, Selection, SelectionExpr};
use fusion_types::config::StoreConfig;
use fusion_types::error::{FusionError, FusionResult};
use indexmap::IndexMap;
use ndarray::{stack, Array3, Array4, ArrayView3, ArrayViewD, Axis};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How the surfaces of a read are named.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceRequest {
    /// Surface indices, resolved against the metadata surface count.
    Selection(SelectionExpr),
    /// Record files; the surface index is the trailing digit run of each file stem.
    Files(Vec<PathBuf>),
}

/// Changes to the read selection. Omitted fields keep their current value.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadParameters {
    pub surfaces: Option<SurfaceRequest>,
    pub lines: Option<SelectionExpr>,
    pub toroidal_range: Option<SelectionExpr>,
    pub direction: Option<Direction>,
    /// Replace the surface list instead of appending to it.
    pub replace: bool,
}

impl Default for ReadParameters {
    fn default() -> Self {
        ReadParameters {
            surfaces: None,
            lines: None,
            toroidal_range: None,
            direction: None,
            replace: true,
        }
    }
}

impl ReadParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn surfaces(mut self, surfaces: impl Into<SelectionExpr>) -> Self {
        self.surfaces = Some(SurfaceRequest::Selection(surfaces.into()));
        self
    }

    pub fn surface_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.surfaces = Some(SurfaceRequest::Files(
            files.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn lines(mut self, lines: impl Into<SelectionExpr>) -> Self {
        self.lines = Some(lines.into());
        self
    }

    pub fn toroidal_range(mut self, range: impl Into<SelectionExpr>) -> Self {
        self.toroidal_range = Some(range.into());
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Direction given by name: `forward`, `backward` or `both`.
    pub fn direction_name(self, name: &str) -> FusionResult<Self> {
        Ok(self.direction(name.parse()?))
    }

    /// Append the requested surfaces to the current list.
    pub fn append(mut self) -> Self {
        self.replace = false;
        self
    }
}

/// Cache state of one selected surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Must be (re)read at the next load.
    Dirty,
    /// Slab consistent with the active read parameters.
    Clean,
    /// Record file was absent at the last load.
    Missing,
}

#[derive(Debug, Clone)]
struct SurfaceSlabs {
    field_lines: Array3<f64>,
    magnetic_field: Option<Array3<f64>>,
    field_gradient: Option<Array3<f64>>,
}

#[derive(Debug, Clone)]
struct SurfaceEntry {
    file: Option<PathBuf>,
    state: CacheState,
    /// Named by the caller rather than picked up by the "all surfaces" default.
    explicit: bool,
    slabs: Option<SurfaceSlabs>,
}

impl SurfaceEntry {
    fn new(file: Option<PathBuf>, explicit: bool) -> Self {
        SurfaceEntry {
            file,
            state: CacheState::Dirty,
            explicit,
            slabs: None,
        }
    }

    fn needs_read(&self, include_field: bool, include_gradient: bool) -> bool {
        match self.state {
            CacheState::Dirty => true,
            CacheState::Missing => false,
            CacheState::Clean => match &self.slabs {
                None => true,
                Some(s) => {
                    (include_field && s.magnetic_field.is_none())
                        || (include_gradient && s.field_gradient.is_none())
                }
            },
        }
    }
}

/// Loaded aggregate of every readable selected surface.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLineData {
    surfaces: Vec<usize>,
    files: Vec<PathBuf>,
    field_lines: Array4<f64>,
    magnetic_field: Option<Array4<f64>>,
    field_gradient: Option<Array4<f64>>,
}

fn squeeze_surface_axis(a: &Array4<f64>) -> ArrayViewD<'_, f64> {
    if a.len_of(Axis(3)) == 1 {
        a.index_axis(Axis(3), 0).into_dyn()
    } else {
        a.view().into_dyn()
    }
}

impl FieldLineData {
    /// Coordinates, rank 3 for a single surface, rank 4 otherwise.
    pub fn field_lines(&self) -> ArrayViewD<'_, f64> {
        squeeze_surface_axis(&self.field_lines)
    }

    /// Coordinates with the surface axis always present.
    pub fn field_lines_full(&self) -> &Array4<f64> {
        &self.field_lines
    }

    pub fn magnetic_field(&self) -> Option<ArrayViewD<'_, f64>> {
        self.magnetic_field.as_ref().map(squeeze_surface_axis)
    }

    pub fn field_gradient(&self) -> Option<ArrayViewD<'_, f64>> {
        self.field_gradient.as_ref().map(squeeze_surface_axis)
    }

    /// Surface index of each position along the surface axis.
    pub fn surfaces(&self) -> &[usize] {
        &self.surfaces
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

/// Surface index encoded in a record file name: the trailing digits of its stem.
pub fn surface_index_from_path(path: &Path) -> FusionResult<usize> {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let digits = &stem[stem.trim_end_matches(|c: char| c.is_ascii_digit()).len()..];
    digits.parse().map_err(|_| {
        FusionError::SelectionFormat(format!(
            "cannot derive a surface index from '{}'",
            path.display()
        ))
    })
}

fn discover_surface_files(dir: &Path, exclude: &Path) -> FusionResult<BTreeMap<usize, PathBuf>> {
    let mut found = BTreeMap::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path == exclude || path.extension().and_then(|e| e.to_str()) != Some("npz") {
            continue;
        }
        if let Ok(surface) = surface_index_from_path(&path) {
            found.insert(surface, path);
        }
    }
    Ok(found)
}

fn stack_channel<'a, F>(slabs: &[&'a SurfaceSlabs], pick: F) -> FusionResult<Option<Array4<f64>>>
where
    F: Fn(&'a SurfaceSlabs) -> Option<&'a Array3<f64>>,
{
    let views: Option<Vec<ArrayView3<'a, f64>>> =
        slabs.iter().map(|&s| pick(s).map(|a| a.view())).collect();
    views
        .map(|v| stack(Axis(3), &v).map_err(|e| FusionError::Shape(e.to_string())))
        .transpose()
}

pub struct FieldLineStore {
    configuration: Option<String>,
    config: StoreConfig,
    metadata_path: PathBuf,
    data_dir: PathBuf,
    metadata: SurfaceMetadata,
    discovered: BTreeMap<usize, PathBuf>,
    entries: IndexMap<usize, SurfaceEntry>,
    lines: Selection,
    toroidal_range: Selection,
    direction: Direction,
    axes: Option<AxisPlan>,
    aggregate: Option<FieldLineData>,
    files_read: usize,
}

impl FieldLineStore {
    /// Store of a named configuration, located through `config`.
    pub fn open(configuration: &str, config: &StoreConfig) -> FusionResult<Self> {
        if !config.supports(configuration) {
            return Err(FusionError::UnknownConfiguration(configuration.to_string()));
        }
        let metadata_path = config.metadata_path(configuration);
        if !metadata_path.is_file() {
            return Err(FusionError::MissingMetadata(metadata_path));
        }
        Self::build(metadata_path, Some(configuration.to_string()), config)
    }

    /// Store rooted at an explicit metadata file, or a directory containing it.
    ///
    /// Without a configuration name, surface files are found by scanning the
    /// data directory for archives whose stem ends in the surface index.
    pub fn from_metadata_path(
        path: impl AsRef<Path>,
        configuration: Option<&str>,
        config: &StoreConfig,
    ) -> FusionResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FusionError::MissingDirectory(path.to_path_buf()));
        }
        let metadata_path = if path.is_dir() {
            path.join(&config.metadata_file)
        } else {
            path.to_path_buf()
        };
        if !metadata_path.is_file() {
            return Err(FusionError::MissingMetadata(metadata_path));
        }
        Self::build(metadata_path, configuration.map(str::to_string), config)
    }

    fn build(
        metadata_path: PathBuf,
        configuration: Option<String>,
        config: &StoreConfig,
    ) -> FusionResult<Self> {
        let root = metadata_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let metadata = SurfaceMetadata::read(&metadata_path)?;

        let subdir = root.join(&config.field_line_subdir);
        let data_dir = if subdir.is_dir() { subdir } else { root };
        let discovered = match configuration {
            Some(_) => BTreeMap::new(),
            None => discover_surface_files(&data_dir, &metadata_path)?,
        };
        debug!(
            "Field-line store at {} with {} surfaces",
            data_dir.display(),
            metadata.surface_count()
        );

        Ok(FieldLineStore {
            configuration,
            config: config.clone(),
            metadata_path,
            data_dir,
            metadata,
            discovered,
            entries: IndexMap::new(),
            lines: Selection::All,
            toroidal_range: Selection::All,
            direction: Direction::default(),
            axes: None,
            aggregate: None,
            files_read: 0,
        })
    }

    fn surface_path(&self, surface: usize) -> Option<PathBuf> {
        match &self.configuration {
            Some(configuration) => Some(
                self.data_dir
                    .join(self.config.surface_file_name(configuration, surface)),
            ),
            None => self.discovered.get(&surface).cloned(),
        }
    }

    fn select_all_surfaces(&mut self) {
        for surface in 0..self.metadata.surface_count() {
            let file = self.surface_path(surface);
            self.entries.insert(surface, SurfaceEntry::new(file, false));
        }
        self.aggregate = None;
    }

    fn invalidate_all(&mut self, reason: &str) {
        debug!("Invalidating field-line cache: {reason} changed");
        for entry in self.entries.values_mut() {
            entry.state = CacheState::Dirty;
            entry.slabs = None;
        }
        self.axes = None;
        self.aggregate = None;
    }

    /// Change the read selection.
    ///
    /// Every input is validated before anything changes, so a failed call
    /// leaves the store as it was.
    pub fn update_read_parameters(&mut self, params: ReadParameters) -> FusionResult<()> {
        let requested: Option<Vec<(usize, Option<PathBuf>)>> = match &params.surfaces {
            Some(SurfaceRequest::Selection(expr)) => {
                let indices =
                    parse_selection(expr.clone())?.resolve(self.metadata.surface_count())?;
                Some(
                    indices
                        .into_iter()
                        .map(|s| (s, self.surface_path(s)))
                        .collect(),
                )
            }
            Some(SurfaceRequest::Files(files)) => Some(
                files
                    .iter()
                    .map(|f| Ok((surface_index_from_path(f)?, Some(f.clone()))))
                    .collect::<FusionResult<_>>()?,
            ),
            None => None,
        };
        let lines = params.lines.clone().map(parse_selection).transpose()?;
        let toroidal_range = params.toroidal_range.clone().map(parse_selection).transpose()?;

        if let Some(direction) = params.direction {
            if direction != self.direction {
                self.direction = direction;
                self.invalidate_all("direction");
            }
        }
        if let Some(lines) = lines {
            if lines != self.lines {
                self.lines = lines;
                self.invalidate_all("line selection");
            }
        }
        if let Some(toroidal_range) = toroidal_range {
            if toroidal_range != self.toroidal_range {
                self.toroidal_range = toroidal_range;
                self.invalidate_all("toroidal range");
            }
        }

        match requested {
            Some(surfaces) if params.replace => {
                self.entries.clear();
                for (surface, file) in surfaces {
                    self.entries.insert(surface, SurfaceEntry::new(file, true));
                }
                self.axes = None;
                self.aggregate = None;
            }
            Some(surfaces) => {
                for (surface, file) in surfaces {
                    let entry = self
                        .entries
                        .entry(surface)
                        .or_insert_with(|| SurfaceEntry::new(file.clone(), true));
                    entry.explicit = true;
                    if entry.state == CacheState::Missing {
                        entry.state = CacheState::Dirty;
                        entry.file = file;
                    }
                }
                self.aggregate = None;
            }
            None if self.entries.is_empty() => self.select_all_surfaces(),
            None => {}
        }
        Ok(())
    }

    /// Read every dirty surface and return the aggregate.
    ///
    /// Surfaces whose record file is absent are skipped; the load fails with
    /// [`FusionError::NoData`] only when no selected surface is readable.
    pub fn load_data(
        &mut self,
        include_field: bool,
        include_gradient: bool,
    ) -> FusionResult<&FieldLineData> {
        if self.entries.is_empty() {
            self.select_all_surfaces();
        }
        let pending: Vec<usize> = self
            .entries
            .iter()
            .filter(|(_, e)| e.needs_read(include_field, include_gradient))
            .map(|(&s, _)| s)
            .collect();

        if !pending.is_empty() || self.aggregate.is_none() {
            self.aggregate = None;
            for surface in pending {
                self.load_surface(surface, include_field, include_gradient)?;
            }
            self.aggregate = Some(self.assemble()?);
        }
        self.aggregate
            .as_ref()
            .ok_or_else(|| FusionError::NoData("no surfaces selected".to_string()))
    }

    fn load_surface(
        &mut self,
        surface: usize,
        include_field: bool,
        include_gradient: bool,
    ) -> FusionResult<()> {
        let Some(entry) = self.entries.get(&surface) else {
            return Ok(());
        };
        let file = match &entry.file {
            Some(file) if file.is_file() => file.clone(),
            _ => {
                let explicit = entry.explicit;
                self.mark_missing(surface, explicit);
                return Ok(());
            }
        };
        let keep_field = entry
            .slabs
            .as_ref()
            .is_some_and(|s| s.magnetic_field.is_some());
        let keep_gradient = entry
            .slabs
            .as_ref()
            .is_some_and(|s| s.field_gradient.is_some());

        let slabs = self.read_slabs(
            &file,
            include_field || keep_field,
            include_gradient || keep_gradient,
        )?;
        if let Some(entry) = self.entries.get_mut(&surface) {
            entry.state = CacheState::Clean;
            entry.slabs = Some(slabs);
        }
        Ok(())
    }

    fn mark_missing(&mut self, surface: usize, explicit: bool) {
        let dir = self.data_dir.display();
        if explicit {
            warn!("Record of surface {surface} not found in {dir}, skipping");
        } else {
            debug!("Record of surface {surface} not found in {dir}, skipping");
        }
        if let Some(entry) = self.entries.get_mut(&surface) {
            entry.state = CacheState::Missing;
            entry.slabs = None;
        }
    }

    fn read_slabs(
        &mut self,
        file: &Path,
        include_field: bool,
        include_gradient: bool,
    ) -> FusionResult<SurfaceSlabs> {
        let mut record = SurfaceRecord::open(file)?;
        self.files_read += 1;
        debug!("Reading {} ({})", file.display(), self.direction);

        if self.axes.is_none() {
            self.axes = Some(record.plan_axes(&self.lines, &self.toroidal_range, self.direction)?);
        }
        let plan = self
            .axes
            .as_ref()
            .ok_or_else(|| FusionError::Shape("axis plan unavailable".to_string()))?;

        let field_lines = record.extract(Channel::FieldLines, self.direction, plan)?;
        let magnetic_field = if include_field {
            Some(record.extract(Channel::MagneticField, self.direction, plan)?)
        } else {
            None
        };
        let field_gradient = if include_gradient {
            Some(record.extract(Channel::FieldGradient, self.direction, plan)?)
        } else {
            None
        };
        Ok(SurfaceSlabs {
            field_lines,
            magnetic_field,
            field_gradient,
        })
    }

    fn assemble(&self) -> FusionResult<FieldLineData> {
        let mut surfaces = Vec::new();
        let mut files = Vec::new();
        let mut slabs = Vec::new();
        for (&surface, entry) in &self.entries {
            if let (CacheState::Clean, Some(s), Some(f)) = (entry.state, &entry.slabs, &entry.file)
            {
                surfaces.push(surface);
                files.push(f.clone());
                slabs.push(s);
            }
        }
        if slabs.is_empty() {
            return Err(FusionError::NoData(format!(
                "none of the {} selected surfaces could be read from {}",
                self.entries.len(),
                self.data_dir.display()
            )));
        }

        let field_lines = stack_channel(&slabs, |s| Some(&s.field_lines))?
            .ok_or_else(|| FusionError::NoData("no field-line slabs".to_string()))?;
        Ok(FieldLineData {
            surfaces,
            files,
            field_lines,
            magnetic_field: stack_channel(&slabs, |s| s.magnetic_field.as_ref())?,
            field_gradient: stack_channel(&slabs, |s| s.field_gradient.as_ref())?,
        })
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn data(&self) -> Option<&FieldLineData> {
        self.aggregate.as_ref()
    }

    pub fn field_lines(&self) -> Option<ArrayViewD<'_, f64>> {
        self.aggregate.as_ref().map(FieldLineData::field_lines)
    }

    pub fn field_lines_full(&self) -> Option<&Array4<f64>> {
        self.aggregate.as_ref().map(FieldLineData::field_lines_full)
    }

    pub fn magnetic_field(&self) -> Option<ArrayViewD<'_, f64>> {
        self.aggregate.as_ref().and_then(FieldLineData::magnetic_field)
    }

    pub fn field_gradient(&self) -> Option<ArrayViewD<'_, f64>> {
        self.aggregate.as_ref().and_then(FieldLineData::field_gradient)
    }

    /// Surfaces along the trailing axis of the last load.
    pub fn surfaces(&self) -> &[usize] {
        self.aggregate
            .as_ref()
            .map(FieldLineData::surfaces)
            .unwrap_or_default()
    }

    /// Record files of the surfaces along the trailing axis of the last load.
    pub fn surface_files(&self) -> &[PathBuf] {
        self.aggregate
            .as_ref()
            .map(FieldLineData::files)
            .unwrap_or_default()
    }

    /// Every selected surface, in selection order, readable or not.
    pub fn selected_surfaces(&self) -> Vec<usize> {
        self.entries.keys().copied().collect()
    }

    pub fn cache_state(&self, surface: usize) -> Option<CacheState> {
        self.entries.get(&surface).map(|e| e.state)
    }

    /// Metadata rows of the loaded surfaces.
    pub fn surface_info(&self) -> Vec<SurfaceInfo> {
        self.surfaces()
            .iter()
            .filter_map(|&s| self.metadata.info(s))
            .collect()
    }

    pub fn metadata(&self) -> &SurfaceMetadata {
        &self.metadata
    }

    pub fn metadata_path(&self) -> &Path {
        &self.metadata_path
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn configuration(&self) -> Option<&str> {
        self.configuration.as_deref()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of record files opened so far.
    pub fn files_read(&self) -> usize {
        self.files_read
    }
}
