// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Calibration Catalog
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Text catalog of precalibrated camera views.
//!
//! ```text
//! W7X-AEQ20
//! W7X-AEQ31
//! !!!
//! W7X-AEQ20
//! shot: 20160308
//! cam: edicam
//!         {R0:6.34811, z0:-0.649178, theta0:1.21099, Rp:6.21, zp:0.81, thetap:-0.04, enh:1.63, alpha:3.14, xoff:-2.51, yoff:8.25, imsize:[1280, 1024]}
//! !!!
//! ```
//!
//! The leading index names the known viewpoints. Each block starts with a
//! viewpoint name, ends with `!!!`, and holds `shot:` / `cam:` pairs, each
//! followed by one parameter line.

use crate::projection::{
    CameraPose, ImageSize, LegacyStrategy, ProjectionEngine, ProjectionStrategy, ViewAppearance,
};
use fusion_types::error::{FusionError, FusionResult};
use std::collections::HashMap;
use std::path::Path;

const SENTINEL: &str = "!!!";

/// One calibrated (viewpoint, shot, camera) combination.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationEntry {
    pub viewpoint: String,
    pub shot: String,
    pub camera: String,
    pub pose: CameraPose,
    pub appearance: ViewAppearance,
    pub image_size: ImageSize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationCatalog {
    viewpoints: Vec<String>,
    entries: Vec<CalibrationEntry>,
}

impl CalibrationCatalog {
    pub fn from_file(path: impl AsRef<Path>) -> FusionResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> FusionResult<Self> {
        let mut lines = text.lines().map(str::trim).enumerate();
        let mut catalog = CalibrationCatalog::default();

        let mut closed = false;
        for (_, line) in lines.by_ref() {
            if line == SENTINEL {
                closed = true;
                break;
            }
            if !line.is_empty() {
                catalog.viewpoints.push(line.to_string());
            }
        }
        if !closed {
            return Err(FusionError::CalibrationFormat(
                "viewpoint index is not terminated by '!!!'".to_string(),
            ));
        }

        let mut block: Option<String> = None;
        let mut shot: Option<String> = None;
        let mut camera: Option<String> = None;
        for (number, line) in lines {
            let Some(viewpoint) = block.as_ref() else {
                if !line.is_empty() {
                    block = Some(line.to_string());
                }
                continue;
            };
            if line == SENTINEL {
                block = None;
                shot = None;
                camera = None;
            } else if let Some(value) = line.strip_prefix("shot:") {
                shot = Some(value.trim().to_string());
                camera = None;
            } else if let Some(value) = line.strip_prefix("cam:") {
                camera = shot.as_ref().map(|_| value.trim().to_string());
            } else if line.is_empty() {
                continue;
            } else if let (Some(s), Some(c)) = (shot.as_ref(), camera.take()) {
                let entry = parse_parameters(line)
                    .map_err(|e| {
                        FusionError::CalibrationFormat(format!("line {}: {e}", number + 1))
                    })?
                    .into_entry(viewpoint, s.clone(), c);
                catalog.entries.push(entry);
            }
        }
        Ok(catalog)
    }

    /// Viewpoints named in the index.
    pub fn viewpoints(&self) -> &[String] {
        &self.viewpoints
    }

    pub fn entries(&self) -> &[CalibrationEntry] {
        &self.entries
    }

    pub fn lookup(
        &self,
        viewpoint: &str,
        shot: &str,
        camera: &str,
    ) -> FusionResult<&CalibrationEntry> {
        if !self.viewpoints.iter().any(|v| v == viewpoint) {
            return Err(FusionError::Lookup(format!("no such view '{viewpoint}'")));
        }
        self.entries
            .iter()
            .find(|e| e.viewpoint == viewpoint && e.shot == shot && e.camera == camera)
            .ok_or_else(|| {
                FusionError::Lookup(format!(
                    "no parameters for view '{viewpoint}', shot {shot}, camera '{camera}'"
                ))
            })
    }
}

struct ParameterLine {
    pose: CameraPose,
    appearance: ViewAppearance,
    image_size: ImageSize,
}

impl ParameterLine {
    fn into_entry(self, viewpoint: &str, shot: String, camera: String) -> CalibrationEntry {
        CalibrationEntry {
            viewpoint: viewpoint.to_string(),
            shot,
            camera,
            pose: self.pose,
            appearance: self.appearance,
            image_size: self.image_size,
        }
    }
}

/// Split on commas outside brackets.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in body.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

fn parse_parameters(line: &str) -> Result<ParameterLine, String> {
    let body = line
        .trim()
        .strip_prefix('{')
        .and_then(|l| l.strip_suffix('}'))
        .ok_or_else(|| format!("parameters must be enclosed in braces: '{line}'"))?;

    let mut values: HashMap<String, &str> = HashMap::new();
    for part in split_top_level(body) {
        let (key, value) = part
            .split_once(':')
            .ok_or_else(|| format!("'{}' is not a key:value pair", part.trim()))?;
        values.insert(key.trim().to_ascii_lowercase(), value.trim());
    }

    let number = |key: &str| -> Result<f64, String> {
        let raw = values.get(key).ok_or_else(|| format!("missing '{key}'"))?;
        raw.parse::<f64>()
            .map_err(|_| format!("'{key}' is not a number: '{raw}'"))
    };

    let image_size = match values.get("imsize") {
        None => ImageSize::default(),
        Some(raw) => {
            let dims: Vec<usize> = raw
                .trim_start_matches('[')
                .trim_end_matches(']')
                .split(',')
                .map(|d| d.trim().parse::<usize>())
                .collect::<Result<_, _>>()
                .map_err(|_| format!("'imsize' must be [height, width]: '{raw}'"))?;
            match dims[..] {
                [height, width] => ImageSize { height, width },
                _ => return Err(format!("'imsize' must be [height, width]: '{raw}'")),
            }
        }
    };

    Ok(ParameterLine {
        pose: CameraPose {
            r0: number("r0")?,
            theta0: number("theta0")?,
            z0: number("z0")?,
            rp: number("rp")?,
            thetap: number("thetap")?,
            zp: number("zp")?,
        },
        appearance: ViewAppearance::new(
            number("enh")?,
            number("alpha")?,
            number("xoff")?,
            number("yoff")?,
        ),
        image_size,
    })
}

impl ProjectionEngine<LegacyStrategy> {
    /// Legacy-strategy engine for a catalogued view.
    pub fn from_catalog_file(
        path: impl AsRef<Path>,
        viewpoint: &str,
        shot: &str,
        camera: &str,
    ) -> FusionResult<Self> {
        let catalog = CalibrationCatalog::from_file(path)?;
        let entry = catalog.lookup(viewpoint, shot, camera)?;
        ProjectionEngine::from_entry(LegacyStrategy, entry)
    }
}

impl<S: ProjectionStrategy> ProjectionEngine<S> {
    pub fn from_entry(strategy: S, entry: &CalibrationEntry) -> FusionResult<Self> {
        Ok(ProjectionEngine::new(strategy, entry.pose, &entry.appearance)?
            .with_image_size(entry.image_size)
            .with_labels(&entry.viewpoint, &entry.shot, &entry.camera))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = "W7X-AEQ20
W7X-AEQ31
!!!
W7X-AEQ20
shot: 20160308
cam: edicam
        {R0:6.34811, z0:-0.649178, theta0:1.21099, Rp:6.21, zp:0.81, thetap:-0.04, enh:1.63, alpha:3.14, xoff:-2.51, yoff:8.25, l1:0.0, l2:0.0, l3:0.0, imsize:[1280, 1024]}
shot: 20160309
cam: photron
        {R0:6.3, z0:-0.6, theta0:1.2, Rp:6.2, zp:0.8, thetap:-0.05, enh:1.0, alpha:0.0, xoff:0.0, yoff:0.0, imsize:[1024, 1024]}
!!!
W7X-AEQ31
shot: 20160218
cam: edicam
        {R0:6.44669, z0:0.665888, theta0:2.54492, Rp:7.44, zp:0.48, thetap:4.01, enh:1.32, alpha:3.27, xoff:-2.41, yoff:-6.53}
!!!
";

    #[test]
    fn test_parse_catalog() {
        let catalog = CalibrationCatalog::parse(CATALOG).unwrap();
        assert_eq!(catalog.viewpoints(), &["W7X-AEQ20", "W7X-AEQ31"]);
        assert_eq!(catalog.entries().len(), 3);

        let e = catalog.lookup("W7X-AEQ20", "20160308", "edicam").unwrap();
        assert_eq!(e.pose.r0, 6.34811);
        assert_eq!(e.pose.theta0, 1.21099);
        assert_eq!(e.pose.z0, -0.649178);
        assert_eq!(e.appearance, ViewAppearance::new(1.63, 3.14, -2.51, 8.25));
        assert_eq!(
            e.image_size,
            ImageSize {
                height: 1280,
                width: 1024
            }
        );

        let p = catalog.lookup("W7X-AEQ20", "20160309", "photron").unwrap();
        assert_eq!(p.image_size.height, 1024);
        let a31 = catalog.lookup("W7X-AEQ31", "20160218", "edicam").unwrap();
        assert_eq!(a31.image_size, ImageSize::default());
    }

    #[test]
    fn test_lookup_errors() {
        let catalog = CalibrationCatalog::parse(CATALOG).unwrap();
        assert!(matches!(
            catalog.lookup("W7X-AEQ99", "20160308", "edicam"),
            Err(FusionError::Lookup(_))
        ));
        assert!(matches!(
            catalog.lookup("W7X-AEQ20", "20160308", "photron"),
            Err(FusionError::Lookup(_))
        ));
        assert!(matches!(
            catalog.lookup("W7X-AEQ31", "20160308", "edicam"),
            Err(FusionError::Lookup(_))
        ));
    }

    #[test]
    fn test_format_errors() {
        assert!(matches!(
            CalibrationCatalog::parse("W7X-AEQ20\n"),
            Err(FusionError::CalibrationFormat(_))
        ));
        let missing_key = "V\n!!!\nV\nshot: 1\ncam: c\n{R0:1, z0:0}\n!!!\n";
        assert!(matches!(
            CalibrationCatalog::parse(missing_key),
            Err(FusionError::CalibrationFormat(_))
        ));
        let bad_number = "V\n!!!\nV\nshot: 1\ncam: c\n{R0:x, z0:0, theta0:0, Rp:2, zp:0, thetap:0, enh:1, alpha:0, xoff:0, yoff:0}\n!!!\n";
        assert!(matches!(
            CalibrationCatalog::parse(bad_number),
            Err(FusionError::CalibrationFormat(_))
        ));
    }

    #[test]
    fn test_split_respects_brackets() {
        assert_eq!(
            split_top_level("a:1, imsize:[1, 2], b:3"),
            vec!["a:1", " imsize:[1, 2]", " b:3"]
        );
    }

    #[test]
    fn test_engine_from_catalog_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("views.txt");
        std::fs::write(&path, CATALOG).unwrap();

        let engine =
            ProjectionEngine::from_catalog_file(&path, "W7X-AEQ31", "20160218", "edicam").unwrap();
        assert_eq!(engine.viewpoint.as_deref(), Some("W7X-AEQ31"));
        assert_eq!(engine.camera.as_deref(), Some("edicam"));
        let (matrix, offset) = engine.view_parameters();
        assert!((matrix[[0, 0]] + 248.92937168).abs() < 1e-6);
        assert!((matrix[[1, 2]] + 249.24684727).abs() < 1e-6);
        assert!((offset[[0, 0]] + 748.3055).abs() < 1e-6);
        assert!((offset[[1, 0]] - 528.1164).abs() < 1e-6);

        assert!(matches!(
            ProjectionEngine::from_catalog_file(dir.path().join("none.txt"), "W7X-AEQ31", "1", "c"),
            Err(FusionError::Io(_))
        ));
    }
}
