// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::constants::SURFACE_INDEX_WIDTH;
use crate::error::FusionResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Placeholder for the magnetic configuration name in path templates.
pub const CONFIG_PLACEHOLDER: &str = "{config}";

/// Placeholder for the zero-padded surface index in file name templates.
pub const SURFACE_PLACEHOLDER: &str = "{surface}";

/// Where field-line data of each magnetic configuration lives on disk.
/// Every key is optional in JSON; missing keys take the W7-X defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Per-configuration root directory, with a `{config}` placeholder.
    pub root_template: String,
    /// Surface metadata archive inside the root directory.
    pub metadata_file: String,
    /// Subdirectory holding the surface records, preferred when present.
    pub field_line_subdir: String,
    /// Surface record file name, with `{config}` and `{surface}` placeholders.
    pub surface_file_template: String,
    /// Supported magnetic configuration names.
    pub configurations: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            root_template:
                "/data/W7-X/processed_data/flux_surfaces/{config}+252_detailed_w_o_limiters_w_o_torsion"
                    .to_string(),
            metadata_file: "fs_info.npz".to_string(),
            field_line_subdir: "field_lines".to_string(),
            surface_file_template: "field_lines_tor_ang_1.85_1turn_{config}+252_w_o_limiters_w_o_torsion_w_characteristics_surf_{surface}.npz"
                .to_string(),
            configurations: vec!["EIM".to_string(), "FTM".to_string(), "KJM001".to_string()],
        }
    }
}

impl StoreConfig {
    /// Load from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> FusionResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Store layout rooted at a fixed directory, e.g. a test fixture tree.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        StoreConfig {
            root_template: root.as_ref().to_string_lossy().into_owned(),
            ..Self::default()
        }
    }

    pub fn supports(&self, configuration: &str) -> bool {
        self.configurations.iter().any(|c| c == configuration)
    }

    /// Root directory of one configuration.
    pub fn root_dir(&self, configuration: &str) -> PathBuf {
        PathBuf::from(self.root_template.replace(CONFIG_PLACEHOLDER, configuration))
    }

    /// Default metadata location of one configuration.
    pub fn metadata_path(&self, configuration: &str) -> PathBuf {
        self.root_dir(configuration).join(&self.metadata_file)
    }

    /// Record file name of one surface, index zero-padded to three digits.
    pub fn surface_file_name(&self, configuration: &str, surface: usize) -> String {
        self.surface_file_template
            .replace(CONFIG_PLACEHOLDER, configuration)
            .replace(
                SURFACE_PLACEHOLDER,
                &format!("{surface:0width$}", width = SURFACE_INDEX_WIDTH),
            )
    }
}
