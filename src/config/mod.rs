//! Configuration types for the terrain tools.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Folder substrings that never produce library entries (vehicles, weapons, UI, ...).
pub const DEFAULT_BLACKLIST: &[&str] = &[
    "air",
    "weapons",
    "characters",
    "soft",
    "armor",
    "animals",
    "anim",
    "proxies",
    "particleeffects",
    "modules",
    "\\data_f",
    "curator",
    "\\boat",
    "\\static",
    "\\ui",
    "tracked",
    "wheeled",
    "proxy",
];

/// Configuration for walking a work drive into library files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizeConfig {
    /// Work drive root; model paths are stored relative to it
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Case-insensitive substrings of relative paths to skip
    #[serde(default = "default_blacklist")]
    pub blacklist: Vec<String>,

    /// Folder receiving the generated `.tml` files
    #[serde(default = "default_library_output")]
    pub output: PathBuf,
}

fn default_root() -> PathBuf {
    PathBuf::from("P:/")
}

fn default_blacklist() -> Vec<String> {
    DEFAULT_BLACKLIST.iter().map(|s| s.to_string()).collect()
}

fn default_library_output() -> PathBuf {
    PathBuf::from("Library")
}

impl Default for CategorizeConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            blacklist: default_blacklist(),
            output: default_library_output(),
        }
    }
}

/// Configuration for the nearby filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyConfig {
    /// Removal radius in meters (inclusive)
    #[serde(default = "default_nearby_radius")]
    pub radius: f64,
}

fn default_nearby_radius() -> f64 {
    4.0
}

impl Default for NearbyConfig {
    fn default() -> Self {
        Self {
            radius: default_nearby_radius(),
        }
    }
}

/// Configuration for laying out one placeholder object per template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectsConfig {
    /// Distance between generated objects
    #[serde(default = "default_spacing")]
    pub spacing: f64,

    /// Grid origin, far outside any playable area
    #[serde(default = "default_origin")]
    pub origin: [f64; 2],
}

fn default_spacing() -> f64 {
    25.0
}

fn default_origin() -> [f64; 2] {
    [200_000.0, 0.0]
}

impl Default for ObjectsConfig {
    fn default() -> Self {
        Self {
            spacing: default_spacing(),
            origin: default_origin(),
        }
    }
}

/// Configuration for scattering extra objects around existing ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraObjectsConfig {
    /// Objects added per matching record
    #[serde(default = "default_amount")]
    pub amount: usize,

    /// Maximum distance from the matching record
    #[serde(default = "default_extra_radius")]
    pub radius: f64,

    #[serde(default = "default_scale_min")]
    pub scale_min: f64,

    #[serde(default = "default_scale_max")]
    pub scale_max: f64,
}

fn default_amount() -> usize {
    2
}

fn default_extra_radius() -> f64 {
    2.0
}

fn default_scale_min() -> f64 {
    0.5
}

fn default_scale_max() -> f64 {
    2.0
}

impl Default for ExtraObjectsConfig {
    fn default() -> Self {
        Self {
            amount: default_amount(),
            radius: default_extra_radius(),
            scale_min: default_scale_min(),
            scale_max: default_scale_max(),
        }
    }
}

/// Configuration for unpacking PBO archives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// External unpacking executable
    #[serde(default = "default_tool")]
    pub tool: String,

    /// Archive name substrings skipped in terrain mode
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    /// Archive name substrings skipped in every mode
    #[serde(default = "default_ignore_always")]
    pub ignore_always: Vec<String>,

    /// Archive name substrings kept in whitelist mode
    #[serde(default = "default_whitelist")]
    pub whitelist: Vec<String>,

    /// File extensions kept when only models are copied
    #[serde(default = "default_model_extensions")]
    pub model_extensions: Vec<String>,
}

fn default_tool() -> String {
    "extractPBO".to_string()
}

fn default_ignore() -> Vec<String> {
    ["anims", "dubbing", "language", "missions", "ui_"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_ignore_always() -> Vec<String> {
    vec!["dubbing".to_string()]
}

fn default_whitelist() -> Vec<String> {
    [
        "ww2_terrainsif_",
        "ww2_terrainsww2_",
        "ww2_terrainsi44_",
        "ww2_objects_",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_model_extensions() -> Vec<String> {
    vec!["p3d".to_string(), "cpp".to_string()]
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            tool: default_tool(),
            ignore: default_ignore(),
            ignore_always: default_ignore_always(),
            whitelist: default_whitelist(),
            model_extensions: default_model_extensions(),
        }
    }
}

/// Main configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub categorize: CategorizeConfig,

    #[serde(default)]
    pub nearby: NearbyConfig,

    #[serde(default)]
    pub objects: ObjectsConfig,

    #[serde(default)]
    pub extra_objects: ExtraObjectsConfig,

    #[serde(default)]
    pub extract: ExtractConfig,
}

impl ToolsConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: ToolsConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
