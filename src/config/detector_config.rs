//! Detector configuration
//!
//! Supports loading config from (lowest to highest priority):
//! - Built-in defaults
//! - ~/.config/exodetect/config.toml
//! - exodetect.toml in the working directory, or an explicit path
//! - Environment variables (EXODETECT_MODEL_DIR, EXODETECT_MODEL_KIND)
//!
//! CLI flags are applied on top by the binary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::classifier::loader::{DEFAULT_MODEL_FILE, DEFAULT_SCALER_FILE};
use crate::classifier::model::ModelKind;
use crate::models::DEFAULT_TRANSIT_THRESHOLD;

pub const PROJECT_CONFIG_FILE: &str = "exodetect.toml";
pub const ENV_MODEL_DIR: &str = "EXODETECT_MODEL_DIR";
pub const ENV_MODEL_KIND: &str = "EXODETECT_MODEL_KIND";

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DetectorConfig {
    pub model: ModelConfig,
    pub detection: DetectionConfig,
}

/// Where the frozen artifacts live and how to read them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelConfig {
    pub dir: PathBuf,
    pub model_file: String,
    /// `None` disables scaling.
    pub scaler_file: Option<String>,
    pub kind: ModelKind,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            model_file: DEFAULT_MODEL_FILE.to_string(),
            scaler_file: Some(DEFAULT_SCALER_FILE.to_string()),
            kind: ModelKind::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionConfig {
    pub transit_threshold: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            transit_threshold: DEFAULT_TRANSIT_THRESHOLD,
        }
    }
}

// ---------------------------------------------------------------------------
// On-disk layer: every field optional so files only override what they set
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    model: ModelSection,
    #[serde(default)]
    detection: DetectionSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelSection {
    dir: Option<PathBuf>,
    model_file: Option<String>,
    scaler_file: Option<String>,
    kind: Option<ModelKind>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DetectionSection {
    transit_threshold: Option<f64>,
}

impl DetectorConfig {
    /// Load config from all sources.
    ///
    /// `explicit` replaces the project file lookup; it must exist and parse.
    /// The user and project files are best effort: a broken one is skipped
    /// with a warning.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = DetectorConfig::default();

        if let Some(path) = Self::user_config_path().filter(|p| p.exists()) {
            match read_file(&path) {
                Ok(file) => {
                    debug!("Loaded user config from {}", path.display());
                    config.merge(file);
                }
                Err(e) => warn!("Failed to load {}: {:#}", path.display(), e),
            }
        }

        match explicit {
            Some(path) => {
                let file = read_file(path)?;
                debug!("Loaded config from {}", path.display());
                config.merge(file);
            }
            None => {
                let path = Path::new(PROJECT_CONFIG_FILE);
                if path.exists() {
                    match read_file(path) {
                        Ok(file) => {
                            debug!("Loaded project config from {}", path.display());
                            config.merge(file);
                        }
                        Err(e) => warn!("Failed to load {}: {:#}", path.display(), e),
                    }
                }
            }
        }

        // Environment variables override files
        config.apply_env(|key| std::env::var(key).ok())?;

        Ok(config)
    }

    /// Parse a TOML document on top of the defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        let mut config = DetectorConfig::default();
        config.merge(file);
        Ok(config)
    }

    /// Get the user config file path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("exodetect").join("config.toml"))
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_MODEL_DIR).filter(|v| !v.is_empty()) {
            self.model.dir = PathBuf::from(dir);
        }
        if let Some(kind) = lookup(ENV_MODEL_KIND).filter(|v| !v.is_empty()) {
            self.model.kind = kind
                .parse()
                .map_err(|e: String| anyhow::anyhow!("{ENV_MODEL_KIND}: {e}"))?;
        }
        Ok(())
    }

    /// Merge a file layer into this config (file takes priority)
    fn merge(&mut self, other: ConfigFile) {
        if let Some(dir) = other.model.dir {
            self.model.dir = dir;
        }
        if let Some(model_file) = other.model.model_file {
            self.model.model_file = model_file;
        }
        if let Some(scaler_file) = other.model.scaler_file {
            // An empty name switches scaling off.
            self.model.scaler_file = Some(scaler_file).filter(|s| !s.is_empty());
        }
        if let Some(kind) = other.model.kind {
            self.model.kind = kind;
        }
        if let Some(threshold) = other.detection.transit_threshold {
            self.detection.transit_threshold = threshold;
        }
    }

    /// Write an example config to `path` unless one already exists.
    ///
    /// Returns `true` when a file was written.
    pub fn init(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        std::fs::write(path, EXAMPLE_CONFIG)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(true)
    }
}

fn read_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
}

const EXAMPLE_CONFIG: &str = r#"# exodetect configuration

[model]
# Directory holding the model artifacts
dir = "models"

# Classifier artifact inside `dir`
model_file = "exoplanet_model.json"

# Scaler artifact inside `dir`; set to "" to disable scaling
scaler_file = "scaler.json"

# Artifact format: "softmax", "gbdt" or "xgboost"
kind = "softmax"

[detection]
# Relative dip below the median flux reported as a transit signal
transit_threshold = 0.01
"#;
