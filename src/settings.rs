//! Persisted tagger settings.
//!
//! Settings live in a single JSON file next to the image and annotation
//! directories. A missing file means defaults; a malformed one is an error.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::MangalabelError;
use crate::tagging::TagFilter;

pub const DEFAULT_TAGGER_MODEL: &str = "SmilingWolf/wd-convnext-tagger-v3";
pub const DEFAULT_TAGGER_THRESHOLD: f32 = 0.6;
pub const DEFAULT_EXCLUDED_TAGS: &[&str] = &["blue skin", "colored skin", "青肌", "色付きの肌"];

/// Tagger configuration shared by every tag suggestion request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaggerSettings {
    #[serde(default = "default_model")]
    pub tagger_model: String,
    #[serde(default = "default_threshold")]
    pub tagger_threshold: f32,
    #[serde(default = "default_excluded")]
    pub excluded_tags: Vec<String>,
}

fn default_model() -> String {
    DEFAULT_TAGGER_MODEL.to_string()
}

fn default_threshold() -> f32 {
    DEFAULT_TAGGER_THRESHOLD
}

fn default_excluded() -> Vec<String> {
    DEFAULT_EXCLUDED_TAGS.iter().map(|s| s.to_string()).collect()
}

impl Default for TaggerSettings {
    fn default() -> Self {
        Self {
            tagger_model: default_model(),
            tagger_threshold: default_threshold(),
            excluded_tags: default_excluded(),
        }
    }
}

impl TaggerSettings {
    /// Checks the threshold range and that a model is named.
    pub fn validate(&self) -> Result<(), MangalabelError> {
        validate_threshold(self.tagger_threshold)?;
        if self.tagger_model.trim().is_empty() {
            return Err(MangalabelError::InvalidRequest {
                field: "tagger_model".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Builds a tag filter, preferring `threshold` over the stored one.
    pub fn tag_filter(&self, threshold: Option<f32>) -> TagFilter {
        TagFilter::new(threshold.unwrap_or(self.tagger_threshold)).excluding(&self.excluded_tags)
    }
}

/// Checks that a tag threshold lies in `[0, 1]`.
pub fn validate_threshold(threshold: f32) -> Result<(), MangalabelError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(MangalabelError::InvalidRequest {
            field: "threshold".to_string(),
            message: format!("{} is outside [0, 1]", threshold),
        })
    }
}

/// Reads settings from `path`, falling back to defaults when it does not exist.
pub fn load_settings(path: &Path) -> Result<TaggerSettings, MangalabelError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(TaggerSettings::default()),
        Err(source) => {
            return Err(MangalabelError::Storage {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let settings: TaggerSettings =
        serde_json::from_str(&text).map_err(|source| MangalabelError::SettingsParse {
            path: path.to_path_buf(),
            source,
        })?;
    settings.validate()?;
    Ok(settings)
}

/// Validates and writes settings to `path`.
pub fn save_settings(path: &Path, settings: &TaggerSettings) -> Result<(), MangalabelError> {
    settings.validate()?;
    let mut json =
        serde_json::to_string_pretty(settings).map_err(|source| MangalabelError::SettingsParse {
            path: path.to_path_buf(),
            source,
        })?;
    json.push('\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| MangalabelError::Storage {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, json).map_err(|source| MangalabelError::Storage {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), model = %settings.tagger_model, "settings saved");
    Ok(())
}
