use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Resumable upload chunks must be a multiple of this many bytes.
pub const UPLOAD_CHUNK_UNIT: u64 = 256 * 1024;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Settings {
    /// Bucket every path of the filesystem lives in
    pub bucket: String,
    pub selectors: SelectorConfig,
    pub upload: UploadConfig,
}

/// Field selectors sent with remote reads to keep responses small.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SelectorConfig {
    /// Selector for calls whose result is handed back to the caller
    pub default: String,
    /// Selector for existence probes
    pub probe: String,
    /// Selector for metadata-only fetches
    pub metadata: String,
    /// Selector for content length lookups
    pub length: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            default: "*".to_string(),
            probe: "name".to_string(),
            metadata: "metadata".to_string(),
            length: "size".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct UploadConfig {
    pub chunk_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size: UPLOAD_CHUNK_UNIT,
        }
    }
}

impl UploadConfig {
    /// Chunk size rounded down to a whole number of units, never below one unit.
    pub fn effective_chunk_size(&self) -> u64 {
        let adjusted = (self.chunk_size / UPLOAD_CHUNK_UNIT) * UPLOAD_CHUNK_UNIT;
        if adjusted != self.chunk_size {
            warn!(
                "Adjusted chunk size from {} to {} to meet {} byte unit",
                self.chunk_size,
                adjusted.max(UPLOAD_CHUNK_UNIT),
                UPLOAD_CHUNK_UNIT
            );
        }
        adjusted.max(UPLOAD_CHUNK_UNIT)
    }
}

impl Settings {
    pub fn for_bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    /// Load settings from `config_file_path`, writing defaults there if the
    /// file is missing or unreadable.
    pub fn new(config_file_path: &Path) -> Result<Self> {
        match Self::load_settings_from_file(config_file_path) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!("Error loading settings from file - creating default config: {}", e);
                let default = Self::default();
                default.save_to_file(config_file_path)?;
                Ok(default)
            }
        }
    }

    pub fn load_settings_from_file(config_file_path: &Path) -> Result<Self> {
        if !config_file_path.exists() {
            return Err(anyhow!("Config file not found"));
        }
        let data = fs::read_to_string(config_file_path)
            .with_context(|| format!("Failed to read {}", config_file_path.display()))?;
        let settings: Self = serde_json::from_str(&data).context("Failed to parse settings")?;
        Ok(settings)
    }

    pub fn save_to_file(&self, config_file_path: &Path) -> Result<()> {
        if let Some(parent_path) = config_file_path.parent() {
            fs::create_dir_all(parent_path).context("Failed to create config directory")?;
        }

        let data = serde_json::to_string_pretty(self)?;
        fs::write(config_file_path, data)?;
        Ok(())
    }
}
