// ⚙️ Application configuration
// Defaults, optionally replaced by a JSON file, then overridden by STONES_* variables

use crate::parser::ColumnLayout;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the JSON config file
pub const CONFIG_PATH_VAR: &str = "STONES_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory standing in for the drive
    pub drive_root: PathBuf,

    /// Folder holding the batch workbook
    pub folder_id: String,

    /// Exact workbook name (matched after whitespace normalization)
    pub batch_file_name: String,

    /// Drive folder receiving exported summaries
    pub upload_folder: String,

    /// Local directory receiving exported summaries
    pub export_dir: PathBuf,

    pub database_path: PathBuf,

    /// HTTP bind address for the server binary
    pub server_addr: String,

    /// Signed-in operator; none means signed out
    pub operator: Option<String>,

    pub layout: ColumnLayout,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            drive_root: PathBuf::from("drive"),
            folder_id: "batches".to_string(),
            batch_file_name: "Batch Movement  .xls".to_string(),
            upload_folder: "StonesForever".to_string(),
            export_dir: PathBuf::from("exports"),
            database_path: PathBuf::from("stones.db"),
            server_addr: "0.0.0.0:3000".to_string(),
            operator: Some("operator".to_string()),
            layout: ColumnLayout::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: AppConfig = serde_json::from_str(&content)
            .context("Failed to parse config JSON")?;

        Ok(config)
    }

    /// File named by `STONES_CONFIG` (or defaults), then environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => AppConfig::from_file(path)?,
            Err(_) => AppConfig::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("STONES_DRIVE_ROOT") {
            self.drive_root = PathBuf::from(v);
        }
        if let Some(v) = lookup("STONES_FOLDER_ID") {
            self.folder_id = v;
        }
        if let Some(v) = lookup("STONES_BATCH_FILE") {
            self.batch_file_name = v;
        }
        if let Some(v) = lookup("STONES_UPLOAD_FOLDER") {
            self.upload_folder = v;
        }
        if let Some(v) = lookup("STONES_EXPORT_DIR") {
            self.export_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("STONES_DB") {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("STONES_ADDR") {
            self.server_addr = v;
        }
        if let Some(v) = lookup("STONES_OPERATOR") {
            self.operator = if v.trim().is_empty() { None } else { Some(v) };
        }
    }
}
