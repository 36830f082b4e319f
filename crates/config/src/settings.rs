// Application settings
// Loaded from ~/.config/cdb/settings.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use cdb_core::schema::header_problem;
use cdb_core::{BwColumns, C11Columns};

use crate::error::ConfigError;

/// Upper bound for `upload.cooldown_days` (about a century).
pub const MAX_COOLDOWN_DAYS: i64 = 36_500;

/// Who may upload, and how often.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Days a non-privileged actor waits between uploads
    pub cooldown_days: i64,

    /// Groups whose members may view and upload
    pub allowed_groups: Vec<String>,

    /// Failed attempts start the cooldown too
    pub count_failed_uploads: bool,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            cooldown_days: 7,
            allowed_groups: vec!["C-Level".into(), "Sales".into()],
            count_failed_uploads: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// SQLite file; None = platform data dir
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// flexi_logger spec string, e.g. "info" or "warn, cdb_store=debug"
    pub level: String,

    /// Write rotating log files here instead of stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            directory: None,
        }
    }
}

/// Header names expected in the two source exports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSettings {
    pub c11: C11Columns,
    pub bw: BwColumns,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub upload: UploadSettings,
    pub store: StoreSettings,
    pub logging: LoggingSettings,
    pub columns: ColumnSettings,
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cdb")
            .join("settings.toml")
    }

    /// Load and validate settings. A missing file yields the defaults; a file
    /// that exists but does not parse is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=MAX_COOLDOWN_DAYS).contains(&self.upload.cooldown_days) {
            return Err(ConfigError::Invalid(format!(
                "upload.cooldown_days must be between 0 and {} (got {})",
                MAX_COOLDOWN_DAYS, self.upload.cooldown_days
            )));
        }
        if let Some(problem) = header_problem(&self.columns.c11.headers()) {
            return Err(ConfigError::Invalid(format!("columns.c11: {problem}")));
        }
        if let Some(problem) = header_problem(&self.columns.bw.headers()) {
            return Err(ConfigError::Invalid(format!("columns.bw: {problem}")));
        }
        Ok(())
    }

    /// Effective SQLite path.
    pub fn store_path(&self) -> PathBuf {
        match &self.store.path {
            Some(path) => path.clone(),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("cdb")
                .join("cdb.sqlite3"),
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
