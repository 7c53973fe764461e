//! Configuration for Hearth
//!
//! Settings come from a TOML file with environment overrides on top:
//!
//! ```toml
//! default_user = "dk"
//!
//! [categorization]
//! enable_learning_rules = true
//! enable_ai_categorization = false
//!
//! [import]
//! staging_ttl_hours = 24
//! preview_limit = 20
//! show_all_threshold = 200
//! default_paid_by = "DK"
//! ```
//!
//! Lookup order: explicit path, `$HEARTH_CONFIG`, then
//! `~/.local/share/hearth/config.toml` (platform data dir). Missing files
//! fall back to built-in defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Party;

/// Environment variable pointing at a config file
pub const CONFIG_ENV: &str = "HEARTH_CONFIG";

/// Runtime settings
#[derive(Debug, Clone, PartialEq)]
pub struct HearthConfig {
    /// User assumed when none is given on the command line
    pub default_user: String,
    /// Consult and reinforce learned rules
    pub enable_learning_rules: bool,
    /// Run the AI categorization extension point
    pub enable_ai_categorization: bool,
    /// Staged imports older than this are discarded
    pub staging_ttl_hours: i64,
    /// Rows shown in an import preview
    pub preview_limit: usize,
    /// Batches larger than this need an explicit "show all"
    pub show_all_threshold: usize,
    /// Payer assumed for spending rows left blank at confirm time
    pub default_paid_by: Option<Party>,
}

impl Default for HearthConfig {
    fn default() -> Self {
        Self {
            default_user: "me".to_string(),
            enable_learning_rules: true,
            enable_ai_categorization: false,
            staging_ttl_hours: 24,
            preview_limit: 20,
            show_all_threshold: 200,
            default_paid_by: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    default_user: Option<String>,
    categorization: Option<RawCategorization>,
    import: Option<RawImport>,
}

#[derive(Debug, Deserialize)]
struct RawCategorization {
    enable_learning_rules: Option<bool>,
    enable_ai_categorization: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawImport {
    staging_ttl_hours: Option<i64>,
    preview_limit: Option<usize>,
    show_all_threshold: Option<usize>,
    default_paid_by: Option<String>,
}

/// Default config location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("hearth").join("config.toml"))
}

impl HearthConfig {
    /// Load configuration (explicit path, then env, then default location)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let candidate = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .or_else(default_config_path);

        let mut config = match candidate {
            Some(p) if p.exists() => {
                debug!("Loading config from {}", p.display());
                let content = fs::read_to_string(&p)
                    .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;
                Self::from_toml(&content)?
            }
            _ => Self::default(),
        };

        config.apply_env();
        Ok(config)
    }

    /// Parse config from TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        let mut config = Self::default();

        if let Some(user) = raw.default_user.filter(|u| !u.trim().is_empty()) {
            config.default_user = user;
        }

        if let Some(cat) = raw.categorization {
            if let Some(enabled) = cat.enable_learning_rules {
                config.enable_learning_rules = enabled;
            }
            if let Some(enabled) = cat.enable_ai_categorization {
                config.enable_ai_categorization = enabled;
            }
        }

        if let Some(import) = raw.import {
            if let Some(ttl) = import.staging_ttl_hours {
                if ttl <= 0 {
                    return Err(Error::Config("staging_ttl_hours must be positive".into()));
                }
                config.staging_ttl_hours = ttl;
            }
            if let Some(limit) = import.preview_limit {
                config.preview_limit = limit;
            }
            if let Some(threshold) = import.show_all_threshold {
                config.show_all_threshold = threshold;
            }
            if let Some(payer) = import.default_paid_by {
                let party = payer.parse::<Party>().map_err(Error::Config)?;
                config.default_paid_by = Some(party);
            }
        }

        Ok(config)
    }

    /// Apply HEARTH_* environment overrides
    fn apply_env(&mut self) {
        if let Ok(user) = std::env::var("HEARTH_USER") {
            if !user.trim().is_empty() {
                self.default_user = user;
            }
        }
        if let Some(ttl) = std::env::var("HEARTH_STAGING_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
        {
            self.staging_ttl_hours = ttl;
        }
        if let Ok(value) = std::env::var("HEARTH_ENABLE_LEARNING") {
            self.enable_learning_rules = !matches!(value.as_str(), "0" | "false" | "no" | "off");
        }
    }
}
