//! Configuration loader with hierarchical merging.
//!
//! # Load Order
//!
//! 1. Default values (compile-time)
//! 2. Global config (`~/.consent/config.toml`, or an explicit file)
//! 3. Project config (`.consent/config.toml`)
//! 4. Environment variables (`CONSENT_*`)
//!
//! Each layer overrides the previous. Rules are validated once, after
//! the last layer.

use super::{default_config_path, ConfigError, ConsentConfig, PROJECT_CONFIG_DIR, PROJECT_CONFIG_FILE};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration loader with builder pattern.
///
/// # Example
///
/// ```ignore
/// use consent_runtime::config::ConfigLoader;
///
/// let config = ConfigLoader::new()
///     .with_config_file("/etc/consent.toml")
///     .with_project_root("/path/to/project")
///     .skip_env_vars()  // For testing
///     .load()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Global config file path (defaults to ~/.consent/config.toml).
    config_path: Option<PathBuf>,

    /// Project root directory.
    project_root: Option<PathBuf>,

    /// Skip environment variable loading.
    skip_env: bool,

    /// Skip global config loading.
    skip_global: bool,

    /// Skip project config loading.
    skip_project: bool,
}

impl ConfigLoader {
    /// Creates a new loader with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `path` instead of the global config file.
    ///
    /// Unlike the global default, an explicit file must exist.
    #[must_use]
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Sets the project root directory.
    ///
    /// Project config will be loaded from `<project_root>/.consent/config.toml`.
    #[must_use]
    pub fn with_project_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.project_root = Some(path.into());
        self
    }

    /// Skips environment variable loading.
    ///
    /// Useful for testing with deterministic config.
    #[must_use]
    pub fn skip_env_vars(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Skips global config loading.
    #[must_use]
    pub fn skip_global_config(mut self) -> Self {
        self.skip_global = true;
        self
    }

    /// Skips project config loading.
    #[must_use]
    pub fn skip_project_config(mut self) -> Self {
        self.skip_project = true;
        self
    }

    /// Loads and merges configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a config file exists but cannot be
    /// parsed, an explicit config file is missing, an env var holds an
    /// invalid value, or the merged rules do not validate.
    pub fn load(&self) -> Result<ConsentConfig, ConfigError> {
        let mut config = ConsentConfig::default();

        // Layer 1: explicit or global config
        if let Some(ref path) = self.config_path {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
            let file_config =
                ConsentConfig::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;
            debug!(path = %path.display(), "Loaded config file");
            config.merge(&file_config);
        } else if !self.skip_global {
            let global_path = default_config_path();
            if let Some(global_config) = self.load_file(&global_path)? {
                debug!(path = %global_path.display(), "Loaded global config");
                config.merge(&global_config);
            }
        }

        // Layer 2: Project config
        if !self.skip_project {
            if let Some(ref project_root) = self.project_root {
                let project_config_path = project_root
                    .join(PROJECT_CONFIG_DIR)
                    .join(PROJECT_CONFIG_FILE);

                if let Some(project_config) = self.load_file(&project_config_path)? {
                    debug!(
                        path = %project_config_path.display(),
                        project = %project_root.display(),
                        "Loaded project config"
                    );
                    config.merge(&project_config);
                }
            }
        }

        // Layer 3: Environment variables
        if !self.skip_env {
            apply_env_vars(&mut config)?;
        }

        let errors = config.rules.validate_all();
        if !errors.is_empty() {
            return Err(ConfigError::InvalidRules(errors));
        }

        Ok(config)
    }

    /// Loads a config file, returning None if it doesn't exist.
    fn load_file(&self, path: &Path) -> Result<Option<ConsentConfig>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;

        let config =
            ConsentConfig::from_toml(&content).map_err(|e| ConfigError::parse_toml(path, e))?;

        Ok(Some(config))
    }
}

/// Applies environment variable overrides.
fn apply_env_vars(config: &mut ConsentConfig) -> Result<(), ConfigError> {
    if let Ok(val) = std::env::var("CONSENT_ENABLED") {
        config.enabled = parse_bool(&val)
            .ok_or_else(|| ConfigError::invalid_env_var("CONSENT_ENABLED", "expected bool"))?;
    }

    if let Ok(val) = std::env::var("CONSENT_DEFAULT_PARTITION") {
        let id = val.trim().parse::<i32>().map_err(|_| {
            ConfigError::invalid_env_var("CONSENT_DEFAULT_PARTITION", "expected integer")
        })?;
        config.partition.default_partition_id = Some(id);
    }

    if let Ok(val) = std::env::var("CONSENT_PAGE_SIZE") {
        let size = val
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ConfigError::invalid_env_var("CONSENT_PAGE_SIZE", "expected positive integer")
            })?;
        config.paging.default_page_size = size;
    }

    Ok(())
}

/// Parses a boolean from string.
///
/// Accepts: "true", "false", "1", "0", "yes", "no", "on", "off" (case-insensitive).
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
