//! Configuration management with hierarchical layering.
//!
//! # Architecture
//!
//! ```text
//! Priority (highest to lowest):
//!
//! ┌───────────────────────────────────────────┐
//! │  1. Environment Variables (CONSENT_*)     │  Runtime override
//! ├───────────────────────────────────────────┤
//! │  2. Project Config (.consent/config.toml) │  Project-specific
//! ├───────────────────────────────────────────┤
//! │  3. Global Config (~/.consent/config.toml)│  Deployment defaults
//! ├───────────────────────────────────────────┤
//! │  4. Default Values (compile-time)         │  Fallback
//! └───────────────────────────────────────────┘
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Config Field | Type |
//! |----------|--------------|------|
//! | `CONSENT_ENABLED` | `enabled` | bool |
//! | `CONSENT_DEFAULT_PARTITION` | `partition.default_partition_id` | i32 |
//! | `CONSENT_PAGE_SIZE` | `paging.default_page_size` | usize |
//!
//! # Example Configuration
//!
//! ```toml
//! enabled = true
//!
//! [partition]
//! default_partition_id = 1
//!
//! [paging]
//! default_page_size = 20
//! max_page_size = 100
//! max_stored_searches = 10
//!
//! [modifiers]
//! reject_accurate_total = true
//! reject_summary_count = true
//!
//! [[rules.rules]]
//! id = "hide-inactive"
//! point = "will_see_resource"
//! pattern = "Patient/PTB"
//! action = "reject"
//! diagnostic = "record withheld"
//! ```

mod error;
mod loader;
mod types;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::{ConsentConfig, ModifiersConfig, PagingConfig, PartitionConfig};

/// Default global config directory.
pub fn default_config_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".consent")
}

/// Default global config file path.
pub fn default_config_path() -> std::path::PathBuf {
    default_config_dir().join("config.toml")
}

/// Project config directory name.
pub const PROJECT_CONFIG_DIR: &str = ".consent";

/// Project config file name.
pub const PROJECT_CONFIG_FILE: &str = "config.toml";
