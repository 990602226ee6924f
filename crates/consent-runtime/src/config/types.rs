//! Configuration types.
//!
//! All types implement [`Default`] for compile-time fallback values.

use consent_hook::RulesConfig;
use serde::{Deserialize, Serialize};

/// Main configuration structure.
///
/// This is the unified configuration after merging all layers.
///
/// # Example
///
/// ```
/// use consent_runtime::config::ConsentConfig;
///
/// let config = ConsentConfig::default();
/// assert!(config.enabled);
/// assert_eq!(config.paging.default_page_size, 20);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConsentConfig {
    /// Whether consent filtering is active. When off, responses pass
    /// through untouched and no modifier is rejected.
    pub enabled: bool,

    /// Declarative consent rules.
    pub rules: RulesConfig,

    /// Partition settings.
    pub partition: PartitionConfig,

    /// Paging settings.
    pub paging: PagingConfig,

    /// Query modifier policy.
    pub modifiers: ModifiersConfig,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rules: RulesConfig::default(),
            partition: PartitionConfig::default(),
            paging: PagingConfig::default(),
            modifiers: ModifiersConfig::default(),
        }
    }
}

impl ConsentConfig {
    /// Creates a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes to TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserializes from TOML string.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Merges another config into this one.
    ///
    /// Values from `other` override values in `self` only if they
    /// differ from the default. Rules merge by id.
    pub fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.enabled != default.enabled {
            self.enabled = other.enabled;
        }

        self.rules.merge(&other.rules);
        self.partition.merge(&other.partition);
        self.paging.merge(&other.paging);
        self.modifiers.merge(&other.modifiers);
    }
}

/// Partition configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PartitionConfig {
    /// Concrete id the default-partition sentinel resolves to.
    /// `None` keeps the sentinel (unpartitioned storage).
    pub default_partition_id: Option<i32>,
}

impl PartitionConfig {
    fn merge(&mut self, other: &Self) {
        if other.default_partition_id.is_some() {
            self.default_partition_id = other.default_partition_id;
        }
    }
}

/// Paging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PagingConfig {
    /// Page size when the request does not ask for one.
    pub default_page_size: usize,

    /// Upper bound on the requested page size.
    pub max_page_size: usize,

    /// Number of searches kept for follow-up pages.
    pub max_stored_searches: usize,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            max_stored_searches: 10,
        }
    }
}

impl PagingConfig {
    /// Effective page size for a request.
    ///
    /// Falls back to the default, never exceeds the maximum, never zero.
    #[must_use]
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size)
            .max(1)
    }

    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.default_page_size != default.default_page_size {
            self.default_page_size = other.default_page_size;
        }
        if other.max_page_size != default.max_page_size {
            self.max_page_size = other.max_page_size;
        }
        if other.max_stored_searches != default.max_stored_searches {
            self.max_stored_searches = other.max_stored_searches;
        }
    }
}

/// Which count-style query modifiers are refused while filtering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModifiersConfig {
    /// Refuse `_total=accurate`.
    pub reject_accurate_total: bool,

    /// Refuse `_summary=count`.
    pub reject_summary_count: bool,
}

impl Default for ModifiersConfig {
    fn default() -> Self {
        Self {
            reject_accurate_total: true,
            reject_summary_count: true,
        }
    }
}

impl ModifiersConfig {
    fn merge(&mut self, other: &Self) {
        let default = Self::default();

        if other.reject_accurate_total != default.reject_accurate_total {
            self.reject_accurate_total = other.reject_accurate_total;
        }
        if other.reject_summary_count != default.reject_summary_count {
            self.reject_summary_count = other.reject_summary_count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consent_hook::{ConsentPoint, RuleAction, RuleDef};

    #[test]
    fn defaults() {
        let config = ConsentConfig::default();
        assert!(config.enabled);
        assert!(config.rules.rules.is_empty());
        assert_eq!(config.partition.default_partition_id, None);
        assert_eq!(config.paging.max_page_size, 100);
        assert_eq!(config.paging.max_stored_searches, 10);
        assert!(config.modifiers.reject_accurate_total);
        assert!(config.modifiers.reject_summary_count);
    }

    #[test]
    fn toml_roundtrip() {
        let mut config = ConsentConfig::default();
        config.partition.default_partition_id = Some(1);
        config.rules.rules.push(RuleDef::new(
            "hide-b",
            ConsentPoint::WillSeeResource,
            "Patient/PTB",
            RuleAction::Reject,
        ));

        let toml = config.to_toml().expect("config should serialize");
        let parsed = ConsentConfig::from_toml(&toml).expect("serialized config should parse");
        assert_eq!(config, parsed);
    }

    #[test]
    fn parse_partial_toml() {
        let config = ConsentConfig::from_toml(
            r#"
[paging]
default_page_size = 1

[[rules.rules]]
id = "hide-a"
point = "will_see_resource"
pattern = "Patient/PTA"
action = "reject"
diagnostic = "A DIAG"
"#,
        )
        .expect("partial config should parse");

        assert!(config.enabled);
        assert_eq!(config.paging.default_page_size, 1);
        assert_eq!(config.paging.max_page_size, 100);
        assert_eq!(config.rules.rules.len(), 1);
        assert_eq!(config.rules.rules[0].diagnostic.as_deref(), Some("A DIAG"));
    }

    #[test]
    fn merge_only_overrides_non_defaults() {
        let mut base = ConsentConfig::default();
        base.paging.default_page_size = 5;
        base.partition.default_partition_id = Some(3);

        let mut overlay = ConsentConfig::default();
        overlay.enabled = false;
        overlay.modifiers.reject_summary_count = false;

        base.merge(&overlay);

        assert!(!base.enabled);
        assert_eq!(base.paging.default_page_size, 5);
        assert_eq!(base.partition.default_partition_id, Some(3));
        assert!(base.modifiers.reject_accurate_total);
        assert!(!base.modifiers.reject_summary_count);
    }

    #[test]
    fn page_size_clamps() {
        let paging = PagingConfig::default();
        assert_eq!(paging.page_size(None), 20);
        assert_eq!(paging.page_size(Some(5)), 5);
        assert_eq!(paging.page_size(Some(500)), 100);
        assert_eq!(paging.page_size(Some(0)), 1);
    }
}
