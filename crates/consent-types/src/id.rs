//! Identifier types.
//!
//! - [`OperationId`]: one logical request/response cycle (one per page)
//! - [`SearchId`]: a stored search whose pages are served independently
//! - [`ResourceId`]: `Type/id[/_history/version]` address of a resource

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Identifier of a single consent operation.
///
/// A fresh id is minted for every operation, including every page of
/// a paginated search, so lifecycle records never collide.
///
/// ```
/// use consent_types::OperationId;
///
/// let a = OperationId::new();
/// let b = OperationId::new();
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(pub Uuid);

impl OperationId {
    /// Creates a new id with a random UUID v4.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op:{}", self.0)
    }
}

/// Identifier of a stored search result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchId(pub Uuid);

impl SearchId {
    /// Creates a new id with a random UUID v4.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SearchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SearchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for SearchId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| IdError::InvalidSearchId(s.to_string()))
    }
}

/// Errors from parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// Resource id is not of the form `Type/id`.
    #[error("invalid resource id: {0}")]
    InvalidResourceId(String),

    /// Search id is not a UUID.
    #[error("invalid search id: {0}")]
    InvalidSearchId(String),
}

/// Address of a resource: type, logical id and optional version.
///
/// # Format
///
/// ```text
/// Patient/RED
/// Patient/RED/_history/2
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    /// Resource type, e.g. `"Patient"`.
    pub resource_type: String,
    /// Logical id within the type.
    pub id_part: String,
    /// Version, when the id is version-specific.
    pub version: Option<u64>,
}

impl ResourceId {
    /// Creates an unversioned id.
    #[must_use]
    pub fn new(resource_type: impl Into<String>, id_part: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id_part: id_part.into(),
            version: None,
        }
    }

    /// Returns a copy pinned to `version`.
    #[must_use]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    /// Returns the id with the version stripped.
    #[must_use]
    pub fn to_unversioned(&self) -> Self {
        Self {
            resource_type: self.resource_type.clone(),
            id_part: self.id_part.clone(),
            version: None,
        }
    }

    /// Parses `Type/id` or `Type/id/_history/version`.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidResourceId`] for any other shape.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        let invalid = || IdError::InvalidResourceId(s.to_string());
        let parts: Vec<&str> = s.split('/').collect();

        match parts.as_slice() {
            [ty, id] if !ty.is_empty() && !id.is_empty() => Ok(Self::new(*ty, *id)),
            [ty, id, "_history", version] if !ty.is_empty() && !id.is_empty() => {
                let version = version.parse::<u64>().map_err(|_| invalid())?;
                Ok(Self::new(*ty, *id).with_version(version))
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.id_part)?;
        if let Some(version) = self.version {
            write!(f, "/_history/{version}")?;
        }
        Ok(())
    }
}

impl FromStr for ResourceId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_ids_are_unique() {
        assert_ne!(OperationId::new(), OperationId::new());
        assert!(OperationId::new().to_string().starts_with("op:"));
    }

    #[test]
    fn search_id_parses_its_display_form() {
        let id = SearchId::new();
        let parsed: SearchId = id.to_string().parse().expect("display form should parse");
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<SearchId>().is_err());
    }

    #[test]
    fn parse_unversioned() {
        let id = ResourceId::parse("Patient/RED").expect("plain id should parse");
        assert_eq!(id.resource_type, "Patient");
        assert_eq!(id.id_part, "RED");
        assert_eq!(id.version, None);
    }

    #[test]
    fn parse_versioned() {
        let id = ResourceId::parse("Patient/RED/_history/2").expect("versioned id should parse");
        assert_eq!(id.version, Some(2));
        assert_eq!(id.to_unversioned(), ResourceId::new("Patient", "RED"));
        assert_eq!(id.to_string(), "Patient/RED/_history/2");
    }

    #[test]
    fn parse_rejects_malformed() {
        for bad in ["", "Patient", "Patient/", "/RED", "Patient/RED/_history/x", "a/b/c"] {
            assert!(ResourceId::parse(bad).is_err(), "expected error for {bad:?}");
        }
    }
}
