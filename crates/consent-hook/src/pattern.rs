//! Resource pattern matching.
//!
//! Patterns address resources by type and logical id:
//!
//! ```text
//! PATTERN := <type> [ "/" <id> ]
//! ```
//!
//! Either segment may be `*`. A pattern without an id segment matches
//! every resource of the type, with or without an id.

use crate::ConsentError;
use consent_types::ResourceNode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single segment of a resource pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatternSegment {
    /// Matches exactly the given string.
    Exact(String),
    /// Matches any string.
    Wildcard,
}

impl PatternSegment {
    /// Returns `true` if this segment matches the given value.
    #[must_use]
    pub fn matches(&self, value: &str) -> bool {
        match self {
            Self::Exact(s) => s == value,
            Self::Wildcard => true,
        }
    }
}

impl fmt::Display for PatternSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(s) => f.write_str(s),
            Self::Wildcard => f.write_str("*"),
        }
    }
}

/// A parsed resource pattern.
///
/// # Examples
///
/// ```text
/// "*"            → any resource
/// "Patient"      → any Patient
/// "Patient/*"    → any Patient (id may be missing)
/// "Patient/PTA"  → exactly Patient/PTA
/// "*/PTA"        → id PTA of any type
/// "Bundle"       → containers
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePattern {
    /// Resource type segment.
    pub resource_type: PatternSegment,
    /// Optional id segment.
    pub id: Option<PatternSegment>,
}

impl ResourcePattern {
    /// Pattern matching every resource.
    #[must_use]
    pub fn any() -> Self {
        Self {
            resource_type: PatternSegment::Wildcard,
            id: None,
        }
    }

    /// Parses a pattern string.
    ///
    /// # Errors
    ///
    /// Returns [`ConsentError::InvalidPattern`] for empty input, empty
    /// segments or more than one `/`.
    pub fn parse(pattern: &str) -> Result<Self, ConsentError> {
        if pattern.is_empty() {
            return Err(ConsentError::InvalidPattern("empty pattern".into()));
        }

        let (type_part, id_part) = match pattern.split_once('/') {
            Some((ty, id)) => (ty, Some(id)),
            None => (pattern, None),
        };

        if type_part.is_empty() {
            return Err(ConsentError::InvalidPattern(format!(
                "empty resource type in '{pattern}'"
            )));
        }

        let id = match id_part {
            Some("") => {
                return Err(ConsentError::InvalidPattern(format!(
                    "empty id in '{pattern}'"
                )));
            }
            Some(id) if id.contains('/') => {
                return Err(ConsentError::InvalidPattern(format!(
                    "too many segments in '{pattern}'"
                )));
            }
            Some(id) => Some(parse_segment(id)),
            None => None,
        };

        Ok(Self {
            resource_type: parse_segment(type_part),
            id,
        })
    }

    /// Returns `true` if the pattern's type segment matches.
    #[must_use]
    pub fn matches_type(&self, resource_type: &str) -> bool {
        self.resource_type.matches(resource_type)
    }

    /// Returns `true` if the pattern matches the resource.
    #[must_use]
    pub fn matches(&self, resource: &ResourceNode) -> bool {
        if !self.matches_type(resource.resource_type()) {
            return false;
        }

        match (&self.id, resource.id()) {
            (None, _) | (Some(PatternSegment::Wildcard), _) => true,
            (Some(pattern), Some(id)) => pattern.matches(id),
            (Some(PatternSegment::Exact(_)), None) => false,
        }
    }
}

impl fmt::Display for ResourcePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource_type)?;
        if let Some(ref id) = self.id {
            write!(f, "/{id}")?;
        }
        Ok(())
    }
}

fn parse_segment(s: &str) -> PatternSegment {
    if s == "*" {
        PatternSegment::Wildcard
    } else {
        PatternSegment::Exact(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consent_types::{Container, Resource};

    fn patient(id: &str) -> ResourceNode {
        Resource::new("Patient", id).into()
    }

    // ── Parsing ──────────────────────────────────────────────

    #[test]
    fn parse_type_only() {
        let p = ResourcePattern::parse("Patient").expect("type-only pattern should parse");
        assert_eq!(p.resource_type, PatternSegment::Exact("Patient".into()));
        assert_eq!(p.id, None);
    }

    #[test]
    fn parse_type_and_id() {
        let p = ResourcePattern::parse("Patient/PTA").expect("full pattern should parse");
        assert_eq!(p.id, Some(PatternSegment::Exact("PTA".into())));
    }

    #[test]
    fn parse_wildcards() {
        assert_eq!(
            ResourcePattern::parse("*").expect("wildcard should parse"),
            ResourcePattern::any()
        );
        let p = ResourcePattern::parse("*/PTA").expect("type wildcard should parse");
        assert_eq!(p.resource_type, PatternSegment::Wildcard);
    }

    #[test]
    fn parse_errors() {
        for bad in ["", "/PTA", "Patient/", "Patient/a/b"] {
            assert!(ResourcePattern::parse(bad).is_err(), "expected error for {bad:?}");
        }
    }

    // ── Matching ─────────────────────────────────────────────

    #[test]
    fn match_exact() {
        let p = ResourcePattern::parse("Patient/PTA").expect("pattern should parse");
        assert!(p.matches(&patient("PTA")));
        assert!(!p.matches(&patient("PTB")));
    }

    #[test]
    fn match_type_only_accepts_any_id() {
        let p = ResourcePattern::parse("Patient").expect("pattern should parse");
        assert!(p.matches(&patient("PTA")));
        assert!(!p.matches(&Resource::new("Observation", "1").into()));
    }

    #[test]
    fn match_container() {
        let p = ResourcePattern::parse("Bundle").expect("pattern should parse");
        assert!(p.matches(&Container::searchset(vec![]).into()));
        assert!(!p.matches(&patient("PTA")));
    }

    #[test]
    fn exact_id_requires_id() {
        let p = ResourcePattern::parse("Bundle/b1").expect("pattern should parse");
        assert!(!p.matches(&Container::searchset(vec![]).into()));
        assert!(p.matches(&Container::searchset(vec![]).with_id("b1").into()));
    }

    #[test]
    fn display_roundtrip() {
        for s in ["*", "Patient", "Patient/*", "Patient/PTA", "*/PTA"] {
            let p = ResourcePattern::parse(s).expect("pattern should parse");
            assert_eq!(p.to_string(), s, "display roundtrip failed for {s}");
        }
    }
}
