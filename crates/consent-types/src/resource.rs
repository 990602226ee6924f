//! Resource tree model.
//!
//! A response is a tree of [`ResourceNode`]s: single resources and
//! containers (bundles) whose entries are themselves nodes.
//!
//! ```text
//! Container (searchset)
//!   ├── Resource  Patient/PTA
//!   ├── Resource  Patient/PTB
//!   └── Container (nested bundle)
//!         └── Resource  Observation/1
//! ```
//!
//! The JSON shape follows the usual bundle layout so documents read by
//! the CLI can be fed through unchanged:
//!
//! ```json
//! {"resourceType": "Bundle", "type": "searchset", "total": 2,
//!  "link": [{"relation": "next", "url": "..."}],
//!  "entry": [{"resource": {"resourceType": "Patient", "id": "PTA"}}]}
//! ```

use crate::ResourceId;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

/// Resource type name used for containers.
pub const CONTAINER_TYPE: &str = "Bundle";

/// Resource type name used for diagnostic payloads.
pub const DIAGNOSTIC_TYPE: &str = "OperationOutcome";

/// A single (non-container) resource.
///
/// Everything except `resourceType` and `id` is kept as opaque JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource type, e.g. `"Patient"`.
    #[serde(rename = "resourceType")]
    pub resource_type: String,

    /// Logical id, absent for transient resources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Remaining resource content.
    #[serde(flatten)]
    pub content: Map<String, Value>,
}

impl Resource {
    /// Creates an empty resource of the given type and id.
    #[must_use]
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: Some(id.into()),
            content: Map::new(),
        }
    }

    /// Adds (or overwrites) a content field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.content.insert(key.into(), value);
        self
    }

    /// Builds a diagnostic payload explaining a rejection.
    ///
    /// ```
    /// use consent_types::Resource;
    ///
    /// let diag = Resource::diagnostic("A DIAG");
    /// assert!(diag.is_diagnostic());
    /// assert_eq!(diag.diagnostics(), Some("A DIAG"));
    /// ```
    #[must_use]
    pub fn diagnostic(text: impl Into<String>) -> Self {
        let mut content = Map::new();
        content.insert(
            "issue".into(),
            json!([{
                "severity": "error",
                "code": "forbidden",
                "diagnostics": text.into(),
            }]),
        );
        Self {
            resource_type: DIAGNOSTIC_TYPE.into(),
            id: None,
            content,
        }
    }

    /// Returns `true` if this is a diagnostic payload.
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        self.resource_type == DIAGNOSTIC_TYPE
    }

    /// Returns the first issue's diagnostics text of a diagnostic payload.
    #[must_use]
    pub fn diagnostics(&self) -> Option<&str> {
        self.content
            .get("issue")?
            .as_array()?
            .first()?
            .get("diagnostics")?
            .as_str()
    }

    /// Returns the typed id, if the resource has one.
    #[must_use]
    pub fn resource_id(&self) -> Option<ResourceId> {
        self.id
            .as_ref()
            .map(|id| ResourceId::new(self.resource_type.clone(), id.clone()))
    }
}

/// Navigation link of a page (`self`, `next`, `previous`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    /// Link relation.
    pub relation: String,
    /// Target URL or page token.
    pub url: String,
}

impl PageLink {
    /// Creates a link.
    #[must_use]
    pub fn new(relation: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            url: url.into(),
        }
    }
}

/// A container (bundle) of ordered entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "BundleRepr", try_from = "BundleRepr")]
pub struct Container {
    /// Logical id of the container.
    pub id: Option<String>,
    /// Bundle kind, e.g. `"searchset"`.
    pub kind: Option<String>,
    /// Total match count, when the producer computed one.
    pub total: Option<u64>,
    /// Navigation links.
    pub links: Vec<PageLink>,
    /// Entries in document order.
    pub entries: Vec<ResourceNode>,
}

impl Container {
    /// Creates a search result container over `entries`.
    #[must_use]
    pub fn searchset(entries: Vec<ResourceNode>) -> Self {
        Self {
            id: None,
            kind: Some("searchset".into()),
            total: None,
            links: Vec::new(),
            entries,
        }
    }

    /// Sets the container id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the total count.
    #[must_use]
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    /// Appends a navigation link.
    #[must_use]
    pub fn with_link(mut self, link: PageLink) -> Self {
        self.links.push(link);
        self
    }

    /// Returns the link with the given relation.
    #[must_use]
    pub fn link(&self, relation: &str) -> Option<&PageLink> {
        self.links.iter().find(|l| l.relation == relation)
    }
}

#[derive(Serialize, Deserialize)]
struct BundleRepr {
    #[serde(rename = "resourceType")]
    resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total: Option<u64>,
    #[serde(rename = "link", default, skip_serializing_if = "Vec::is_empty")]
    links: Vec<PageLink>,
    #[serde(rename = "entry", default, skip_serializing_if = "Vec::is_empty")]
    entries: Vec<EntryRepr>,
}

#[derive(Serialize, Deserialize)]
struct EntryRepr {
    resource: ResourceNode,
}

impl From<Container> for BundleRepr {
    fn from(c: Container) -> Self {
        Self {
            resource_type: CONTAINER_TYPE.into(),
            id: c.id,
            kind: c.kind,
            total: c.total,
            links: c.links,
            entries: c
                .entries
                .into_iter()
                .map(|resource| EntryRepr { resource })
                .collect(),
        }
    }
}

impl TryFrom<BundleRepr> for Container {
    type Error = String;

    fn try_from(repr: BundleRepr) -> Result<Self, Self::Error> {
        if repr.resource_type != CONTAINER_TYPE {
            return Err(format!(
                "expected resourceType '{CONTAINER_TYPE}', got '{}'",
                repr.resource_type
            ));
        }
        Ok(Self {
            id: repr.id,
            kind: repr.kind,
            total: repr.total,
            links: repr.links,
            entries: repr.entries.into_iter().map(|e| e.resource).collect(),
        })
    }
}

/// Any unit of content subject to a visibility decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResourceNode {
    /// A single resource.
    Resource(Resource),
    /// A container of further nodes.
    Container(Container),
}

impl ResourceNode {
    /// Returns the resource type (`"Bundle"` for containers).
    #[must_use]
    pub fn resource_type(&self) -> &str {
        match self {
            Self::Resource(r) => &r.resource_type,
            Self::Container(_) => CONTAINER_TYPE,
        }
    }

    /// Returns the logical id.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Resource(r) => r.id.as_deref(),
            Self::Container(c) => c.id.as_deref(),
        }
    }

    /// Returns `true` for containers.
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Container(_))
    }

    /// Returns the single resource, if this is one.
    #[must_use]
    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            Self::Resource(r) => Some(r),
            Self::Container(_) => None,
        }
    }

    /// Returns the container, if this is one.
    #[must_use]
    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Self::Container(c) => Some(c),
            Self::Resource(_) => None,
        }
    }

    /// Human-readable label for logs, e.g. `Patient/PTA` or `Bundle/-`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}/{}", self.resource_type(), self.id().unwrap_or("-"))
    }
}

impl From<Resource> for ResourceNode {
    fn from(r: Resource) -> Self {
        Self::Resource(r)
    }
}

impl From<Container> for ResourceNode {
    fn from(c: Container) -> Self {
        Self::Container(c)
    }
}

impl<'de> Deserialize<'de> for ResourceNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let is_container = value
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or_else(|| D::Error::missing_field("resourceType"))?
            == CONTAINER_TYPE;

        if is_container {
            serde_json::from_value(value)
                .map(Self::Container)
                .map_err(D::Error::custom)
        } else {
            serde_json::from_value(value)
                .map(Self::Resource)
                .map_err(D::Error::custom)
        }
    }
}
