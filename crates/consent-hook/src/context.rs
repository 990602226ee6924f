//! Operation context: data passed to every consent decision.

use consent_types::{OperationId, SearchId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// What kind of request an operation serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Read of a single resource.
    Read,
    /// First page of a search.
    Search,
    /// A follow-up page of a stored search.
    Page,
    /// Capability/metadata query.
    Metadata,
    /// Server-level operation (e.g. `$meta`).
    SystemOperation,
}

impl OperationKind {
    /// Returns `true` for kinds that bypass consent checks entirely.
    ///
    /// Exempt operations still receive a success completion.
    #[must_use]
    pub fn is_exempt(&self) -> bool {
        matches!(self, Self::Metadata | Self::SystemOperation)
    }

    /// Returns `true` for kinds that produce search result containers.
    #[must_use]
    pub fn is_search(&self) -> bool {
        matches!(self, Self::Search | Self::Page)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Read => "read",
            Self::Search => "search",
            Self::Page => "page",
            Self::Metadata => "metadata",
            Self::SystemOperation => "system_operation",
        };
        f.write_str(s)
    }
}

/// Position of a page inside a stored search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// The stored search the page belongs to.
    pub search_id: SearchId,
    /// Offset of the first entry on the page.
    pub offset: usize,
    /// Requested page size.
    pub count: usize,
}

/// Context of one logical operation.
///
/// Created at request entry and owned by the pipeline invocation. A
/// paginated search gets a fresh context (and [`OperationId`]) per page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    /// Unique id of this operation.
    pub operation_id: OperationId,

    /// Operation kind tag.
    pub kind: OperationKind,

    /// Resource type addressed by the request, if any.
    pub resource_type: Option<String>,

    /// Request query parameters (`_total`, `_summary`, `_count`, ...).
    pub params: BTreeMap<String, Vec<String>>,

    /// Who is asking, when known.
    pub principal: Option<String>,

    /// Page position for `Page` operations.
    pub page: Option<PageInfo>,

    /// Free-form request attributes for policies.
    pub metadata: HashMap<String, Value>,
}

impl OperationContext {
    /// Creates a context with a fresh operation id.
    #[must_use]
    pub fn new(kind: OperationKind) -> Self {
        Self {
            operation_id: OperationId::new(),
            kind,
            resource_type: None,
            params: BTreeMap::new(),
            principal: None,
            page: None,
            metadata: HashMap::new(),
        }
    }

    /// Search over `resource_type`.
    #[must_use]
    pub fn search(resource_type: impl Into<String>) -> Self {
        Self::new(OperationKind::Search).with_resource_type(resource_type)
    }

    /// Read of a resource of `resource_type`.
    #[must_use]
    pub fn read(resource_type: impl Into<String>) -> Self {
        Self::new(OperationKind::Read).with_resource_type(resource_type)
    }

    /// Capability/metadata query.
    #[must_use]
    pub fn metadata() -> Self {
        Self::new(OperationKind::Metadata)
    }

    /// Sets the resource type.
    #[must_use]
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    /// Appends a query parameter value.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Sets the requesting principal.
    #[must_use]
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = Some(principal.into());
        self
    }

    /// Marks this as a page of a stored search.
    #[must_use]
    pub fn with_page(mut self, page: PageInfo) -> Self {
        self.kind = OperationKind::Page;
        self.page = Some(page);
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns the first value of a query parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns all values of a query parameter.
    #[must_use]
    pub fn param_values(&self, name: &str) -> &[String] {
        self.params.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns `true` if consent checks are bypassed for this operation.
    #[must_use]
    pub fn is_exempt(&self) -> bool {
        self.kind.is_exempt()
    }
}
