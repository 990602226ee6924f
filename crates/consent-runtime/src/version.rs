//! Resource identity and latest-version lookup.
//!
//! Storage answers through an [`IdentityResolver`]. The
//! [`ResourceVersionService`] normalises the partition scope before
//! asking, and [`CachingResolver`] remembers positive answers.

use crate::config::PartitionConfig;
use consent_types::{RequestPartition, ResourceId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Storage identity of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedIdentity {
    /// The unversioned external id.
    pub resource_id: ResourceId,
    /// Internal persistent id.
    pub persistent_id: i64,
    /// Latest version.
    pub version: u64,
}

impl ResolvedIdentity {
    #[must_use]
    pub fn new(resource_id: ResourceId, persistent_id: i64, version: u64) -> Self {
        Self {
            resource_id: resource_id.to_unversioned(),
            persistent_id,
            version,
        }
    }

    /// The versioned id of the latest version.
    #[must_use]
    pub fn versioned_id(&self) -> ResourceId {
        self.resource_id.clone().with_version(self.version)
    }
}

/// Maps external ids to storage identities.
///
/// Ids without an answer do not exist in the given partition scope.
pub trait IdentityResolver: Send + Sync {
    /// Resolves `ids` within `partition`.
    fn resolve(&self, partition: &RequestPartition, ids: &[ResourceId]) -> Vec<ResolvedIdentity>;
}

/// Latest versions keyed by unversioned id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceVersionMap {
    entries: HashMap<ResourceId, ResolvedIdentity>,
}

impl ResourceVersionMap {
    fn from_identities(identities: Vec<ResolvedIdentity>) -> Self {
        Self {
            entries: identities
                .into_iter()
                .map(|identity| (identity.resource_id.clone(), identity))
                .collect(),
        }
    }

    /// Returns `true` if `id` exists. The version of `id` is ignored.
    #[must_use]
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.entries.contains_key(&id.to_unversioned())
    }

    /// The identity of `id`, if it exists.
    #[must_use]
    pub fn get(&self, id: &ResourceId) -> Option<&ResolvedIdentity> {
        self.entries.get(&id.to_unversioned())
    }

    /// Latest version of `id`, if it exists.
    #[must_use]
    pub fn version(&self, id: &ResourceId) -> Option<u64> {
        self.get(id).map(|identity| identity.version)
    }

    /// Persistent id of `id`, if it exists.
    #[must_use]
    pub fn persistent_id(&self, id: &ResourceId) -> Option<i64> {
        self.get(id).map(|identity| identity.persistent_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the existing ids.
    pub fn ids(&self) -> impl Iterator<Item = &ResourceId> {
        self.entries.keys()
    }
}

/// Partition settings used to normalise the default sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionSettings {
    /// Concrete id of the default partition, if partitioning is on.
    pub default_partition_id: Option<i32>,
}

impl PartitionSettings {
    #[must_use]
    pub fn from_config(config: &PartitionConfig) -> Self {
        Self {
            default_partition_id: config.default_partition_id,
        }
    }
}

/// Answers "which of these ids exist, and at which version".
pub struct ResourceVersionService {
    resolver: Arc<dyn IdentityResolver>,
    partitions: PartitionSettings,
}

impl ResourceVersionService {
    #[must_use]
    pub fn new(resolver: Arc<dyn IdentityResolver>, partitions: PartitionSettings) -> Self {
        Self {
            resolver,
            partitions,
        }
    }

    /// Replaces the default-partition sentinel with the configured
    /// partition id. Every other scope passes through unchanged.
    #[must_use]
    pub fn replace_default(&self, partition: &RequestPartition) -> RequestPartition {
        match (partition, self.partitions.default_partition_id) {
            (RequestPartition::Default, Some(id)) => RequestPartition::single(id),
            _ => partition.clone(),
        }
    }

    /// Latest versions of the ids that exist. Missing ids are absent
    /// from the map.
    #[must_use]
    pub fn latest_versions(
        &self,
        partition: &RequestPartition,
        ids: &[ResourceId],
    ) -> ResourceVersionMap {
        if ids.is_empty() {
            return ResourceVersionMap::default();
        }

        let partition = self.replace_default(partition);
        let unversioned: Vec<ResourceId> = ids.iter().map(ResourceId::to_unversioned).collect();
        let found = self.resolver.resolve(&partition, &unversioned);
        debug!(
            partition = %partition,
            requested = unversioned.len(),
            found = found.len(),
            "resolved latest versions"
        );
        ResourceVersionMap::from_identities(found)
    }
}

impl std::fmt::Debug for ResourceVersionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceVersionService")
            .field("partitions", &self.partitions)
            .finish_non_exhaustive()
    }
}

/// Caches positive answers of another resolver per (partition, id).
///
/// Misses are never cached: a resource created later must become
/// visible.
pub struct CachingResolver {
    inner: Arc<dyn IdentityResolver>,
    cache: RwLock<HashMap<(RequestPartition, ResourceId), ResolvedIdentity>>,
}

impl CachingResolver {
    #[must_use]
    pub fn new(inner: Arc<dyn IdentityResolver>) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Drops every cached entry for `id`, e.g. after an update.
    pub fn invalidate(&self, id: &ResourceId) {
        let id = id.to_unversioned();
        self.cache.write().retain(|(_, cached), _| *cached != id);
    }

    /// Drops the whole cache.
    pub fn clear(&self) {
        self.cache.write().clear();
    }

    /// Number of cached entries.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.read().len()
    }
}

impl IdentityResolver for CachingResolver {
    fn resolve(&self, partition: &RequestPartition, ids: &[ResourceId]) -> Vec<ResolvedIdentity> {
        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        {
            let cache = self.cache.read();
            for id in ids {
                match cache.get(&(partition.clone(), id.clone())) {
                    Some(identity) => found.push(identity.clone()),
                    None => missing.push(id.clone()),
                }
            }
        }

        if missing.is_empty() {
            return found;
        }

        let resolved = self.inner.resolve(partition, &missing);
        {
            let mut cache = self.cache.write();
            for identity in &resolved {
                cache.insert(
                    (partition.clone(), identity.resource_id.clone()),
                    identity.clone(),
                );
            }
        }
        found.extend(resolved);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Resolver backed by a fixed table, counting lookups.
    struct TableResolver {
        rows: Vec<ResolvedIdentity>,
        calls: Mutex<Vec<(RequestPartition, usize)>>,
    }

    impl TableResolver {
        fn new(rows: Vec<ResolvedIdentity>) -> Self {
            Self {
                rows,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl IdentityResolver for TableResolver {
        fn resolve(&self, partition: &RequestPartition, ids: &[ResourceId]) -> Vec<ResolvedIdentity> {
            self.calls.lock().push((partition.clone(), ids.len()));
            self.rows
                .iter()
                .filter(|row| ids.contains(&row.resource_id))
                .cloned()
                .collect()
        }
    }

    fn red() -> ResourceId {
        ResourceId::new("Patient", "RED")
    }

    fn blue() -> ResourceId {
        ResourceId::new("Patient", "BLUE")
    }

    fn service(table: &Arc<TableResolver>, default_partition_id: Option<i32>) -> ResourceVersionService {
        ResourceVersionService::new(
            table.clone(),
            PartitionSettings {
                default_partition_id,
            },
        )
    }

    // ── Latest versions ─────────────────────────────────────

    #[test]
    fn existing_resource_has_version() {
        let table = Arc::new(TableResolver::new(vec![ResolvedIdentity::new(red(), 1, 2)]));
        let map = service(&table, None).latest_versions(&RequestPartition::All, &[red()]);

        assert!(map.contains(&red()));
        assert_eq!(map.version(&red()), Some(2));
        assert_eq!(map.persistent_id(&red()), Some(1));
        assert_eq!(
            map.get(&red()).map(ResolvedIdentity::versioned_id),
            Some(red().with_version(2))
        );
    }

    #[test]
    fn missing_resource_gives_empty_map() {
        let table = Arc::new(TableResolver::new(vec![]));
        let map = service(&table, None).latest_versions(&RequestPartition::All, &[red()]);
        assert!(map.is_empty());
    }

    #[test]
    fn only_existing_ids_are_returned() {
        let table = Arc::new(TableResolver::new(vec![ResolvedIdentity::new(red(), 1, 2)]));
        let map = service(&table, None).latest_versions(&RequestPartition::All, &[red(), blue()]);

        assert_eq!(map.len(), 1);
        assert!(map.contains(&red()));
        assert!(!map.contains(&blue()));
    }

    #[test]
    fn versioned_request_ids_match_unversioned() {
        let table = Arc::new(TableResolver::new(vec![ResolvedIdentity::new(red(), 1, 3)]));
        let map = service(&table, None)
            .latest_versions(&RequestPartition::All, &[red().with_version(1)]);
        assert_eq!(map.version(&red().with_version(1)), Some(3));
    }

    #[test]
    fn empty_request_skips_storage() {
        let table = Arc::new(TableResolver::new(vec![]));
        service(&table, None).latest_versions(&RequestPartition::All, &[]);
        assert!(table.calls.lock().is_empty());
    }

    // ── Partitions ──────────────────────────────────────────

    #[test]
    fn replace_default_all_partitions_unchanged() {
        let table = Arc::new(TableResolver::new(vec![]));
        let svc = service(&table, Some(1));
        assert_eq!(svc.replace_default(&RequestPartition::All), RequestPartition::All);
    }

    #[test]
    fn replace_default_partition() {
        let table = Arc::new(TableResolver::new(vec![]));
        let svc = service(&table, Some(1));
        let outcome = svc.replace_default(&RequestPartition::Default);
        assert_eq!(outcome.partition_ids()[0], 1);
    }

    #[test]
    fn default_kept_without_configured_partition() {
        let table = Arc::new(TableResolver::new(vec![]));
        let svc = service(&table, None);
        assert_eq!(
            svc.replace_default(&RequestPartition::Default),
            RequestPartition::Default
        );
    }

    #[test]
    fn lookup_uses_normalised_partition() {
        let table = Arc::new(TableResolver::new(vec![]));
        service(&table, Some(4)).latest_versions(&RequestPartition::Default, &[red()]);
        assert_eq!(table.calls.lock()[0].0, RequestPartition::single(4));
    }

    // ── Cache ───────────────────────────────────────────────

    #[test]
    fn cache_serves_hits_and_retries_misses() {
        let table = Arc::new(TableResolver::new(vec![ResolvedIdentity::new(red(), 1, 2)]));
        let caching = CachingResolver::new(table.clone());

        let first = caching.resolve(&RequestPartition::All, &[red(), blue()]);
        assert_eq!(first.len(), 1);
        assert_eq!(caching.cached(), 1);

        let second = caching.resolve(&RequestPartition::All, &[red(), blue()]);
        assert_eq!(second.len(), 1);

        // Second call only asked storage for the miss.
        let calls = table.calls.lock().clone();
        assert_eq!(calls, vec![(RequestPartition::All, 2), (RequestPartition::All, 1)]);
    }

    #[test]
    fn cache_is_per_partition() {
        let table = Arc::new(TableResolver::new(vec![ResolvedIdentity::new(red(), 1, 2)]));
        let caching = CachingResolver::new(table.clone());

        caching.resolve(&RequestPartition::All, &[red()]);
        caching.resolve(&RequestPartition::single(1), &[red()]);
        assert_eq!(table.calls.lock().len(), 2);
        assert_eq!(caching.cached(), 2);
    }

    #[test]
    fn invalidate_and_clear() {
        let table = Arc::new(TableResolver::new(vec![ResolvedIdentity::new(red(), 1, 2)]));
        let caching = CachingResolver::new(table.clone());
        caching.resolve(&RequestPartition::All, &[red()]);
        caching.resolve(&RequestPartition::single(1), &[red()]);

        caching.invalidate(&red().with_version(2));
        assert_eq!(caching.cached(), 0);

        caching.resolve(&RequestPartition::All, &[red()]);
        caching.clear();
        assert_eq!(caching.cached(), 0);
    }
}
