//! Paginated search.
//!
//! A search stores its full candidate list once; every page is served
//! as an independent operation with its own `start_operation` and its
//! own completion. Nothing decided on one page carries to the next.

use crate::config::PagingConfig;
use crate::{ConsentPipeline, ConsentResponse, PagingError, PipelineError};
use consent_hook::{OperationContext, OperationKind, PageInfo};
use consent_types::{Container, PageLink, ResourceNode, SearchId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::error::Error;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// A search result set kept for follow-up pages.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSearch {
    /// Search id handed out in page links.
    pub id: SearchId,
    /// Resource type searched.
    pub resource_type: Option<String>,
    /// Original request parameters.
    pub params: BTreeMap<String, Vec<String>>,
    /// Every candidate, unfiltered, in result order.
    pub entries: Vec<ResourceNode>,
}

impl StoredSearch {
    /// Captures `entries` for the search described by `ctx`.
    #[must_use]
    pub fn new(ctx: &OperationContext, entries: Vec<ResourceNode>) -> Self {
        Self {
            id: SearchId::new(),
            resource_type: ctx.resource_type.clone(),
            params: ctx.params.clone(),
            entries,
        }
    }

    /// Number of stored candidates.
    #[must_use]
    pub fn total(&self) -> usize {
        self.entries.len()
    }
}

/// Storage for search result sets.
pub trait PageStore: Send + Sync {
    /// Stores a search, returning its id.
    fn store(&self, search: StoredSearch) -> SearchId;

    /// Looks up a stored search.
    fn get(&self, id: SearchId) -> Option<Arc<StoredSearch>>;

    /// Removes a stored search. Returns `true` if it existed.
    fn remove(&self, id: SearchId) -> bool;

    /// Number of stored searches.
    fn len(&self) -> usize;

    /// Returns `true` if nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded in-memory store; the oldest search is evicted first.
#[derive(Debug)]
pub struct FifoPageStore {
    capacity: usize,
    searches: Mutex<VecDeque<Arc<StoredSearch>>>,
}

impl FifoPageStore {
    /// Creates a store holding at most `capacity` searches (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            searches: Mutex::new(VecDeque::new()),
        }
    }
}

impl PageStore for FifoPageStore {
    fn store(&self, search: StoredSearch) -> SearchId {
        let id = search.id;
        let mut searches = self.searches.lock();
        while searches.len() >= self.capacity {
            if let Some(evicted) = searches.pop_front() {
                debug!(search = %evicted.id, "evicting stored search");
            }
        }
        searches.push_back(Arc::new(search));
        id
    }

    fn get(&self, id: SearchId) -> Option<Arc<StoredSearch>> {
        self.searches.lock().iter().find(|s| s.id == id).cloned()
    }

    fn remove(&self, id: SearchId) -> bool {
        let mut searches = self.searches.lock();
        let before = searches.len();
        searches.retain(|s| s.id != id);
        searches.len() < before
    }

    fn len(&self) -> usize {
        self.searches.lock().len()
    }
}

/// One served page.
///
/// `T` is the rendered form of the page; [`SearchPager::search`] and
/// friends leave it as the [`ConsentResponse`].
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T = ConsentResponse> {
    /// The filtered (and rendered) response for this page.
    pub response: T,
    /// Position of this page.
    pub info: PageInfo,
    /// Position of the next page, if any results remain.
    pub next: Option<PageInfo>,
}

/// Serves searches page by page through a [`ConsentPipeline`].
pub struct SearchPager {
    pipeline: ConsentPipeline,
    store: Arc<dyn PageStore>,
    paging: PagingConfig,
    base_url: Url,
}

impl SearchPager {
    /// Creates a pager. Page links extend the query of `base_url`.
    #[must_use]
    pub fn new(
        pipeline: ConsentPipeline,
        store: Arc<dyn PageStore>,
        paging: PagingConfig,
        base_url: Url,
    ) -> Self {
        Self {
            pipeline,
            store,
            paging,
            base_url,
        }
    }

    /// Creates a pager with an in-memory store sized from `paging`.
    #[must_use]
    pub fn in_memory(pipeline: ConsentPipeline, paging: PagingConfig, base_url: Url) -> Self {
        let store = Arc::new(FifoPageStore::new(paging.max_stored_searches));
        Self::new(pipeline, store, paging, base_url)
    }

    /// Runs a search and serves its first page.
    ///
    /// The page size comes from the `_count` parameter, bounded by the
    /// paging configuration. Modifiers are checked before anything is
    /// stored.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Modifier`] for refused modifiers.
    pub fn search(
        &self,
        ctx: OperationContext,
        candidates: Vec<ResourceNode>,
    ) -> Result<Page, PipelineError<PagingError>> {
        self.search_with(ctx, candidates, Ok)
    }

    /// Like [`search`](Self::search), rendering the first page inside its
    /// operation. A render error completes the operation as a failure.
    ///
    /// # Errors
    ///
    /// Refused modifiers, paging errors converted into `E`, and render
    /// errors.
    pub fn search_with<T, E, R>(
        &self,
        ctx: OperationContext,
        candidates: Vec<ResourceNode>,
        render: R,
    ) -> Result<Page<T>, PipelineError<E>>
    where
        E: From<PagingError> + Error + Send + Sync + 'static,
        R: FnOnce(ConsentResponse) -> Result<T, E>,
    {
        self.pipeline.check_request(&ctx)?;

        let requested = ctx.param("_count").and_then(|c| c.trim().parse().ok());
        let count = self.paging.page_size(requested);
        let search_id = self.store.store(StoredSearch::new(&ctx, candidates));
        debug!(search = %search_id, count, "stored search");

        let info = PageInfo {
            search_id,
            offset: 0,
            count,
        };
        self.serve(ctx, info, render)
    }

    /// Serves the page at `offset` of a stored search as a new operation.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Downstream`] with a [`PagingError`] when
    /// the search is unknown or the offset is out of range; the policy
    /// sees that failure through its completion callback.
    pub fn page(
        &self,
        search_id: SearchId,
        offset: usize,
        count: Option<usize>,
    ) -> Result<Page, PipelineError<PagingError>> {
        self.page_with(search_id, offset, count, Ok)
    }

    /// Like [`page`](Self::page), rendering inside the page's operation.
    ///
    /// # Errors
    ///
    /// As for [`search_with`](Self::search_with).
    pub fn page_with<T, E, R>(
        &self,
        search_id: SearchId,
        offset: usize,
        count: Option<usize>,
        render: R,
    ) -> Result<Page<T>, PipelineError<E>>
    where
        E: From<PagingError> + Error + Send + Sync + 'static,
        R: FnOnce(ConsentResponse) -> Result<T, E>,
    {
        let info = PageInfo {
            search_id,
            offset,
            count: self.paging.page_size(count),
        };

        let mut ctx = OperationContext::new(OperationKind::Page).with_page(info);
        if let Some(stored) = self.store.get(search_id) {
            ctx.resource_type = stored.resource_type.clone();
            ctx.params = stored.params.clone();
        }
        self.serve(ctx, info, render)
    }

    /// Serves the page following `page`, if any.
    ///
    /// # Errors
    ///
    /// As for [`page`](Self::page).
    pub fn next<T>(&self, page: &Page<T>) -> Option<Result<Page, PipelineError<PagingError>>> {
        self.next_with(page, Ok)
    }

    /// Like [`next`](Self::next), rendering inside the page's operation.
    ///
    /// # Errors
    ///
    /// As for [`search_with`](Self::search_with).
    pub fn next_with<U, T, E, R>(
        &self,
        page: &Page<U>,
        render: R,
    ) -> Option<Result<Page<T>, PipelineError<E>>>
    where
        E: From<PagingError> + Error + Send + Sync + 'static,
        R: FnOnce(ConsentResponse) -> Result<T, E>,
    {
        page.next
            .map(|next| self.page_with(next.search_id, next.offset, Some(next.count), render))
    }

    fn serve<T, E, R>(
        &self,
        ctx: OperationContext,
        info: PageInfo,
        render: R,
    ) -> Result<Page<T>, PipelineError<E>>
    where
        E: From<PagingError> + Error + Send + Sync + 'static,
        R: FnOnce(ConsentResponse) -> Result<T, E>,
    {
        let mut next = None;
        let produce = |_: &OperationContext| -> Result<ResourceNode, E> {
            let stored = self
                .store
                .get(info.search_id)
                .ok_or(PagingError::UnknownSearch(info.search_id))?;
            let total = stored.total();
            if info.offset > total {
                return Err(PagingError::OffsetOutOfRange {
                    offset: info.offset,
                    total,
                }
                .into());
            }

            let end = page_end(info, total);
            if end < total {
                next = Some(PageInfo {
                    offset: end,
                    ..info
                });
            }
            Ok(self.render_page(&stored, info, next).into())
        };
        let response = self.pipeline.execute_with(ctx, produce, render)?;

        Ok(Page {
            response,
            info,
            next,
        })
    }

    fn render_page(
        &self,
        stored: &StoredSearch,
        info: PageInfo,
        next: Option<PageInfo>,
    ) -> Container {
        let total = stored.total();
        let end = page_end(info, total);
        let mut container = Container::searchset(stored.entries[info.offset..end].to_vec())
            .with_total(total as u64)
            .with_link(PageLink::new("self", self.link(info)));

        if let Some(next) = next {
            container = container.with_link(PageLink::new("next", self.link(next)));
        }
        if info.offset > 0 {
            let previous = PageInfo {
                offset: info.offset.saturating_sub(info.count),
                ..info
            };
            container = container.with_link(PageLink::new("previous", self.link(previous)));
        }
        container
    }

    fn link(&self, info: PageInfo) -> String {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("_getpages", &info.search_id.to_string())
            .append_pair("_getpagesoffset", &info.offset.to_string())
            .append_pair("_count", &info.count.to_string());
        url.into()
    }
}

/// Exclusive end of the page at `info` within `total` entries.
fn page_end(info: PageInfo, total: usize) -> usize {
    info.offset.saturating_add(info.count).min(total)
}

/// Parses the paging parameters out of a page link.
///
/// Other query parameters are ignored. Returns `None` for links that are
/// not absolute URLs or carry no paging parameters.
#[must_use]
pub fn parse_page_link(link: &str) -> Option<PageInfo> {
    let url = Url::parse(link).ok()?;
    let mut search_id = None;
    let mut offset = None;
    let mut count = None;
    for (name, value) in url.query_pairs() {
        match name.as_ref() {
            "_getpages" => search_id = value.parse::<SearchId>().ok(),
            "_getpagesoffset" => offset = value.parse().ok(),
            "_count" => count = value.parse().ok(),
            _ => {}
        }
    }
    Some(PageInfo {
        search_id: search_id?,
        offset: offset?,
        count: count?,
    })
}
