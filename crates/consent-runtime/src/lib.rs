//! Consent runtime: the request-side half of the consent layer.
//!
//! `consent-hook` defines what a policy answers; this crate decides when
//! it is asked and what its answers do to the response.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  consent-types   : ResourceNode, Container, ids, ErrorCode  │
//! └─────────────────────────────────────────────────────────────┘
//!           ↕
//! ┌─────────────────────────────────────────────────────────────┐
//! │  consent-hook    : ConsentService, Outcome, Chain, Rules    │
//! └─────────────────────────────────────────────────────────────┘
//!           ↕
//! ┌─────────────────────────────────────────────────────────────┐
//! │  consent-runtime : Pipeline, lifecycle, filter, paging      │ ◄── HERE
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Request Flow
//!
//! ```text
//! request ──► ModifierGuard ──► OperationScope::ensure_started
//!                 │ 400                 │ reject → diagnostic / 204
//!                 ▼                     ▼
//!              (error)            produce resources
//!                                       │ error → complete_failure
//!                                       ▼
//!                                filter_response (post-order walk)
//!                                       │
//!                                       ▼
//!                                render response
//!                                       │ error → complete_failure
//!                                       ▼
//!                                complete_success ──► output
//! ```
//!
//! # Modules
//!
//! - [`pipeline`](ConsentPipeline): end-to-end execution of one operation
//! - [`lifecycle`](OperationScope): start-once, complete-once guard
//! - [`filter`](filter_response): per-resource decisions over a tree
//! - [`pagination`](SearchPager): stored searches served page by page
//! - [`version`](ResourceVersionService): latest-version lookups
//! - [`config`]: layered TOML and environment configuration
//! - [`audit`](AuditService): tracing-only policy for chains

mod audit;
pub mod config;
mod error;
mod filter;
mod lifecycle;
mod modifiers;
mod pagination;
mod pipeline;
mod version;

pub use audit::{AuditCounters, AuditService};
pub use error::{PagingError, PipelineError, UnsupportedModifier};
pub use filter::filter_response;
pub use lifecycle::{LifecycleRecord, LifecycleState, OperationScope, StartDecision};
pub use modifiers::ModifierGuard;
pub use pagination::{parse_page_link, FifoPageStore, Page, PageStore, SearchPager, StoredSearch};
pub use pipeline::{ConsentPipeline, ConsentResponse};
pub use version::{
    CachingResolver, IdentityResolver, PartitionSettings, ResolvedIdentity, ResourceVersionMap,
    ResourceVersionService,
};
