//! Core types for the consent pipeline.
//!
//! This crate holds the vocabulary shared by every other crate in the
//! workspace: identifiers, the resource tree model, partition scopes
//! and the [`ErrorCode`] interface.
//!
//! # Crate Architecture
//!
//! ```text
//! consent-types    : ids, ResourceNode, RequestPartition, ErrorCode  ◄── HERE
//!     ↑
//! consent-hook     : ConsentService trait, ConsentOutcome, chain, rules
//!     ↑
//! consent-runtime  : lifecycle, stream filter, pagination, versions
//!     ↑
//! consent-cli      : command-line front end
//! ```
//!
//! # Example
//!
//! ```
//! use consent_types::{Container, Resource, ResourceId, ResourceNode};
//!
//! let bundle: ResourceNode = Container::searchset(vec![
//!     Resource::new("Patient", "PTA").into(),
//!     Resource::new("Patient", "PTB").into(),
//! ])
//! .into();
//!
//! assert!(bundle.is_container());
//! assert_eq!(ResourceId::parse("Patient/PTA").unwrap().id_part, "PTA");
//! ```

mod error;
mod id;
mod partition;
mod resource;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{IdError, OperationId, ResourceId, SearchId};
pub use partition::RequestPartition;
pub use resource::{
    Container, PageLink, Resource, ResourceNode, CONTAINER_TYPE, DIAGNOSTIC_TYPE,
};
