//! Permission sources and the authorization façade.
//!
//! Two [`PermissionsSource`] strategies are provided:
//! - [`StaticPermissionsSource`]: routes and role permissions fixed at startup;
//! - [`DynamicPermissionsSource`]: identity permissions kept in an
//!   [`IdentityPermissionStore`], aggregated over group memberships.
//!
//! [`AuthorizationService`] combines a source with the decision engine.

pub mod dynamic_source;
pub mod errors;
pub mod memory_store;
pub mod service;
pub mod source;
pub mod static_source;
pub mod store;

pub use dynamic_source::{
    CreateIdentityPermissionsRequest, CreateIdentityPermissionsResponse,
    DeleteIdentityPermissionsRequest, DeleteIdentityPermissionsResponse,
    DynamicPermissionsSource, IdentityRef, SubjectPermissionsQuery,
};
pub use errors::{AuthzError, SourceError};
pub use memory_store::InMemoryIdentityPermissionStore;
pub use service::{AuthorizationService, Authorizer};
pub use source::{cancellable, PermissionsSource};
pub use static_source::StaticPermissionsSource;
pub use store::{BatchDeleteOutcome, BatchWriteOutcome, IdentityPermissionStore, StoreError};
