//! Shared permission record model for the Gatekeeper crates.
//!
//! Everything here is plain data: the decision engine, the permission
//! sources and the group registry all speak in these types.

pub mod errors;
pub mod model;

pub use errors::{ErrorKind, ParseError};
pub use model::{
    Action, Effect, HttpMethod, Identity, IdentityPermission, IdentityPermissionKey,
    IdentityType, Operation, Permission, Subject, SUBJECT_INSTANCE_SEPARATOR, SUBJECT_WILDCARD,
};
