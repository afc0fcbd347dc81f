//! Decides whether a set of permissions authorizes a list of operations.
//!
//! The engine is a pure function over its inputs. Rules, per requested
//! operation:
//! - a permission applies when its action covers the requested action, its
//!   subject matches the requested subject (`*` and `Type|*` are wildcards)
//!   and its field scope covers the requested field;
//! - no applicable permission means the operation is not granted;
//! - any applicable DENY wins over every applicable ALLOW.
//!
//! ```rust
//! use gatekeeper_core_types::{Action, Operation, Permission};
//! use gatekeeper_decision_engine::is_authorized;
//!
//! let permissions = vec![Permission::allow(Action::Read, "Sample")];
//! let operations = vec![Operation::new(Action::Read, "Sample").with_field("id")];
//! assert!(is_authorized(&permissions, &operations).is_ok());
//! ```

mod engine;
mod errors;

pub use engine::{
    evaluate_operation, explain, is_authorized, matching_permissions, OperationDecision,
    PERMISSION_NOT_GRANTED,
};
pub use errors::Forbidden;
