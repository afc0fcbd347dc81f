pub mod api;
pub mod errors;
pub mod model;
pub mod state;

pub use api::{GroupManagement, GroupMembership};
pub use errors::GroupError;
pub use model::{CreateGroupRequest, Group, GroupStatus};
pub use state::InMemoryGroupRegistry;
