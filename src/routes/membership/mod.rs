mod handler;

pub use handler::{join_group, leave_group, list_memberships};
