mod handler;
mod model;

pub use handler::{create_group, delete_group, find_group, update_group};
pub(crate) use model::DepartureResult;
