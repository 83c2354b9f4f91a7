mod handler;
mod model;

pub use handler::{create_restaurant, delete_restaurant, find_restaurant};
