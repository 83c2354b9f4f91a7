mod handler;

pub use handler::{find_rating, submit_rating};
