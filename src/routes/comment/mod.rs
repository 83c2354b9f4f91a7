mod handler;

pub use handler::{find_comment, submit_comment};
