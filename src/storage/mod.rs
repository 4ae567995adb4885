//! SQLite persistence for users, feeds and posts.
//!
//! Every operation lives in an `impl Database` block in the submodule for
//! its table; `types` holds the row conversions and the error type.

mod feeds;
mod posts;
mod schema;
mod types;
mod users;

pub use schema::Database;
pub use types::{DatabaseError, Feed, NewPost, Post, User};
