mod db;
mod writer;

pub use db::{BookmarkRow, Database, FileRow, StoreError};
pub use writer::{Mutation, StoreWriter};
