mod config;
mod excludes;
mod walker;

pub use excludes::ExcludeEngine;
pub use walker::{ScanContext, ScanEntry, walk};
