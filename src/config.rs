//! Process-level configuration

use std::path::{Path, PathBuf};

/// Explicit configuration object constructed once at startup and handed to
/// the store and services. Nothing in the crate reads process-wide state.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub cache_capacity: Option<u64>,
}

impl Config {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            cache_capacity: None,
        }
    }

    pub fn cache_capacity(mut self, bytes: u64) -> Self {
        self.cache_capacity = Some(bytes);
        self
    }
}
