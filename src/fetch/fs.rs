use std::io::ErrorKind;
use std::path::PathBuf;

use super::ShardStore;
use crate::core::ShardKey;
use crate::error::FetchError;

/// Shard tree on the local filesystem
pub(crate) struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ShardStore for FsStore {
    fn name(&self) -> &'static str {
        "fs"
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }

    fn fetch(&self, key: &ShardKey) -> Result<Vec<u8>, FetchError> {
        let path = self.root.join(key.path());
        std::fs::read(&path).map_err(|source| {
            let path = path.display().to_string();
            if source.kind() == ErrorKind::NotFound {
                FetchError::NotFound { path }
            } else {
                FetchError::Io { path, source }
            }
        })
    }
}
