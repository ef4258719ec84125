//! Shard retrieval
//!
//! Each storage backend implements the `ShardStore` trait; `Fetcher` fans a
//! batch of shard keys out over a worker pool and joins the results.

mod fanout;
mod fs;
mod http;

use std::time::Duration;

use crate::core::ShardKey;
use crate::error::FetchError;

pub(crate) use fanout::Fetcher;
pub(crate) use fs::FsStore;
pub(crate) use http::HttpStore;

/// Storage backend trait - implemented by each way of reaching the shard tree
pub(crate) trait ShardStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Where shards are read from
    fn location(&self) -> String;

    /// Read the raw bytes of one shard
    fn fetch(&self, key: &ShardKey) -> Result<Vec<u8>, FetchError>;
}

/// Pick a backend from the base location: `http(s)://` URLs go over HTTP,
/// anything else (including `file://`) is a local directory.
pub(crate) fn open_store(base: &str, timeout: Duration) -> Box<dyn ShardStore> {
    if base.starts_with("http://") || base.starts_with("https://") {
        Box::new(HttpStore::new(base, timeout))
    } else {
        let path = base.strip_prefix("file://").unwrap_or(base);
        Box::new(FsStore::new(path))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_store_picks_backend() {
        let timeout = Duration::from_secs(1);
        assert_eq!(open_store("https://example.test/data", timeout).name(), "http");
        assert_eq!(open_store("http://localhost:8080", timeout).name(), "http");
        assert_eq!(open_store("file:///srv/data", timeout).name(), "fs");
        assert_eq!(open_store("file:///srv/data", timeout).location(), "/srv/data");
        assert_eq!(open_store("./data", timeout).name(), "fs");
    }
}
