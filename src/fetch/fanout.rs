//! Concurrent fan-out over a batch of shard keys
//!
//! One retrieval per key, all in flight on a bounded worker pool, joined
//! before returning. The first failure fails the whole batch: merged totals
//! over a partial batch would silently undercount.

use rayon::prelude::*;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::ShardStore;
use crate::core::ShardKey;
use crate::error::AppError;

pub(crate) struct Fetcher {
    store: Arc<dyn ShardStore>,
    pool: rayon::ThreadPool,
}

impl Fetcher {
    pub(crate) fn new(store: Arc<dyn ShardStore>, concurrency: usize) -> Result<Self, AppError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(concurrency.max(1))
            .thread_name(|i| format!("pvdash-fetch-{i}"))
            .build()?;
        Ok(Self { store, pool })
    }

    /// Fetch and decode every shard in `keys`.
    ///
    /// Payloads come back in key order regardless of completion order.
    /// An empty batch succeeds with no payloads and touches no storage.
    pub(crate) fn fetch_all<T>(&self, keys: &[ShardKey]) -> Result<Vec<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let payloads = self.pool.install(|| {
            keys.par_iter()
                .map(|key| self.fetch_one(key))
                .collect::<Result<Vec<T>, AppError>>()
        })?;

        info!(
            "Fetched {} shards from {} ({:.2}ms)",
            keys.len(),
            self.store.name(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(payloads)
    }

    fn fetch_one<T: DeserializeOwned>(&self, key: &ShardKey) -> Result<T, AppError> {
        let bytes = self.store.fetch(key)?;
        debug!("Read {} ({} bytes)", key, bytes.len());
        serde_json::from_slice(&bytes).map_err(|source| AppError::Parse {
            path: key.path(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Granularity, HourlyPayload, MonthlyPayload};
    use crate::fetch::testing::MemoryStore;

    fn key(domain: &str) -> ShardKey {
        ShardKey {
            granularity: Granularity::Monthly,
            traffic_type: "user".to_string(),
            access_type: "desktop".to_string(),
            domain: domain.to_string(),
            date: "2019-09".to_string(),
        }
    }

    fn fetcher(store: Arc<MemoryStore>) -> Fetcher {
        Fetcher::new(store, 4).unwrap()
    }

    #[test]
    fn empty_batch_does_not_touch_storage() {
        let store = Arc::new(MemoryStore::new());
        let payloads: Vec<MonthlyPayload> = fetcher(store.clone()).fetch_all(&[]).unwrap();
        assert!(payloads.is_empty());
        assert_eq!(store.calls(), 0);
    }

    #[test]
    fn payloads_follow_key_order() {
        let store = Arc::new(MemoryStore::new());
        let domains = ["a.org", "b.org", "c.org", "d.org", "e.org", "f.org"];
        for (i, d) in domains.iter().enumerate() {
            store.insert(&key(d).path(), &format!(r#"[{{"x":"01","y":{i}}}]"#));
        }
        let keys: Vec<ShardKey> = domains.iter().map(|d| key(d)).collect();

        let payloads: Vec<MonthlyPayload> = fetcher(store.clone()).fetch_all(&keys).unwrap();
        let ys: Vec<u64> = payloads.iter().map(|p| p[0].y).collect();
        assert_eq!(ys, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(store.calls(), 6);
    }

    #[test]
    fn one_missing_shard_fails_the_batch() {
        let store = Arc::new(MemoryStore::new());
        store.insert(&key("a.org").path(), r#"[{"x":"01","y":1}]"#);
        let keys = vec![key("a.org"), key("missing.org")];

        let err = fetcher(store)
            .fetch_all::<MonthlyPayload>(&keys)
            .unwrap_err();
        match err {
            AppError::Fetch(e) => assert!(e.to_string().contains("missing.org")),
            other => panic!("expected fetch error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_shard_is_a_parse_error() {
        let store = Arc::new(MemoryStore::new());
        store.insert(&key("a.org").path(), r#"{"0": "not points"}"#);

        let err = fetcher(store)
            .fetch_all::<HourlyPayload>(&[key("a.org")])
            .unwrap_err();
        assert!(matches!(err, AppError::Parse { ref path, .. } if path.contains("a.org")));
    }
}
