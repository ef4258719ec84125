use std::time::Duration;

use super::ShardStore;
use crate::core::ShardKey;
use crate::error::FetchError;

/// Shard tree served over static HTTP
pub(crate) struct HttpStore {
    base: String,
    agent: ureq::Agent,
}

impl HttpStore {
    pub(crate) fn new(base: &str, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            base: base.trim_end_matches('/').to_string(),
            agent,
        }
    }

    fn url(&self, key: &ShardKey) -> String {
        format!("{}/{}", self.base, key.path())
    }
}

impl ShardStore for HttpStore {
    fn name(&self) -> &'static str {
        "http"
    }

    fn location(&self) -> String {
        self.base.clone()
    }

    fn fetch(&self, key: &ShardKey) -> Result<Vec<u8>, FetchError> {
        let url = self.url(key);
        match self.agent.get(&url).call() {
            Ok(response) => {
                let mut body = response.into_body();
                body.read_to_vec().map_err(|e| FetchError::Transport {
                    path: url,
                    reason: e.to_string(),
                })
            }
            Err(ureq::Error::StatusCode(404)) => Err(FetchError::NotFound { path: url }),
            Err(ureq::Error::StatusCode(status)) => Err(FetchError::Status { path: url, status }),
            Err(e) => Err(FetchError::Transport {
                path: url,
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Granularity;

    #[test]
    fn url_joins_base_and_shard_path() {
        let store = HttpStore::new("https://stats.example.test/data/", Duration::from_secs(1));
        let key = ShardKey {
            granularity: Granularity::Hourly,
            traffic_type: "spider".to_string(),
            access_type: "mobile-app".to_string(),
            domain: "fr.wikipedia".to_string(),
            date: "2019-09-02".to_string(),
        };
        assert_eq!(
            store.url(&key),
            "https://stats.example.test/data/hourly/spider/mobile-app/fr.wikipedia/2019-09-02.json"
        );
        assert_eq!(store.location(), "https://stats.example.test/data");
    }
}
