/// Day identifier format used in shard paths: "2019-09-01"
pub(crate) const DAY_FORMAT: &str = "%Y-%m-%d";

/// Month identifier format used in shard paths: "2019-09"
pub(crate) const MONTH_FORMAT: &str = "%Y-%m";

/// Domain option label that selects every known domain. Never a path segment.
pub(crate) const ALL_DOMAINS: &str = "All";

pub(crate) const HOURS_PER_DAY: u8 = 24;

pub(crate) const TRAFFIC_TYPE_OPTIONS: &[&str] = &["user", "spider", "automated"];
pub(crate) const ACCESS_TYPE_OPTIONS: &[&str] = &["desktop", "mobile-web", "mobile-app"];
pub(crate) const DOMAIN_OPTIONS: &[&str] = &[
    "en.wikipedia",
    "de.wikipedia",
    "fr.wikipedia",
    "es.wikipedia",
    "it.wikipedia",
    "ja.wikipedia",
    "ru.wikipedia",
    "zh.wikipedia",
];

pub(crate) const DEFAULT_TRAFFIC_TYPES: &[&str] = &["user"];
pub(crate) const DEFAULT_ACCESS_TYPES: &[&str] = &["desktop"];
pub(crate) const DEFAULT_DOMAINS: &[&str] = &["en.wikipedia"];
pub(crate) const DEFAULT_DAYS: &[&str] = &["2019-09-01"];
pub(crate) const DEFAULT_MONTHS: &[&str] = &["2019-09"];
pub(crate) const AVAILABLE_MONTHS: &[&str] = &["2018-09", "2019-08", "2019-09"];

pub(crate) const DEFAULT_BASE: &str = "data";
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub(crate) const DEFAULT_FETCH_CONCURRENCY: usize = 8;
pub(crate) const RETRY_BACKOFF_MS: u64 = 250;
