//! Shard addressing
//!
//! Maps a granularity, a date identifier and the selected dimension values
//! to the exact set of shard keys that must be fetched. Pure, no I/O.

use crate::core::types::{DomainSelection, Granularity, ShardKey};
use crate::error::AppError;
use crate::utils::validate_identifier;

/// Resolve the shard keys for one date key.
///
/// Keys are the cartesian product traffic type × access type × domain, in
/// that nesting order. Any empty dimension yields no keys. `AllDomains`
/// expands to `domain_options`; the "All" label itself never becomes a path.
pub(crate) fn resolve_paths<S: AsRef<str>>(
    granularity: Granularity,
    date: &str,
    traffic_types: &[S],
    access_types: &[S],
    domains: &DomainSelection,
    domain_options: &[String],
) -> Result<Vec<ShardKey>, AppError> {
    validate_identifier(granularity, date)?;

    let domains = domains.resolve(domain_options);
    let mut keys = Vec::with_capacity(traffic_types.len() * access_types.len() * domains.len());

    for traffic_type in traffic_types {
        for access_type in access_types {
            for domain in &domains {
                keys.push(ShardKey {
                    granularity,
                    traffic_type: traffic_type.as_ref().to_string(),
                    access_type: access_type.as_ref().to_string(),
                    domain: (*domain).to_string(),
                    date: date.to_string(),
                });
            }
        }
    }

    Ok(keys)
}
