//! Core data types shared by addressing, aggregation and the derived store
//!
//! Shard payloads deserialize straight into these types; merged series
//! serialize back out in the same `{x, y}` shape.

use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::consts::{ALL_DOMAINS, HOURS_PER_DAY};
use crate::error::AppError;

/// Metric granularity of a shard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Granularity {
    /// Per-day shards broken out by hour of day
    Hourly,
    /// Per-month shards broken out by day of month
    Monthly,
}

impl Granularity {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Granularity::Hourly => "hourly",
            Granularity::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the three independent filter axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Dimension {
    TrafficType,
    AccessType,
    Domain,
}

impl Dimension {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Dimension::TrafficType => "trafficType",
            Dimension::AccessType => "accessType",
            Dimension::Domain => "domain",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "traffictype" | "traffic-type" | "traffic_type" | "traffic" => {
                Ok(Dimension::TrafficType)
            }
            "accesstype" | "access-type" | "access_type" | "access" => Ok(Dimension::AccessType),
            "domain" | "domains" => Ok(Dimension::Domain),
            _ => Err(AppError::UnknownDimension {
                input: s.to_string(),
            }),
        }
    }
}

/// Domain axis selection. `AllDomains` is resolved to the concrete option
/// list only when shard paths are computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DomainSelection {
    Explicit(Vec<String>),
    AllDomains,
}

impl DomainSelection {
    /// Build from raw labels, treating the "All" label as `AllDomains`
    pub(crate) fn from_labels<S: AsRef<str>>(labels: &[S]) -> Self {
        if labels.iter().any(|l| l.as_ref() == ALL_DOMAINS) {
            DomainSelection::AllDomains
        } else {
            DomainSelection::Explicit(labels.iter().map(|l| l.as_ref().to_string()).collect())
        }
    }

    /// Concrete domain list, deduplicated in first-seen order
    pub(crate) fn resolve<'a>(&'a self, domain_options: &'a [String]) -> Vec<&'a str> {
        let source: &[String] = match self {
            DomainSelection::Explicit(domains) => domains,
            DomainSelection::AllDomains => domain_options,
        };
        let mut resolved: Vec<&str> = Vec::with_capacity(source.len());
        for domain in source {
            if domain != ALL_DOMAINS && !resolved.contains(&domain.as_str()) {
                resolved.push(domain.as_str());
            }
        }
        resolved
    }
}

/// Address of one immutable shard file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ShardKey {
    pub(crate) granularity: Granularity,
    pub(crate) traffic_type: String,
    pub(crate) access_type: String,
    pub(crate) domain: String,
    /// Zero-padded `YYYY-MM-DD` (hourly) or `YYYY-MM` (monthly)
    pub(crate) date: String,
}

impl ShardKey {
    /// Relative path: `<granularity>/<trafficType>/<accessType>/<domain>/<date>.json`
    pub(crate) fn path(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}.json",
            self.granularity, self.traffic_type, self.access_type, self.domain, self.date
        )
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// X-axis value of an hourly point: a page rank or a label, kept verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum PointLabel {
    Int(i64),
    Float(f64),
    Text(String),
}

impl PointLabel {
    /// Total order used only to make tie-breaking deterministic:
    /// numbers before text, numbers by value, text lexicographically.
    /// Integers compare exactly; an integer and a float of equal value
    /// order the integer first, so only identical labels compare equal.
    pub(crate) fn total_cmp(&self, other: &PointLabel) -> Ordering {
        match (self, other) {
            (PointLabel::Int(a), PointLabel::Int(b)) => a.cmp(b),
            (PointLabel::Float(a), PointLabel::Float(b)) => a.total_cmp(b),
            (PointLabel::Int(a), PointLabel::Float(b)) => {
                (*a as f64).total_cmp(b).then(Ordering::Less)
            }
            (PointLabel::Float(a), PointLabel::Int(b)) => {
                a.total_cmp(&(*b as f64)).then(Ordering::Greater)
            }
            (PointLabel::Text(a), PointLabel::Text(b)) => a.cmp(b),
            (PointLabel::Text(_), _) => Ordering::Greater,
            (_, PointLabel::Text(_)) => Ordering::Less,
        }
    }
}

impl fmt::Display for PointLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointLabel::Int(n) => write!(f, "{n}"),
            PointLabel::Float(n) => write!(f, "{n}"),
            PointLabel::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct HourlyPoint {
    pub(crate) x: PointLabel,
    pub(crate) y: u64,
}

/// Raw hourly shard: hour of day ("0".."23") to ranked points
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<u8, Vec<HourlyPoint>>")]
pub(crate) struct HourlyPayload(pub(crate) BTreeMap<u8, Vec<HourlyPoint>>);

impl TryFrom<BTreeMap<u8, Vec<HourlyPoint>>> for HourlyPayload {
    type Error = String;

    fn try_from(hours: BTreeMap<u8, Vec<HourlyPoint>>) -> Result<Self, Self::Error> {
        if let Some(hour) = hours.keys().find(|h| **h >= HOURS_PER_DAY) {
            return Err(format!("hour key {hour} out of range 0-23"));
        }
        Ok(HourlyPayload(hours))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct MonthlyPoint {
    /// Day-of-month identifier, compared as a string
    #[serde(deserialize_with = "string_or_number")]
    pub(crate) x: String,
    pub(crate) y: u64,
}

/// Raw monthly shard: unsorted day-of-month points
pub(crate) type MonthlyPayload = Vec<MonthlyPoint>;

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

/// Merged hour-of-day distribution for one day
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub(crate) struct HourlySeries {
    pub(crate) hours: BTreeMap<u8, Vec<HourlyPoint>>,
}

impl HourlySeries {
    /// Points for one hour, or an empty slice if that hour never appeared
    pub(crate) fn hour(&self, hour: u8) -> &[HourlyPoint] {
        self.hours.get(&hour).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn total_views(&self) -> u64 {
        self.hours
            .values()
            .flatten()
            .fold(0u64, |acc, p| acc.saturating_add(p.y))
    }
}

/// Merged day-of-month time series for one month
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub(crate) struct MonthlySeries {
    pub(crate) points: Vec<MonthlyPoint>,
}

impl MonthlySeries {
    pub(crate) fn total_views(&self) -> u64 {
        self.points
            .iter()
            .fold(0u64, |acc, p| acc.saturating_add(p.y))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
