//! Core module - shard addressing, payload types and series merging

mod addressing;
mod aggregator;
mod types;

pub(crate) use addressing::resolve_paths;
pub(crate) use aggregator::{merge_hourly, merge_monthly};
#[cfg(test)]
pub(crate) use types::HourlyPoint;
pub(crate) use types::{
    Dimension, DomainSelection, Granularity, HourlyPayload, HourlySeries, MonthlyPayload,
    MonthlySeries, ShardKey,
};
