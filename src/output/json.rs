use serde_json::{Value, json};

use crate::core::{DomainSelection, HourlySeries, MonthlySeries, ShardKey};
use crate::selection::Selection;
use crate::store::{FetchState, KeySnapshot};

fn error_value(state: &FetchState) -> Value {
    match state {
        FetchState::Failed { reason } => json!(reason),
        _ => Value::Null,
    }
}

fn hourly_entries(snapshots: &[KeySnapshot<HourlySeries>], hour: u8) -> Vec<Value> {
    snapshots
        .iter()
        .map(|snap| {
            let series = snap.series.as_deref();
            json!({
                "day": snap.key,
                "state": snap.state.label(),
                "error": error_value(&snap.state),
                "total_views": series.map_or(0, HourlySeries::total_views),
                "focused_hour": hour,
                "focused": series.map(|s| s.hour(hour)).unwrap_or(&[]),
                "hours": series,
            })
        })
        .collect()
}

fn monthly_entries(snapshots: &[KeySnapshot<MonthlySeries>]) -> Vec<Value> {
    snapshots
        .iter()
        .map(|snap| {
            let series = snap.series.as_deref();
            json!({
                "month": snap.key,
                "state": snap.state.label(),
                "error": error_value(&snap.state),
                "total_views": series.map_or(0, MonthlySeries::total_views),
                "points": series,
            })
        })
        .collect()
}

fn to_pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "[]".to_string())
}

pub(crate) fn output_paths_json(keys: &[ShardKey]) -> String {
    let entries: Vec<Value> = keys
        .iter()
        .map(|key| {
            json!({
                "granularity": key.granularity,
                "traffic_type": key.traffic_type,
                "access_type": key.access_type,
                "domain": key.domain,
                "date": key.date,
                "path": key.path(),
            })
        })
        .collect();
    to_pretty(&Value::Array(entries))
}

pub(crate) fn output_days_json(months: &[(String, Vec<String>)]) -> String {
    let entries: Vec<Value> = months
        .iter()
        .map(|(month, days)| json!({ "month": month, "days": days }))
        .collect();
    to_pretty(&Value::Array(entries))
}

pub(crate) fn output_hourly_json(snapshots: &[KeySnapshot<HourlySeries>], hour: u8) -> String {
    to_pretty(&Value::Array(hourly_entries(snapshots, hour)))
}

pub(crate) fn output_monthly_json(snapshots: &[KeySnapshot<MonthlySeries>]) -> String {
    to_pretty(&Value::Array(monthly_entries(snapshots)))
}

/// One compact line per `show`, suitable for line-oriented consumers
pub(crate) fn output_session_json(
    selection: &Selection,
    hourly: &[KeySnapshot<HourlySeries>],
    monthly: &[KeySnapshot<MonthlySeries>],
) -> String {
    let value = json!({
        "selection": {
            "traffic_types": selection.traffic_types,
            "access_types": selection.access_types,
            "domains": selection.domains.resolve(&selection.domain_options),
            "all_domains": selection.domains == DomainSelection::AllDomains,
            "days": selection.days,
            "months": selection.months,
            "current_hour": selection.current_hour,
        },
        "hourly": hourly_entries(hourly, selection.current_hour),
        "monthly": monthly_entries(monthly),
    });
    serde_json::to_string(&value).unwrap_or_else(|_| "{}".to_string())
}
