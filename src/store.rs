//! Derived-state store
//!
//! Holds the last published series and the fetch state per date key. Series
//! are swapped in whole as `Arc` snapshots, so a reader never observes a
//! partially merged value. A failure only changes the state; the previous
//! series stays readable.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{Granularity, HourlySeries, MonthlySeries};
#[cfg(test)]
use crate::core::HourlyPoint;

/// Lifecycle of one (granularity, date key)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub(crate) enum FetchState {
    #[default]
    Idle,
    Fetching,
    Ready,
    Failed {
        reason: String,
    },
}

impl FetchState {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            FetchState::Idle => "idle",
            FetchState::Fetching => "fetching",
            FetchState::Ready => "ready",
            FetchState::Failed { .. } => "failed",
        }
    }
}

/// A freshly merged series on its way into the store
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Series {
    Hourly(HourlySeries),
    Monthly(MonthlySeries),
}

/// State and last published series of one date key, read together
#[derive(Debug, Clone)]
pub(crate) struct KeySnapshot<T> {
    pub(crate) key: String,
    pub(crate) state: FetchState,
    pub(crate) series: Option<Arc<T>>,
}

struct Slot<T> {
    state: FetchState,
    series: Option<Arc<T>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot {
            state: FetchState::Idle,
            series: None,
        }
    }
}

struct SeriesTable<T> {
    slots: RwLock<HashMap<String, Slot<T>>>,
}

impl<T> SeriesTable<T> {
    fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn get(&self, key: &str) -> Option<Arc<T>> {
        self.slots.read().get(key).and_then(|s| s.series.clone())
    }

    #[cfg(test)]
    fn state(&self, key: &str) -> FetchState {
        self.slots
            .read()
            .get(key)
            .map(|s| s.state.clone())
            .unwrap_or_default()
    }

    fn snapshot(&self, key: &str) -> KeySnapshot<T> {
        let slots = self.slots.read();
        let slot = slots.get(key);
        KeySnapshot {
            key: key.to_string(),
            state: slot.map(|s| s.state.clone()).unwrap_or_default(),
            series: slot.and_then(|s| s.series.clone()),
        }
    }

    fn set_state(&self, key: &str, state: FetchState) {
        self.slots.write().entry(key.to_string()).or_default().state = state;
    }

    fn replace(&self, key: &str, series: T) {
        let mut slots = self.slots.write();
        let slot = slots.entry(key.to_string()).or_default();
        slot.series = Some(Arc::new(series));
        slot.state = FetchState::Ready;
    }
}

pub(crate) struct DerivedStore {
    hourly: SeriesTable<HourlySeries>,
    monthly: SeriesTable<MonthlySeries>,
}

impl Default for DerivedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DerivedStore {
    pub(crate) fn new() -> Self {
        Self {
            hourly: SeriesTable::new(),
            monthly: SeriesTable::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn hourly(&self, day: &str) -> Option<Arc<HourlySeries>> {
        self.hourly.get(day)
    }

    #[cfg(test)]
    pub(crate) fn monthly(&self, month: &str) -> Option<Arc<MonthlySeries>> {
        self.monthly.get(month)
    }

    /// Points of the focused hour for one day, from the last published series
    #[cfg(test)]
    pub(crate) fn hour_slice(&self, day: &str, hour: u8) -> Vec<HourlyPoint> {
        self.hourly(day)
            .map(|series| series.hour(hour).to_vec())
            .unwrap_or_default()
    }

    pub(crate) fn hourly_snapshots<S: AsRef<str>>(
        &self,
        days: &[S],
    ) -> Vec<KeySnapshot<HourlySeries>> {
        days.iter().map(|d| self.hourly.snapshot(d.as_ref())).collect()
    }

    pub(crate) fn monthly_snapshots<S: AsRef<str>>(
        &self,
        months: &[S],
    ) -> Vec<KeySnapshot<MonthlySeries>> {
        months.iter().map(|m| self.monthly.snapshot(m.as_ref())).collect()
    }

    #[cfg(test)]
    pub(crate) fn state(&self, granularity: Granularity, key: &str) -> FetchState {
        match granularity {
            Granularity::Hourly => self.hourly.state(key),
            Granularity::Monthly => self.monthly.state(key),
        }
    }

    pub(crate) fn mark_fetching(&self, granularity: Granularity, key: &str) {
        self.set_state(granularity, key, FetchState::Fetching);
    }

    /// Record a failure without touching the last published series
    pub(crate) fn mark_failed(&self, granularity: Granularity, key: &str, reason: String) {
        self.set_state(granularity, key, FetchState::Failed { reason });
    }

    /// Replace the series for `key` wholesale and mark it ready
    pub(crate) fn publish(&self, key: &str, series: Series) {
        match series {
            Series::Hourly(s) => self.hourly.replace(key, s),
            Series::Monthly(s) => self.monthly.replace(key, s),
        }
    }

    fn set_state(&self, granularity: Granularity, key: &str, state: FetchState) {
        match granularity {
            Granularity::Hourly => self.hourly.set_state(key, state),
            Granularity::Monthly => self.monthly.set_state(key, state),
        }
    }
}
