//! Selection store
//!
//! Explicit context object holding the filter dimensions, the selected day
//! and month sets and the focused hour. Mutations notify subscribers after
//! the state lock is released, so listeners may read the selection freely.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::consts::{ALL_DOMAINS, HOURS_PER_DAY};
use crate::core::{Dimension, DomainSelection};
use crate::error::AppError;
use crate::utils::{parse_day, parse_month};

/// The option lists each dimension offers
#[derive(Debug, Clone, Default)]
pub(crate) struct DimensionOptions {
    pub(crate) traffic_types: Vec<String>,
    pub(crate) access_types: Vec<String>,
    pub(crate) domains: Vec<String>,
}

/// One filter axis: ordered option labels with a selected flag each
#[derive(Debug, Clone)]
struct FilterDimension {
    options: Vec<(String, bool)>,
}

impl FilterDimension {
    fn new(options: &[String]) -> Self {
        Self {
            options: options.iter().map(|o| (o.clone(), false)).collect(),
        }
    }

    fn selected(&self) -> Vec<String> {
        self.options
            .iter()
            .filter(|(_, on)| *on)
            .map(|(label, _)| label.clone())
            .collect()
    }

    fn flag_mut(&mut self, option: &str) -> Option<&mut bool> {
        self.options
            .iter_mut()
            .find(|(label, _)| label == option)
            .map(|(_, on)| on)
    }
}

#[derive(Debug, Clone)]
struct SelectionState {
    traffic_types: FilterDimension,
    access_types: FilterDimension,
    domains: FilterDimension,
    all_domains: bool,
    domain_options: Vec<String>,
    days: Vec<String>,
    months: Vec<String>,
    current_hour: u8,
}

/// Consistent snapshot of the whole selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Selection {
    pub(crate) traffic_types: Vec<String>,
    pub(crate) access_types: Vec<String>,
    pub(crate) domains: DomainSelection,
    pub(crate) domain_options: Vec<String>,
    pub(crate) days: Vec<String>,
    pub(crate) months: Vec<String>,
    pub(crate) current_hour: u8,
}

/// What changed, delivered to every subscriber
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SelectionChange {
    Filter {
        dimension: Dimension,
        option: String,
        selected: bool,
    },
    Days,
    Months,
    Hour(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&SelectionChange) + Send + Sync>;

pub(crate) struct SelectionStore {
    state: RwLock<SelectionState>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
}

impl SelectionStore {
    /// Empty selection over the given options: nothing selected, no dates, hour 0
    pub(crate) fn new(options: &DimensionOptions) -> Self {
        let domain_options: Vec<String> = options
            .domains
            .iter()
            .filter(|d| d.as_str() != ALL_DOMAINS)
            .cloned()
            .collect();
        Self {
            state: RwLock::new(SelectionState {
                traffic_types: FilterDimension::new(&options.traffic_types),
                access_types: FilterDimension::new(&options.access_types),
                domains: FilterDimension::new(&domain_options),
                all_domains: false,
                domain_options,
                days: Vec::new(),
                months: Vec::new(),
                current_hour: 0,
            }),
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn get_selection(&self) -> Selection {
        let state = self.state.read();
        Selection {
            traffic_types: state.traffic_types.selected(),
            access_types: state.access_types.selected(),
            domains: if state.all_domains {
                DomainSelection::AllDomains
            } else {
                DomainSelection::Explicit(state.domains.selected())
            },
            domain_options: state.domain_options.clone(),
            days: state.days.clone(),
            months: state.months.clone(),
            current_hour: state.current_hour,
        }
    }

    pub(crate) fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SelectionChange) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Flip one option and return its new state
    pub(crate) fn toggle(&self, dimension: Dimension, option: &str) -> Result<bool, AppError> {
        self.update_flag(dimension, option, |on| !on)
    }

    pub(crate) fn is_selected(&self, dimension: Dimension, option: &str) -> Result<bool, AppError> {
        let state = self.state.read();
        if dimension == Dimension::Domain && option == ALL_DOMAINS {
            return Ok(state.all_domains);
        }
        let axis = match dimension {
            Dimension::TrafficType => &state.traffic_types,
            Dimension::AccessType => &state.access_types,
            Dimension::Domain => &state.domains,
        };
        axis.options
            .iter()
            .find(|(label, _)| label == option)
            .map(|(_, on)| *on)
            .ok_or_else(|| AppError::UnknownOption {
                dimension,
                option: option.to_string(),
            })
    }

    /// Set one option; subscribers hear about it only if the flag changed
    pub(crate) fn set_selected(
        &self,
        dimension: Dimension,
        option: &str,
        selected: bool,
    ) -> Result<(), AppError> {
        self.update_flag(dimension, option, |_| selected).map(|_| ())
    }

    fn update_flag<F>(&self, dimension: Dimension, option: &str, f: F) -> Result<bool, AppError>
    where
        F: FnOnce(bool) -> bool,
    {
        let selected = {
            let mut state = self.state.write();
            let flag = Self::flag_mut(&mut state, dimension, option)?;
            let next = f(*flag);
            if *flag == next {
                return Ok(next);
            }
            *flag = next;
            next
        };
        self.notify(SelectionChange::Filter {
            dimension,
            option: option.to_string(),
            selected,
        });
        Ok(selected)
    }

    /// Replace the selected days. Order is kept, duplicates dropped.
    pub(crate) fn set_days<S: AsRef<str>>(&self, days: &[S]) -> Result<(), AppError> {
        let days = dedup_identifiers(days, |d| parse_day(d).map(|_| ()))?;
        {
            let mut state = self.state.write();
            if state.days == days {
                return Ok(());
            }
            state.days = days;
        }
        self.notify(SelectionChange::Days);
        Ok(())
    }

    /// Replace the selected months. Order is kept, duplicates dropped.
    pub(crate) fn set_months<S: AsRef<str>>(&self, months: &[S]) -> Result<(), AppError> {
        let months = dedup_identifiers(months, |m| parse_month(m).map(|_| ()))?;
        {
            let mut state = self.state.write();
            if state.months == months {
                return Ok(());
            }
            state.months = months;
        }
        self.notify(SelectionChange::Months);
        Ok(())
    }

    pub(crate) fn set_current_hour(&self, hour: u8) -> Result<(), AppError> {
        if hour >= HOURS_PER_DAY {
            return Err(AppError::InvalidHour {
                input: hour.to_string(),
            });
        }
        {
            let mut state = self.state.write();
            if state.current_hour == hour {
                return Ok(());
            }
            state.current_hour = hour;
        }
        self.notify(SelectionChange::Hour(hour));
        Ok(())
    }

    fn flag_mut<'a>(
        state: &'a mut SelectionState,
        dimension: Dimension,
        option: &str,
    ) -> Result<&'a mut bool, AppError> {
        let axis = match dimension {
            Dimension::TrafficType => &mut state.traffic_types,
            Dimension::AccessType => &mut state.access_types,
            Dimension::Domain if option == ALL_DOMAINS => return Ok(&mut state.all_domains),
            Dimension::Domain => &mut state.domains,
        };
        axis.flag_mut(option).ok_or_else(|| AppError::UnknownOption {
            dimension,
            option: option.to_string(),
        })
    }

    fn notify(&self, change: SelectionChange) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        debug!("Selection changed: {:?} ({} listeners)", change, listeners.len());
        for listener in listeners {
            listener(&change);
        }
    }
}

fn dedup_identifiers<S, F>(input: &[S], validate: F) -> Result<Vec<String>, AppError>
where
    S: AsRef<str>,
    F: Fn(&str) -> Result<(), AppError>,
{
    let mut out: Vec<String> = Vec::with_capacity(input.len());
    for raw in input {
        let id = raw.as_ref().trim();
        validate(id)?;
        if !out.iter().any(|existing| existing == id) {
            out.push(id.to_string());
        }
    }
    Ok(out)
}
