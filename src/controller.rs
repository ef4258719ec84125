//! Selection-reactive controller
//!
//! Every (granularity, date key) is an independent task. A trigger bumps the
//! task's generation and starts a worker thread that runs addressing, fetch
//! and merge against the selection snapshot taken at trigger time. On
//! completion the result is published only if its generation is still the
//! current one; superseded results are dropped. The generation check and
//! the store write happen under one lock.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::consts::RETRY_BACKOFF_MS;
use crate::core::{
    Granularity, HourlyPayload, MonthlyPayload, ShardKey, merge_hourly, merge_monthly,
    resolve_paths,
};
use crate::error::AppError;
use crate::fetch::Fetcher;
use crate::selection::{Selection, SelectionChange, SelectionStore, SubscriptionId};
use crate::store::{DerivedStore, Series};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TaskKey {
    granularity: Granularity,
    key: String,
}

/// How often a failed fetch batch is re-run for the same key
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub(crate) retries: usize,
    pub(crate) backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            backoff: Duration::from_millis(RETRY_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub(crate) fn new(retries: usize) -> Self {
        Self {
            retries,
            ..Self::default()
        }
    }
}

/// Handles of the tasks started by one refresh
#[must_use = "dropping a Refresh detaches its tasks"]
pub(crate) struct Refresh {
    handles: Vec<JoinHandle<()>>,
}

impl Refresh {
    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }

    /// Block until every task of this refresh has published or been discarded
    pub(crate) fn wait(self) {
        join_all(self.handles);
    }
}

fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if handle.join().is_err() {
            warn!("Refresh task panicked");
        }
    }
}

/// Granularities whose data depends on a selection change.
/// The focused hour only selects a slice of data already fetched.
fn triggered_by(change: &SelectionChange) -> &'static [Granularity] {
    match change {
        SelectionChange::Filter { .. } => &[Granularity::Hourly, Granularity::Monthly],
        SelectionChange::Days => &[Granularity::Hourly],
        SelectionChange::Months => &[Granularity::Monthly],
        SelectionChange::Hour(_) => &[],
    }
}

pub(crate) struct Controller {
    selection: Arc<SelectionStore>,
    fetcher: Arc<Fetcher>,
    store: Arc<DerivedStore>,
    retry: RetryPolicy,
    generations: Mutex<HashMap<TaskKey, u64>>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    pub(crate) fn new(
        selection: Arc<SelectionStore>,
        fetcher: Arc<Fetcher>,
        store: Arc<DerivedStore>,
        retry: RetryPolicy,
    ) -> Arc<Self> {
        Arc::new(Self {
            selection,
            fetcher,
            store,
            retry,
            generations: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(Vec::new()),
        })
    }

    /// Subscribe to the selection store. The subscription holds only a weak
    /// reference, so dropping the controller ends it.
    pub(crate) fn attach(self: &Arc<Self>) -> SubscriptionId {
        let weak = Arc::downgrade(self);
        self.selection.subscribe(move |change| {
            if let Some(controller) = weak.upgrade() {
                controller.on_change(change);
            }
        })
    }

    pub(crate) fn on_change(self: &Arc<Self>, change: &SelectionChange) {
        match change {
            SelectionChange::Filter {
                dimension,
                option,
                selected,
            } => debug!("{dimension} {option} selected={selected}"),
            SelectionChange::Hour(hour) => debug!("Focused hour {hour}, nothing to fetch"),
            SelectionChange::Days | SelectionChange::Months => {}
        }
        for granularity in triggered_by(change) {
            let refresh = self.refresh(*granularity);
            let finished = {
                let mut in_flight = self.in_flight.lock();
                let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut *in_flight)
                    .into_iter()
                    .partition(JoinHandle::is_finished);
                *in_flight = running;
                in_flight.extend(refresh.handles);
                finished
            };
            join_all(finished);
        }
    }

    /// Join every task started through notifications, including ones queued
    /// while waiting
    pub(crate) fn wait_idle(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.in_flight.lock());
            if handles.is_empty() {
                return;
            }
            join_all(handles);
        }
    }

    /// Re-run every date key of `granularity` in the current selection
    ///
    /// The selection is read and every task's generation bumped under the
    /// generations lock, so a later refresh always holds both the newer
    /// snapshot and the newer token.
    pub(crate) fn refresh(self: &Arc<Self>, granularity: Granularity) -> Refresh {
        let (selection, tasks) = {
            let mut generations = self.generations.lock();
            let selection = Arc::new(self.selection.get_selection());
            let keys = match granularity {
                Granularity::Hourly => selection.days.clone(),
                Granularity::Monthly => selection.months.clone(),
            };
            let tasks: Vec<(TaskKey, u64)> = keys
                .into_iter()
                .map(|key| {
                    let task = TaskKey { granularity, key };
                    let token = self.begin(&mut generations, &task);
                    (task, token)
                })
                .collect();
            (selection, tasks)
        };

        let mut handles = Vec::with_capacity(tasks.len());
        for (task, token) in tasks {
            let this = Arc::clone(self);
            let snapshot = Arc::clone(&selection);
            let spawned = thread::Builder::new()
                .name(format!("pvdash-{}-{}", task.granularity, task.key))
                .spawn({
                    let task = task.clone();
                    move || this.run(&task, token, &snapshot)
                });
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    self.complete(&task, token, Err(AppError::Spawn(e)));
                }
            }
        }
        Refresh { handles }
    }

    /// Bump the task's generation and mark it fetching
    fn begin(&self, generations: &mut HashMap<TaskKey, u64>, task: &TaskKey) -> u64 {
        let generation = generations.entry(task.clone()).or_insert(0);
        *generation += 1;
        self.store.mark_fetching(task.granularity, &task.key);
        debug!(
            "Started {} {} (generation {})",
            task.granularity, task.key, *generation
        );
        *generation
    }

    fn run(&self, task: &TaskKey, token: u64, selection: &Selection) {
        let start = Instant::now();
        let outcome = self.synthesize(task, selection);
        if outcome.is_ok() {
            info!(
                "Merged {} {} ({:.2}ms)",
                task.granularity,
                task.key,
                start.elapsed().as_secs_f64() * 1000.0
            );
        }
        self.complete(task, token, outcome);
    }

    fn synthesize(&self, task: &TaskKey, selection: &Selection) -> Result<Series, AppError> {
        let keys = resolve_paths(
            task.granularity,
            &task.key,
            &selection.traffic_types,
            &selection.access_types,
            &selection.domains,
            &selection.domain_options,
        )?;

        match task.granularity {
            Granularity::Hourly => {
                let payloads: Vec<HourlyPayload> = self.fetch_with_retry(task, &keys)?;
                Ok(Series::Hourly(merge_hourly(payloads)))
            }
            Granularity::Monthly => {
                let payloads: Vec<MonthlyPayload> = self.fetch_with_retry(task, &keys)?;
                Ok(Series::Monthly(merge_monthly(payloads)))
            }
        }
    }

    fn fetch_with_retry<T>(&self, task: &TaskKey, keys: &[ShardKey]) -> Result<Vec<T>, AppError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        let mut attempt = 0;
        loop {
            match self.fetcher.fetch_all(keys) {
                Ok(payloads) => return Ok(payloads),
                Err(e) if e.is_retryable() && attempt < self.retry.retries => {
                    attempt += 1;
                    warn!(
                        "Retrying {} {} after error ({attempt}/{}): {e}",
                        task.granularity, task.key, self.retry.retries
                    );
                    thread::sleep(self.retry.backoff * attempt as u32);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Publish or record the outcome if `token` is still current.
    /// Returns false when the result was stale and dropped.
    fn complete(&self, task: &TaskKey, token: u64, outcome: Result<Series, AppError>) -> bool {
        let generations = self.generations.lock();
        let current = generations.get(task).copied().unwrap_or(0);
        if current != token {
            debug!(
                "Discarding stale {} {} (generation {token}, current {current})",
                task.granularity, task.key
            );
            return false;
        }

        match outcome {
            Ok(series) => self.store.publish(&task.key, series),
            Err(e) => {
                warn!("{} {} failed: {e}", task.granularity, task.key);
                self.store
                    .mark_failed(task.granularity, &task.key, e.to_string());
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Dimension, ShardKey};
    use crate::error::FetchError;
    use crate::fetch::ShardStore;
    use crate::fetch::testing::MemoryStore;
    use crate::selection::DimensionOptions;
    use crate::store::FetchState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    fn options() -> DimensionOptions {
        DimensionOptions {
            traffic_types: vec!["user".to_string(), "spider".to_string()],
            access_types: vec!["desktop".to_string()],
            domains: vec!["x.com".to_string(), "y.com".to_string()],
        }
    }

    struct Harness {
        selection: Arc<SelectionStore>,
        store: Arc<DerivedStore>,
        controller: Arc<Controller>,
    }

    fn harness(shards: Arc<dyn ShardStore>, retry: RetryPolicy) -> Harness {
        let selection = Arc::new(SelectionStore::new(&options()));
        selection
            .set_selected(Dimension::TrafficType, "user", true)
            .unwrap();
        selection
            .set_selected(Dimension::AccessType, "desktop", true)
            .unwrap();
        selection.set_selected(Dimension::Domain, "x.com", true).unwrap();
        let fetcher = Arc::new(Fetcher::new(shards, 4).unwrap());
        let store = Arc::new(DerivedStore::new());
        let controller = Controller::new(selection.clone(), fetcher, store.clone(), retry);
        Harness {
            selection,
            store,
            controller,
        }
    }

    /// Returns a fixed payload; the first fetch blocks until released
    struct GatedStore {
        payload: Mutex<String>,
        gate: Mutex<Option<mpsc::Receiver<()>>>,
        calls: AtomicUsize,
    }

    impl ShardStore for GatedStore {
        fn name(&self) -> &'static str {
            "gated"
        }

        fn location(&self) -> String {
            "gated".to_string()
        }

        fn fetch(&self, _key: &ShardKey) -> Result<Vec<u8>, FetchError> {
            let body = self.payload.lock().clone();
            let gate = self.gate.lock().take();
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = gate {
                let _ = gate.recv();
            }
            Ok(body.into_bytes())
        }
    }

    /// Fails the first `failures` fetches, then serves the payload
    struct FlakyStore {
        failures: AtomicUsize,
        payload: &'static str,
    }

    impl ShardStore for FlakyStore {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn location(&self) -> String {
            "flaky".to_string()
        }

        fn fetch(&self, key: &ShardKey) -> Result<Vec<u8>, FetchError> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(FetchError::Status {
                    path: key.path(),
                    status: 503,
                });
            }
            Ok(self.payload.as_bytes().to_vec())
        }
    }

    #[test]
    fn later_trigger_wins_over_slower_earlier_run() {
        let (release, gate) = mpsc::channel();
        let shards = Arc::new(GatedStore {
            payload: Mutex::new(r#"[{"x":"01","y":1}]"#.to_string()),
            gate: Mutex::new(Some(gate)),
            calls: AtomicUsize::new(0),
        });
        let h = harness(shards.clone(), RetryPolicy::default());
        h.selection.set_months(&["2019-09"]).unwrap();

        // Run A picks up the first payload and blocks
        let run_a = h.controller.refresh(Granularity::Monthly);
        while shards.calls.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(1));
        }

        // Run B starts later and finishes first
        *shards.payload.lock() = r#"[{"x":"01","y":2}]"#.to_string();
        let run_b = h.controller.refresh(Granularity::Monthly);
        run_b.wait();
        assert_eq!(h.store.monthly("2019-09").unwrap().points[0].y, 2);

        release.send(()).unwrap();
        run_a.wait();

        assert_eq!(h.store.monthly("2019-09").unwrap().points[0].y, 2);
        assert_eq!(h.store.state(Granularity::Monthly, "2019-09"), FetchState::Ready);
    }

    #[test]
    fn refresh_reads_selection_together_with_its_generation() {
        let shards = Arc::new(MemoryStore::new());
        shards.insert(
            "monthly/user/desktop/x.com/2019-09.json",
            r#"[{"x":"01","y":3}]"#,
        );
        shards.insert(
            "monthly/user/desktop/y.com/2019-09.json",
            r#"[{"x":"01","y":5}]"#,
        );
        let h = harness(shards, RetryPolicy::default());
        h.selection.set_months(&["2019-09"]).unwrap();

        // Hold the generations so the refresh below blocks before claiming a token
        let generations = h.controller.generations.lock();
        let controller = h.controller.clone();
        let pending = thread::spawn(move || controller.refresh(Granularity::Monthly).wait());
        thread::sleep(Duration::from_millis(50));

        h.selection.toggle(Dimension::Domain, "x.com").unwrap();
        h.selection.toggle(Dimension::Domain, "y.com").unwrap();
        drop(generations);
        pending.join().unwrap();

        assert_eq!(h.store.monthly("2019-09").unwrap().total_views(), 5);
    }

    #[test]
    fn notifications_release_finished_tasks() {
        let shards = Arc::new(MemoryStore::new());
        let h = harness(shards, RetryPolicy::default());
        h.controller.attach();

        h.selection.set_months(&["2019-09"]).unwrap();
        while !h.controller.in_flight.lock().iter().all(JoinHandle::is_finished) {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(h.controller.in_flight.lock().len(), 1);

        h.selection.set_months(&["2019-08"]).unwrap();
        assert_eq!(h.controller.in_flight.lock().len(), 1);
        h.controller.wait_idle();
        assert!(h.controller.in_flight.lock().is_empty());
    }

    #[test]
    fn failing_day_does_not_affect_other_days() {
        let shards = Arc::new(MemoryStore::new());
        shards.insert(
            "hourly/user/desktop/x.com/2019-09-03.json",
            r#"{"5":[{"x":"a","y":2},{"x":"b","y":9}]}"#,
        );
        let h = harness(shards, RetryPolicy::default());
        h.selection.set_days(&["2019-09-02", "2019-09-03"]).unwrap();

        let refresh = h.controller.refresh(Granularity::Hourly);
        assert_eq!(refresh.len(), 2);
        refresh.wait();

        assert!(matches!(
            h.store.state(Granularity::Hourly, "2019-09-02"),
            FetchState::Failed { ref reason } if reason.contains("2019-09-02")
        ));
        assert!(h.store.hourly("2019-09-02").is_none());
        assert_eq!(h.store.state(Granularity::Hourly, "2019-09-03"), FetchState::Ready);
        assert_eq!(h.store.hour_slice("2019-09-03", 5)[0].y, 9);
    }

    #[test]
    fn failed_refresh_keeps_previous_series() {
        let shards = Arc::new(MemoryStore::new());
        let path = "monthly/user/desktop/x.com/2019-09.json";
        shards.insert(path, r#"[{"x":"01","y":3}]"#);
        let h = harness(shards.clone(), RetryPolicy::default());
        h.selection.set_months(&["2019-09"]).unwrap();
        h.controller.refresh(Granularity::Monthly).wait();

        shards.remove(path);
        h.controller.refresh(Granularity::Monthly).wait();

        assert!(matches!(
            h.store.state(Granularity::Monthly, "2019-09"),
            FetchState::Failed { .. }
        ));
        assert_eq!(h.store.monthly("2019-09").unwrap().total_views(), 3);
    }

    #[test]
    fn all_domains_sums_every_domain() {
        let shards = Arc::new(MemoryStore::new());
        shards.insert(
            "monthly/user/desktop/x.com/2019-09.json",
            r#"[{"x":"01","y":3}]"#,
        );
        shards.insert(
            "monthly/user/desktop/y.com/2019-09.json",
            r#"[{"x":"01","y":5},{"x":"02","y":2}]"#,
        );
        let h = harness(shards.clone(), RetryPolicy::default());
        h.selection.set_months(&["2019-09"]).unwrap();
        h.selection.toggle(Dimension::Domain, "All").unwrap();

        h.controller.refresh(Granularity::Monthly).wait();

        assert_eq!(
            serde_json::to_string(h.store.monthly("2019-09").unwrap().as_ref()).unwrap(),
            r#"[{"x":"01","y":8},{"x":"02","y":2}]"#
        );
        assert_eq!(shards.calls(), 2);
    }

    #[test]
    fn empty_dimension_publishes_empty_series() {
        let shards = Arc::new(MemoryStore::new());
        let h = harness(shards.clone(), RetryPolicy::default());
        h.selection.set_months(&["2019-09"]).unwrap();
        h.selection.toggle(Dimension::TrafficType, "user").unwrap();

        h.controller.refresh(Granularity::Monthly).wait();

        assert_eq!(h.store.state(Granularity::Monthly, "2019-09"), FetchState::Ready);
        assert!(h.store.monthly("2019-09").unwrap().is_empty());
        assert_eq!(shards.calls(), 0);
    }

    #[test]
    fn notifications_drive_refreshes() {
        let shards = Arc::new(MemoryStore::new());
        shards.insert(
            "hourly/user/desktop/x.com/2019-09-01.json",
            r#"{"0":[{"x":1,"y":4}]}"#,
        );
        shards.insert(
            "hourly/spider/desktop/x.com/2019-09-01.json",
            r#"{"0":[{"x":1,"y":6}]}"#,
        );
        let h = harness(shards.clone(), RetryPolicy::default());
        h.controller.attach();

        h.selection.set_days(&["2019-09-01"]).unwrap();
        h.controller.wait_idle();
        assert_eq!(h.store.hourly("2019-09-01").unwrap().total_views(), 4);

        h.selection.toggle(Dimension::TrafficType, "spider").unwrap();
        h.controller.wait_idle();
        assert_eq!(h.store.hourly("2019-09-01").unwrap().total_views(), 10);
        assert_eq!(
            h.store
                .hour_slice("2019-09-01", 0)
                .iter()
                .map(|p| p.y)
                .collect::<Vec<_>>(),
            vec![6, 4]
        );
    }

    #[test]
    fn hour_change_does_not_refetch() {
        let shards = Arc::new(MemoryStore::new());
        shards.insert(
            "hourly/user/desktop/x.com/2019-09-01.json",
            r#"{"0":[{"x":1,"y":4}],"7":[{"x":2,"y":1}]}"#,
        );
        let h = harness(shards.clone(), RetryPolicy::default());
        h.controller.attach();
        h.selection.set_days(&["2019-09-01"]).unwrap();
        h.controller.wait_idle();
        let calls = shards.calls();

        h.selection.set_current_hour(7).unwrap();
        h.controller.wait_idle();

        assert_eq!(shards.calls(), calls);
        let hour = h.selection.get_selection().current_hour;
        assert_eq!(h.store.hour_slice("2019-09-01", hour)[0].y, 1);
    }

    #[test]
    fn retry_recovers_from_transient_failure() {
        let shards = Arc::new(FlakyStore {
            failures: AtomicUsize::new(1),
            payload: r#"[{"x":"01","y":7}]"#,
        });
        let mut retry = RetryPolicy::new(2);
        retry.backoff = Duration::from_millis(1);
        let h = harness(shards, retry);
        h.selection.set_months(&["2019-09"]).unwrap();

        h.controller.refresh(Granularity::Monthly).wait();

        assert_eq!(h.store.state(Granularity::Monthly, "2019-09"), FetchState::Ready);
        assert_eq!(h.store.monthly("2019-09").unwrap().total_views(), 7);
    }

    #[test]
    fn without_retries_transient_failure_is_reported() {
        let shards = Arc::new(FlakyStore {
            failures: AtomicUsize::new(1),
            payload: r#"[{"x":"01","y":7}]"#,
        });
        let h = harness(shards, RetryPolicy::default());
        h.selection.set_months(&["2019-09"]).unwrap();

        h.controller.refresh(Granularity::Monthly).wait();

        assert!(matches!(
            h.store.state(Granularity::Monthly, "2019-09"),
            FetchState::Failed { ref reason } if reason.contains("503")
        ));
    }

    #[test]
    fn triggers_by_change_kind() {
        let filter = SelectionChange::Filter {
            dimension: Dimension::Domain,
            option: "x.com".to_string(),
            selected: true,
        };
        assert_eq!(triggered_by(&filter).len(), 2);
        assert_eq!(triggered_by(&SelectionChange::Days), &[Granularity::Hourly]);
        assert_eq!(triggered_by(&SelectionChange::Months), &[Granularity::Monthly]);
        assert!(triggered_by(&SelectionChange::Hour(3)).is_empty());
    }
}
