//! Process-set reconciliation.
//!
//! A [`Reconciler`] owns the tracked set and the metric sink. Every call to
//! [`Reconciler::reconcile`] lists the processes, diffs them against the tracked
//! PIDs, tears down the series of vanished processes, refreshes the survivors and
//! registers newly arrived ones.

mod diff;
mod error;

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

pub use diff::{PidDifferences, find_pid_differences};
pub use error::{EnumerationError, PassError};

use crate::metrics::{self, MetricSink, ProcessLabels, ProcessMetrics};
use crate::process::{
    PanicError, ProcessEnumerator, ProcessInfo, ProcessInspector, SnapshotReader,
    resolve_descriptive_name,
};

/// Values the reconciler is configured with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Prefix of every exposed series.
    pub namespace: String,
    /// Only processes whose executable basename equals this are tracked.
    pub binary_filter: Option<String>,
    /// Argument flag holding the descriptive name, without leading dashes.
    pub name_flag: String,
}

impl Settings {
    fn matches(&self, process: &ProcessInfo) -> bool {
        self.binary_filter
            .as_deref()
            .is_none_or(|binary| process.binary_name() == binary)
    }
}

/// A monitored process and its registered series.
#[derive(Debug)]
pub struct TrackedProcess {
    metrics: ProcessMetrics,
}

impl TrackedProcess {
    pub fn labels(&self) -> &ProcessLabels {
        self.metrics.labels()
    }

    pub fn metrics(&self) -> &ProcessMetrics {
        &self.metrics
    }
}

pub type TrackedSet = HashMap<u32, TrackedProcess>;

/// Outcome of one reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub arrived: Vec<u32>,
    pub vanished: Vec<u32>,
    /// Number of surviving processes refreshed from a new snapshot.
    pub updated: usize,
    pub errors: Vec<PassError>,
    pub took: Duration,
    binary_filtered: bool,
}

impl ReconcileReport {
    pub fn log_errors(&self) {
        for err in &self.errors {
            err.log(self.binary_filtered);
        }
    }
}

pub struct Reconciler<E, I, S> {
    enumerator: E,
    reader: SnapshotReader<I>,
    sink: S,
    settings: Settings,
    tracked: TrackedSet,
}

impl<E, I, S> Reconciler<E, I, S>
where
    E: ProcessEnumerator,
    I: ProcessInspector,
    S: MetricSink,
{
    pub fn new(enumerator: E, reader: SnapshotReader<I>, sink: S, settings: Settings) -> Self {
        Self {
            enumerator,
            reader,
            sink,
            settings,
            tracked: TrackedSet::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn tracked(&self) -> &TrackedSet {
        &self.tracked
    }

    /// Runs one reconciliation pass.
    ///
    /// Per-process failures are collected in the returned report and never abort
    /// the pass. A process whose descriptive name cannot be resolved or whose
    /// series cannot be registered is left untracked and retried on the next pass.
    /// A process that cannot be inspected keeps its last values and stays tracked
    /// until the enumerator stops reporting it. Newly arrived processes are built
    /// from the snapshot taken at discovery, or at zero when that snapshot
    /// cannot be read.
    ///
    /// # Errors
    ///
    /// Returns [`EnumerationError`] if the process table cannot be listed. The
    /// tracked set and the sink are left untouched in that case.
    pub fn reconcile(&mut self) -> Result<ReconcileReport, EnumerationError> {
        let started = Instant::now();
        let observed = self.observe()?;
        let diff = find_pid_differences(&self.tracked, &observed);
        let mut report = ReconcileReport {
            binary_filtered: self.settings.binary_filter.is_some(),
            ..Default::default()
        };

        for pid in diff.vanished {
            if let Some(process) = self.tracked.remove(&pid) {
                process.metrics.unregister(&self.sink);
                let labels = process.labels();
                log::info!(
                    "Stopped monitoring process: pid={}, bin={}, name={}",
                    labels.pid,
                    labels.bin,
                    labels.name
                );
                report.vanished.push(pid);
            }
        }

        for (pid, process) in self.tracked.iter_mut() {
            match self.reader.read(*pid) {
                Ok(snapshot) => {
                    report.updated += 1;
                    if let Err(skipped) = process.metrics.update(snapshot) {
                        report.errors.push(skipped.into());
                    }
                }
                Err(err) => report.errors.push(err.into()),
            }
        }

        for pid in diff.arrived {
            let Some(info) = observed.get(&pid) else {
                continue;
            };
            match self.track(info) {
                Ok((process, unreadable)) => {
                    let labels = process.labels();
                    log::info!(
                        "Started monitoring process: pid={}, bin={}, name={}",
                        labels.pid,
                        labels.bin,
                        labels.name
                    );
                    self.tracked.insert(pid, process);
                    report.arrived.push(pid);
                    report.errors.extend(unreadable);
                }
                Err(err) => report.errors.push(err),
            }
        }

        report.took = started.elapsed();
        log::trace!(
            "reconcile() took {} microseconds: tracked={}, arrived={}, vanished={}, errors={}",
            report.took.as_micros(),
            self.tracked.len(),
            report.arrived.len(),
            report.vanished.len(),
            report.errors.len()
        );
        Ok(report)
    }

    /// Renders the sink in the text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        metrics::render(&self.sink)
    }

    /// Unregisters every tracked process and empties the tracked set.
    pub fn teardown(&mut self) -> usize {
        let count = self.tracked.len();
        for (_, process) in self.tracked.drain() {
            process.metrics.unregister(&self.sink);
        }
        log::debug!("Unregistered {count} tracked processes");
        count
    }

    fn observe(&self) -> Result<HashMap<u32, ProcessInfo>, EnumerationError> {
        let processes = match catch_unwind(AssertUnwindSafe(|| self.enumerator.processes())) {
            Ok(Ok(processes)) => processes,
            Ok(Err(err)) => {
                return Err(EnumerationError {
                    source: Box::new(err),
                });
            }
            Err(payload) => {
                return Err(EnumerationError {
                    source: Box::new(PanicError::from_payload(payload)),
                });
            }
        };

        Ok(processes
            .into_iter()
            .filter(|process| self.settings.matches(process))
            .map(|process| (process.pid, process))
            .collect())
    }

    /// Registers the series of a new process, along with the error of its first
    /// inspection if that failed.
    fn track(
        &self,
        info: &ProcessInfo,
    ) -> Result<(TrackedProcess, Option<PassError>), PassError> {
        let name = resolve_descriptive_name(&info.args, &self.settings.name_flag).map_err(
            |source| PassError::NameResolution {
                pid: info.pid,
                source,
            },
        )?;
        let (first, unreadable) = match self.reader.read(info.pid) {
            Ok(snapshot) => (Some(snapshot), None),
            Err(err) => (None, Some(PassError::from(err))),
        };
        let labels = ProcessLabels {
            pid: info.pid,
            bin: info.binary_name().to_owned(),
            name,
        };
        let metrics = ProcessMetrics::new(&self.settings.namespace, labels, first)?;
        metrics.register(&self.sink)?;
        Ok((TrackedProcess { metrics }, unreadable))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory process table shared by the reconciler and guard tests.

    use std::cell::Cell;
    use std::collections::{BTreeMap, HashSet};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use prometheus::core::Collector;
    use prometheus::proto::MetricFamily;
    use prometheus::Registry;

    use super::*;
    use crate::process::ProcessCounters;

    pub const BIN: &str = "prcexpintdum";

    thread_local! {
        static NOW: Cell<u64> = const { Cell::new(1_700_000_000) };
    }

    /// Clock of the current test thread, moved forward with [`advance_clock`].
    pub fn fake_clock() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(NOW.with(Cell::get))
    }

    pub fn advance_clock(secs: u64) {
        NOW.with(|now| now.set(now.get() + secs));
    }

    #[derive(Debug, thiserror::Error)]
    pub enum FakeError {
        #[error("process table unavailable")]
        Enumeration,
        #[error("no such process")]
        NoSuchProcess,
        #[error("permission denied")]
        PermissionDenied,
    }

    #[derive(Default)]
    struct FakeState {
        processes: BTreeMap<u32, (ProcessInfo, ProcessCounters)>,
        enumeration_fails: bool,
        enumeration_panics: bool,
        unreadable: HashSet<u32>,
        panicking: HashSet<u32>,
    }

    #[derive(Clone, Default)]
    pub struct FakeOs {
        state: Arc<Mutex<FakeState>>,
    }

    impl FakeOs {
        /// Starts `bin` with `-name dummy<pid>`.
        pub fn spawn(&self, pid: u32, bin: &str) {
            self.spawn_with_args(pid, bin, &["-name", &format!("dummy{pid}")]);
        }

        pub fn spawn_with_args(&self, pid: u32, bin: &str, args: &[&str]) {
            let info = ProcessInfo {
                pid,
                ppid: 1,
                executable: Some(PathBuf::from("/usr/bin").join(bin)),
                comm: bin.to_owned(),
                args: std::iter::once(bin)
                    .chain(args.iter().copied())
                    .map(String::from)
                    .collect(),
            };
            self.state
                .lock()
                .unwrap()
                .processes
                .insert(pid, (info, ProcessCounters::default()));
        }

        pub fn kill(&self, pid: u32) {
            self.state.lock().unwrap().processes.remove(&pid);
        }

        pub fn update(&self, pid: u32, f: impl FnOnce(&mut ProcessCounters)) {
            let mut state = self.state.lock().unwrap();
            if let Some((_, counters)) = state.processes.get_mut(&pid) {
                f(counters);
            }
        }

        pub fn set_enumeration_fails(&self, fails: bool) {
            self.state.lock().unwrap().enumeration_fails = fails;
        }

        pub fn set_enumeration_panics(&self, panics: bool) {
            self.state.lock().unwrap().enumeration_panics = panics;
        }

        pub fn set_unreadable(&self, pid: u32, unreadable: bool) {
            let mut state = self.state.lock().unwrap();
            if unreadable {
                state.unreadable.insert(pid);
            } else {
                state.unreadable.remove(&pid);
            }
        }

        pub fn set_panicking(&self, pid: u32, panicking: bool) {
            let mut state = self.state.lock().unwrap();
            if panicking {
                state.panicking.insert(pid);
            } else {
                state.panicking.remove(&pid);
            }
        }
    }

    impl ProcessEnumerator for FakeOs {
        type Error = FakeError;

        fn processes(&self) -> Result<Vec<ProcessInfo>, FakeError> {
            let state = self.state.lock().unwrap();
            if state.enumeration_panics {
                drop(state);
                panic!("cannot list process table");
            }
            if state.enumeration_fails {
                return Err(FakeError::Enumeration);
            }
            Ok(state.processes.values().map(|(info, _)| info.clone()).collect())
        }
    }

    impl ProcessInspector for FakeOs {
        type Error = FakeError;

        fn inspect(&self, pid: u32) -> Result<ProcessCounters, FakeError> {
            let state = self.state.lock().unwrap();
            if state.panicking.contains(&pid) {
                drop(state);
                panic!("permission fault reading {pid}");
            }
            if state.unreadable.contains(&pid) {
                return Err(FakeError::PermissionDenied);
            }
            state
                .processes
                .get(&pid)
                .map(|(_, counters)| *counters)
                .ok_or(FakeError::NoSuchProcess)
        }
    }

    /// A registry that counts the calls made to it.
    pub struct CountingSink {
        pub registry: Registry,
        pub registrations: AtomicUsize,
        pub unregistrations: AtomicUsize,
    }

    impl CountingSink {
        pub fn new() -> Self {
            Self {
                registry: Registry::new(),
                registrations: AtomicUsize::new(0),
                unregistrations: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> (usize, usize) {
            (
                self.registrations.load(Ordering::SeqCst),
                self.unregistrations.load(Ordering::SeqCst),
            )
        }

        /// Number of individual series currently exposed.
        pub fn series(&self) -> usize {
            self.registry
                .gather()
                .iter()
                .map(|mf| mf.get_metric().len())
                .sum()
        }
    }

    impl MetricSink for CountingSink {
        fn register(&self, collector: Box<dyn Collector>) -> prometheus::Result<()> {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            self.registry.register(collector)
        }

        fn unregister(&self, collector: Box<dyn Collector>) {
            self.unregistrations.fetch_add(1, Ordering::SeqCst);
            MetricSink::unregister(&self.registry, collector);
        }

        fn gather(&self) -> Vec<MetricFamily> {
            self.registry.gather()
        }
    }

    pub type FakeReconciler = Reconciler<FakeOs, FakeOs, CountingSink>;

    pub fn reconciler(os: &FakeOs, binary_filter: Option<&str>) -> FakeReconciler {
        Reconciler::new(
            os.clone(),
            SnapshotReader::with_clock(os.clone(), fake_clock),
            CountingSink::new(),
            Settings {
                namespace: "mine".into(),
                binary_filter: binary_filter.map(String::from),
                name_flag: "name".into(),
            },
        )
    }

    /// Value of `mine_<series>` for `pid` in a rendered exposition.
    pub fn sample(output: &str, series: &str, pid: u32) -> Option<f64> {
        let prefix = format!("mine_{series}{{");
        let label = format!("pid=\"{pid}\"");
        output
            .lines()
            .find(|line| line.starts_with(&prefix) && line.contains(&label))
            .and_then(|line| line.rsplit(' ').next())
            .and_then(|value| value.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use prometheus::{IntCounter, Opts};

    use super::testing::*;
    use super::*;

    const SERIES_PER_PROCESS: usize = 9;

    fn assert_tracked_matches_registry(reconciler: &FakeReconciler) {
        assert_eq!(
            reconciler.sink().series(),
            reconciler.tracked().len() * SERIES_PER_PROCESS
        );
    }

    #[test]
    fn test_first_pass_tracks_matching_processes() {
        let os = FakeOs::default();
        os.spawn(17, BIN);
        os.spawn(19, BIN);
        os.spawn(20, "bash");
        let mut reconciler = reconciler(&os, Some(BIN));

        let report = reconciler.reconcile().unwrap();
        assert_eq!(report.arrived, vec![17, 19]);
        assert!(report.vanished.is_empty());
        assert!(report.errors.is_empty());
        assert_eq!(report.updated, 0);

        let output = reconciler.render().unwrap();
        assert!(output.contains(
            "mine_disk_write_bytes{bin=\"prcexpintdum\",name=\"dummy17\",pid=\"17\"} 0"
        ));
        assert!(!output.contains("pid=\"20\""));
        assert_eq!(reconciler.sink().calls(), (18, 0));
        assert_tracked_matches_registry(&reconciler);
    }

    #[test]
    fn test_unfiltered_pass_skips_unnamed_processes() {
        let os = FakeOs::default();
        os.spawn(17, BIN);
        os.spawn_with_args(20, "bash", &["-l"]);
        let mut reconciler = reconciler(&os, None);

        let report = reconciler.reconcile().unwrap();
        assert_eq!(report.arrived, vec![17]);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(
            report.errors[0],
            PassError::NameResolution { pid: 20, .. }
        ));
        assert!(!reconciler.tracked().contains_key(&20));
        assert_tracked_matches_registry(&reconciler);
    }

    #[test]
    fn test_second_pass_is_idempotent() {
        let os = FakeOs::default();
        os.spawn(17, BIN);
        os.update(17, |c| {
            c.rss_bytes = 4096;
            c.disk_write_bytes = 100;
        });
        let mut reconciler = reconciler(&os, Some(BIN));
        reconciler.reconcile().unwrap();
        let calls = reconciler.sink().calls();
        let before = reconciler.render().unwrap();

        advance_clock(5);
        let report = reconciler.reconcile().unwrap();
        assert!(report.arrived.is_empty());
        assert!(report.vanished.is_empty());
        assert!(report.errors.is_empty());
        assert_eq!(report.updated, 1);
        assert_eq!(reconciler.sink().calls(), calls);
        assert_eq!(reconciler.render().unwrap(), before);
    }

    #[test]
    fn test_vanished_process_is_unregistered() {
        let os = FakeOs::default();
        os.spawn(17, BIN);
        os.spawn(19, BIN);
        let mut reconciler = reconciler(&os, Some(BIN));
        reconciler.reconcile().unwrap();

        os.kill(17);
        advance_clock(5);
        let report = reconciler.reconcile().unwrap();
        assert_eq!(report.vanished, vec![17]);
        assert_eq!(reconciler.sink().calls(), (18, 9));

        let output = reconciler.render().unwrap();
        assert!(!output.contains("pid=\"17\""));
        assert!(output.contains("pid=\"19\""));
        assert_tracked_matches_registry(&reconciler);
    }

    #[test]
    fn test_reconcile_diff_scenario() {
        let os = FakeOs::default();
        for pid in [5, 7, 11, 13] {
            os.spawn(pid, BIN);
        }
        let mut reconciler = reconciler(&os, Some(BIN));
        reconciler.reconcile().unwrap();

        os.kill(7);
        os.kill(13);
        os.spawn(17, BIN);
        os.spawn(19, BIN);
        advance_clock(5);
        let report = reconciler.reconcile().unwrap();
        assert_eq!(report.vanished, vec![7, 13]);
        assert_eq!(report.arrived, vec![17, 19]);
        assert_eq!(report.updated, 2);

        let mut pids: Vec<u32> = reconciler.tracked().keys().copied().collect();
        pids.sort_unstable();
        assert_eq!(pids, vec![5, 11, 17, 19]);
        assert_tracked_matches_registry(&reconciler);
    }

    #[test]
    fn test_disk_write_counter_follows_writes() {
        let os = FakeOs::default();
        os.spawn(17, BIN);
        os.update(17, |c| c.disk_write_bytes = 100);
        let mut reconciler = reconciler(&os, Some(BIN));
        reconciler.reconcile().unwrap();
        let initial = sample(&reconciler.render().unwrap(), "disk_write_bytes", 17).unwrap();

        os.update(17, |c| c.disk_write_bytes += 1024);
        advance_clock(5);
        reconciler.reconcile().unwrap();
        let written = sample(&reconciler.render().unwrap(), "disk_write_bytes", 17).unwrap();
        let delta = written - initial;
        assert!((1024.0..=8192.0).contains(&delta), "delta was {delta}");

        advance_clock(5);
        reconciler.reconcile().unwrap();
        let idle = sample(&reconciler.render().unwrap(), "disk_write_bytes", 17).unwrap();
        assert_eq!(idle, written);
    }

    #[test]
    fn test_counter_reset_is_clamped() {
        let os = FakeOs::default();
        os.spawn(17, BIN);
        os.update(17, |c| c.net_read_bytes = 5000);
        let mut reconciler = reconciler(&os, Some(BIN));
        reconciler.reconcile().unwrap();

        let mut last = 0.0;
        for value in [6000, 10, 10, 500] {
            os.update(17, |c| c.net_read_bytes = value);
            advance_clock(1);
            reconciler.reconcile().unwrap();
            let exposed = sample(&reconciler.render().unwrap(), "net_read_bytes", 17).unwrap();
            assert!(exposed >= last);
            last = exposed;
        }
        assert_eq!(last, 5000.0 + 1000.0 + 490.0);
    }

    #[test]
    fn test_cpu_gauge() {
        let os = FakeOs::default();
        os.spawn(17, BIN);
        os.update(17, |c| c.cpu_time = Duration::from_secs(1));
        let mut reconciler = reconciler(&os, Some(BIN));
        reconciler.reconcile().unwrap();
        assert_eq!(sample(&reconciler.render().unwrap(), "cpu", 17), Some(0.0));

        os.update(17, |c| c.cpu_time = Duration::from_secs(3));
        advance_clock(4);
        reconciler.reconcile().unwrap();
        assert_eq!(sample(&reconciler.render().unwrap(), "cpu", 17), Some(50.0));
    }

    #[test]
    fn test_cpu_skipped_without_elapsed_time() {
        let os = FakeOs::default();
        os.spawn(17, BIN);
        let mut reconciler = reconciler(&os, Some(BIN));
        reconciler.reconcile().unwrap();

        os.update(17, |c| {
            c.cpu_time = Duration::from_secs(3);
            c.rss_bytes = 8192;
        });
        let report = reconciler.reconcile().unwrap();
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], PassError::CpuSampleSkipped(_)));
        assert_eq!(report.errors[0].pid(), 17);

        let output = reconciler.render().unwrap();
        assert_eq!(sample(&output, "cpu", 17), Some(0.0));
        assert_eq!(sample(&output, "ram", 17), Some(8192.0));
    }

    #[test]
    fn test_transient_read_failure_keeps_process() {
        let os = FakeOs::default();
        os.spawn(17, BIN);
        os.update(17, |c| c.disk_reads = 7);
        let mut reconciler = reconciler(&os, Some(BIN));
        reconciler.reconcile().unwrap();

        os.set_unreadable(17, true);
        os.update(17, |c| c.disk_reads = 9);
        advance_clock(5);
        let report = reconciler.reconcile().unwrap();
        assert_eq!(report.updated, 0);
        assert!(matches!(report.errors[0], PassError::Unavailable(_)));
        assert!(reconciler.tracked().contains_key(&17));
        assert_eq!(sample(&reconciler.render().unwrap(), "disk_reads", 17), Some(7.0));

        os.set_unreadable(17, false);
        advance_clock(5);
        reconciler.reconcile().unwrap();
        assert_eq!(sample(&reconciler.render().unwrap(), "disk_reads", 17), Some(9.0));
    }

    #[test]
    fn test_inspector_panic_is_per_process_error() {
        let os = FakeOs::default();
        os.spawn(17, BIN);
        os.spawn(19, BIN);
        let mut reconciler = reconciler(&os, Some(BIN));
        reconciler.reconcile().unwrap();

        os.set_panicking(19, true);
        os.update(17, |c| c.disk_writes = 3);
        advance_clock(5);
        let report = reconciler.reconcile().unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].pid(), 19);
        assert!(report.errors[0].to_string().contains("permission fault"));
        assert_eq!(sample(&reconciler.render().unwrap(), "disk_writes", 17), Some(3.0));
        assert!(reconciler.tracked().contains_key(&19));
    }

    #[test]
    fn test_unreadable_arrival_stays_tracked() {
        let os = FakeOs::default();
        os.spawn(17, BIN);
        os.set_unreadable(17, true);
        let mut reconciler = reconciler(&os, Some(BIN));

        let report = reconciler.reconcile().unwrap();
        assert_eq!(report.arrived, vec![17]);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], PassError::Unavailable(_)));
        assert_eq!(reconciler.sink().series(), SERIES_PER_PROCESS);

        for _ in 0..2 {
            advance_clock(5);
            let report = reconciler.reconcile().unwrap();
            assert!(report.arrived.is_empty());
            assert!(matches!(report.errors[0], PassError::Unavailable(_)));
            assert!(reconciler.tracked().contains_key(&17));
        }
        assert_eq!(reconciler.sink().calls(), (SERIES_PER_PROCESS, 0));
        assert_eq!(sample(&reconciler.render().unwrap(), "disk_reads", 17), Some(0.0));

        // the first readable snapshot is only a baseline
        os.update(17, |c| c.disk_reads = 7);
        os.set_unreadable(17, false);
        advance_clock(5);
        let report = reconciler.reconcile().unwrap();
        assert!(report.errors.is_empty());
        assert_eq!(sample(&reconciler.render().unwrap(), "disk_reads", 17), Some(0.0));

        os.update(17, |c| c.disk_reads = 9);
        advance_clock(5);
        reconciler.reconcile().unwrap();
        assert_eq!(sample(&reconciler.render().unwrap(), "disk_reads", 17), Some(2.0));
        assert_tracked_matches_registry(&reconciler);
    }

    #[test]
    fn test_panicking_arrival_is_tracked() {
        let os = FakeOs::default();
        os.spawn(17, BIN);
        os.set_panicking(17, true);
        let mut reconciler = reconciler(&os, Some(BIN));

        let report = reconciler.reconcile().unwrap();
        assert_eq!(report.arrived, vec![17]);
        assert!(matches!(report.errors[0], PassError::Unavailable(_)));
        assert!(reconciler.tracked().contains_key(&17));

        os.kill(17);
        let report = reconciler.reconcile().unwrap();
        assert_eq!(report.vanished, vec![17]);
        assert_eq!(reconciler.sink().series(), 0);
    }

    #[test]
    fn test_name_failure_retried_next_pass() {
        let os = FakeOs::default();
        os.spawn_with_args(17, BIN, &["-name"]);
        let mut reconciler = reconciler(&os, Some(BIN));

        let report = reconciler.reconcile().unwrap();
        assert!(matches!(
            report.errors[0],
            PassError::NameResolution { pid: 17, .. }
        ));
        assert!(reconciler.tracked().is_empty());

        os.spawn_with_args(17, BIN, &["--name", "late"]);
        let report = reconciler.reconcile().unwrap();
        assert_eq!(report.arrived, vec![17]);
        assert_eq!(reconciler.tracked()[&17].labels().name, "late");
    }

    #[test]
    fn test_registration_conflict_rolls_back() {
        let os = FakeOs::default();
        os.spawn(17, BIN);
        let mut reconciler = reconciler(&os, Some(BIN));

        let squatter = IntCounter::with_opts(
            Opts::new("net_read_bytes", "Total received from network (bytes)")
                .namespace("mine")
                .const_label("pid", "17")
                .const_label("bin", BIN)
                .const_label("name", "dummy17"),
        )
        .unwrap();
        reconciler
            .sink()
            .registry
            .register(Box::new(squatter.clone()))
            .unwrap();

        let report = reconciler.reconcile().unwrap();
        assert!(report.arrived.is_empty());
        assert!(matches!(report.errors[0], PassError::Metrics(_)));
        assert!(reconciler.tracked().is_empty());
        assert_eq!(reconciler.sink().series(), 1);

        reconciler.sink().registry.unregister(Box::new(squatter)).unwrap();
        let report = reconciler.reconcile().unwrap();
        assert_eq!(report.arrived, vec![17]);
        assert_tracked_matches_registry(&reconciler);
    }

    #[test]
    fn test_enumeration_failure_preserves_state() {
        let os = FakeOs::default();
        os.spawn(17, BIN);
        let mut reconciler = reconciler(&os, Some(BIN));
        reconciler.reconcile().unwrap();
        let before = reconciler.render().unwrap();
        let calls = reconciler.sink().calls();

        os.kill(17);
        os.set_enumeration_fails(true);
        let err = reconciler.reconcile().unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to enumerate processes: process table unavailable"
        );
        assert!(reconciler.tracked().contains_key(&17));
        assert_eq!(reconciler.render().unwrap(), before);
        assert_eq!(reconciler.sink().calls(), calls);

        os.set_enumeration_fails(false);
        let report = reconciler.reconcile().unwrap();
        assert_eq!(report.vanished, vec![17]);
    }

    #[test]
    fn test_enumeration_panic_is_error() {
        let os = FakeOs::default();
        os.set_enumeration_panics(true);
        let mut reconciler = reconciler(&os, None);
        let err = reconciler.reconcile().unwrap_err();
        assert!(err.to_string().contains("cannot list process table"));
    }

    #[test]
    fn test_teardown_unregisters_everything() {
        let os = FakeOs::default();
        os.spawn(17, BIN);
        os.spawn(19, BIN);
        let mut reconciler = reconciler(&os, Some(BIN));
        reconciler.reconcile().unwrap();

        assert_eq!(reconciler.teardown(), 2);
        assert!(reconciler.tracked().is_empty());
        assert_eq!(reconciler.render().unwrap(), "");
        assert_eq!(reconciler.teardown(), 0);
    }
}
