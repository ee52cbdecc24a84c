use std::fmt;

use prometheus::core::Collector;
use prometheus::{Gauge, IntCounter, IntGauge, Opts};

use super::sink::MetricSink;
use super::{Error, Result};
use crate::process::ProcessSnapshot;

/// Immutable labels attached to every series of a tracked process.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcessLabels {
    pub pid: u32,
    /// Executable basename.
    pub bin: String,
    /// Descriptive name resolved from the command line at discovery.
    pub name: String,
}

/// The CPU gauge was left untouched because no wall-clock time passed between samples.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("non-positive sampling interval for PID {pid}, keeping previous CPU value")]
pub struct CpuSampleSkipped {
    pub pid: u32,
}

/// The exposed series of one process plus the snapshot needed for delta computation.
pub struct ProcessMetrics {
    labels: ProcessLabels,
    previous: Option<ProcessSnapshot>,
    cpu: Gauge,
    ram: IntGauge,
    swap: IntGauge,
    disk_read_bytes: IntCounter,
    disk_write_bytes: IntCounter,
    disk_reads: IntCounter,
    disk_writes: IntCounter,
    net_read_bytes: IntCounter,
    net_write_bytes: IntCounter,
}

impl ProcessMetrics {
    /// Builds the series of a newly discovered process.
    ///
    /// With a discovery snapshot, gauges take its memory figures and counters
    /// start at its cumulative totals. Without one every series starts at zero and
    /// the first snapshot passed to [`update`](Self::update) only sets the
    /// baseline. The CPU gauge stays at zero until a second snapshot provides an
    /// interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Series`] if the namespace or a label makes an invalid series.
    pub fn new(
        namespace: &str,
        labels: ProcessLabels,
        first: Option<ProcessSnapshot>,
    ) -> Result<Self> {
        let pid = labels.pid;
        let (bin, descriptive_name) = (labels.bin.clone(), labels.name.clone());
        let opts = |name: &str, help: &str| {
            Opts::new(name, help)
                .namespace(namespace)
                .const_label("pid", pid.to_string())
                .const_label("bin", bin.clone())
                .const_label("name", descriptive_name.clone())
        };
        let gauge = |name: &'static str, help: &str| {
            Gauge::with_opts(opts(name, help)).map_err(|source| Error::Series { pid, name, source })
        };
        let int_gauge = |name: &'static str, help: &str| {
            IntGauge::with_opts(opts(name, help))
                .map_err(|source| Error::Series { pid, name, source })
        };
        let counter = |name: &'static str, help: &str| {
            IntCounter::with_opts(opts(name, help))
                .map_err(|source| Error::Series { pid, name, source })
        };

        let metrics = Self {
            cpu: gauge("cpu", "Process CPU usage (%)")?,
            ram: int_gauge("ram", "Process RAM usage (bytes)")?,
            swap: int_gauge("swap", "Process swap usage (bytes)")?,
            disk_read_bytes: counter("disk_read_bytes", "Total read from disk (bytes)")?,
            disk_write_bytes: counter("disk_write_bytes", "Total written to disk (bytes)")?,
            disk_reads: counter("disk_reads", "Total reads from disk")?,
            disk_writes: counter("disk_writes", "Total writes to disk")?,
            net_read_bytes: counter("net_read_bytes", "Total received from network (bytes)")?,
            net_write_bytes: counter("net_write_bytes", "Total sent to network (bytes)")?,
            labels,
            previous: first,
        };

        if let Some(snapshot) = first {
            let c = &snapshot.counters;
            metrics.set_memory(&snapshot);
            metrics.disk_read_bytes.inc_by(c.disk_read_bytes);
            metrics.disk_write_bytes.inc_by(c.disk_write_bytes);
            metrics.disk_reads.inc_by(c.disk_reads);
            metrics.disk_writes.inc_by(c.disk_writes);
            metrics.net_read_bytes.inc_by(c.net_read_bytes);
            metrics.net_write_bytes.inc_by(c.net_write_bytes);
        }

        Ok(metrics)
    }

    pub fn labels(&self) -> &ProcessLabels {
        &self.labels
    }

    /// Applies a fresh snapshot and keeps it as the baseline for the next update.
    ///
    /// Memory gauges are overwritten, counters advance by the non-negative
    /// difference to the previous snapshot and the CPU gauge becomes the share of
    /// one core used over the elapsed wall-clock time, in percent. Without a
    /// previous snapshot only the memory gauges change.
    ///
    /// # Errors
    ///
    /// Returns [`CpuSampleSkipped`] when the elapsed time is not positive. All other
    /// values are still updated in that case.
    pub fn update(&mut self, snapshot: ProcessSnapshot) -> std::result::Result<(), CpuSampleSkipped> {
        self.set_memory(&snapshot);
        let Some(previous) = self.previous.replace(snapshot) else {
            return Ok(());
        };
        let prev = previous.counters;
        let cur = snapshot.counters;

        advance(&self.disk_read_bytes, prev.disk_read_bytes, cur.disk_read_bytes);
        advance(&self.disk_write_bytes, prev.disk_write_bytes, cur.disk_write_bytes);
        advance(&self.disk_reads, prev.disk_reads, cur.disk_reads);
        advance(&self.disk_writes, prev.disk_writes, cur.disk_writes);
        advance(&self.net_read_bytes, prev.net_read_bytes, cur.net_read_bytes);
        advance(&self.net_write_bytes, prev.net_write_bytes, cur.net_write_bytes);

        match snapshot.captured_at.duration_since(previous.captured_at) {
            Ok(elapsed) if !elapsed.is_zero() => {
                let used = cur.cpu_time.saturating_sub(prev.cpu_time);
                self.cpu.set(100.0 * used.as_secs_f64() / elapsed.as_secs_f64());
                Ok(())
            }
            _ => Err(CpuSampleSkipped {
                pid: self.labels.pid,
            }),
        }
    }

    /// Adds every series to the sink, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Registration`] on the first collision, after removing the
    /// series this call already added.
    pub fn register<S: MetricSink + ?Sized>(&self, sink: &S) -> Result<()> {
        for (added, collector) in self.collectors().into_iter().enumerate() {
            if let Err(source) = sink.register(collector) {
                for collector in self.collectors().into_iter().take(added) {
                    sink.unregister(collector);
                }
                return Err(Error::Registration {
                    pid: self.labels.pid,
                    source,
                });
            }
        }
        Ok(())
    }

    /// Removes every series from the sink. Safe to call repeatedly.
    pub fn unregister<S: MetricSink + ?Sized>(&self, sink: &S) {
        for collector in self.collectors() {
            sink.unregister(collector);
        }
    }

    fn set_memory(&self, snapshot: &ProcessSnapshot) {
        self.ram.set(saturating_i64(snapshot.counters.rss_bytes));
        self.swap.set(saturating_i64(snapshot.counters.swap_bytes));
    }

    fn collectors(&self) -> Vec<Box<dyn Collector>> {
        vec![
            Box::new(self.cpu.clone()),
            Box::new(self.ram.clone()),
            Box::new(self.swap.clone()),
            Box::new(self.disk_read_bytes.clone()),
            Box::new(self.disk_write_bytes.clone()),
            Box::new(self.disk_reads.clone()),
            Box::new(self.disk_writes.clone()),
            Box::new(self.net_read_bytes.clone()),
            Box::new(self.net_write_bytes.clone()),
        ]
    }
}

impl fmt::Debug for ProcessMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessMetrics")
            .field("labels", &self.labels)
            .field("previous", &self.previous)
            .finish_non_exhaustive()
    }
}

/// Advances a counter by `current - previous`, clamping resets to zero.
fn advance(counter: &IntCounter, previous: u64, current: u64) {
    counter.inc_by(current.saturating_sub(previous));
}

fn saturating_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}
