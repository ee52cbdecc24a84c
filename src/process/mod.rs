//! Process-level data model and the seams to the operating system.
//!
//! The core never talks to `/proc` directly. It sees the process table through two
//! traits:
//!
//! - [`ProcessEnumerator`] lists the running processes ([`ProcessInfo`]).
//! - [`ProcessInspector`] reads the cumulative counters of one PID ([`ProcessCounters`]).
//!
//! [`SnapshotReader`] wraps an inspector, stamps every reading with its capture time
//! and turns both errors and panics of the OS layer into [`ProcessUnavailable`].
//! [`resolve_descriptive_name`] extracts the human-readable label a process was
//! started with.

mod error;
mod name;
mod snapshot;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use error::{BoxError, PanicError, ProcessUnavailable};
pub use name::{NameNotFound, resolve_descriptive_name};
pub use snapshot::{ProcessSnapshot, SnapshotReader};

/// Suffix the kernel appends to `/proc/<pid>/exe` once the binary was replaced or removed.
const DELETED_SUFFIX: &str = " (deleted)";

/// A running process as reported by the enumerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub ppid: u32,
    /// Resolved executable path, if readable.
    pub executable: Option<PathBuf>,
    /// Kernel command name, used when the executable path is not available.
    pub comm: String,
    /// Full argument vector including `argv[0]`.
    pub args: Vec<String>,
}

impl ProcessInfo {
    /// Basename of the executable, falling back to the command name.
    ///
    /// # Examples
    ///
    /// ```
    /// # use proc_metrics_exporter::process::ProcessInfo;
    /// let info = ProcessInfo {
    ///     pid: 42,
    ///     ppid: 1,
    ///     executable: Some("/usr/local/bin/answertoeverything".into()),
    ///     comm: "answertoeveryt".into(),
    ///     args: vec![],
    /// };
    /// assert_eq!(info.binary_name(), "answertoeverything");
    /// ```
    pub fn binary_name(&self) -> &str {
        self.executable
            .as_deref()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
            .map(|name| name.strip_suffix(DELETED_SUFFIX).unwrap_or(name))
            .unwrap_or(&self.comm)
    }
}

/// Cumulative counters of a process, as read in one inspection call.
///
/// Everything except the memory figures only grows while the process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessCounters {
    /// User plus system CPU time consumed since process start.
    pub cpu_time: Duration,
    /// Resident memory (instantaneous).
    pub rss_bytes: u64,
    /// Swapped-out memory (instantaneous).
    pub swap_bytes: u64,
    pub disk_read_bytes: u64,
    pub disk_write_bytes: u64,
    pub disk_reads: u64,
    pub disk_writes: u64,
    pub net_read_bytes: u64,
    pub net_write_bytes: u64,
}

/// Lists the currently running processes.
pub trait ProcessEnumerator {
    type Error: std::error::Error + Send + Sync + 'static;

    fn processes(&self) -> Result<Vec<ProcessInfo>, Self::Error>;
}

/// Reads the cumulative counters of a single process.
///
/// Fails if the process exited or became inaccessible since it was enumerated.
pub trait ProcessInspector {
    type Error: std::error::Error + Send + Sync + 'static;

    fn inspect(&self, pid: u32) -> Result<ProcessCounters, Self::Error>;
}
