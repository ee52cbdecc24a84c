//! Linux implementation of the process enumerator and inspector.
//!
//! [`ProcFs`] reads a mounted proc filesystem directly. The mount point is a
//! parameter so the exporter can observe the host from inside a container (via a
//! bind-mounted `/rootfs/proc`) and so tests can point it at a fabricated tree.
//!
//! # Files read per process
//!
//! - `stat`: command name, parent PID, user and system CPU ticks
//! - `exe`: resolved executable path (falls back to the command name)
//! - `cmdline`: NUL-separated argument vector
//! - `status`: `VmRSS` and `VmSwap`
//! - `io`: storage bytes and read/write syscall counts
//! - `net/dev`: traffic of the process's network namespace

mod error;
mod io;
mod net;
mod parser;
mod stat;
mod status;

use std::path::{Path, PathBuf};
use std::time::Duration;

pub use error::{Error, Result, StatParseError};
pub use io::IoCounters;
pub use net::NetworkStat;
pub use parser::KeyValueStat;
pub use stat::ProcStat;
pub use status::MemoryStatus;

use crate::fsutil;
use crate::process::{ProcessCounters, ProcessEnumerator, ProcessInfo, ProcessInspector};

/// Fallback when `sysconf(_SC_CLK_TCK)` is unavailable (Linux `USER_HZ`).
const DEFAULT_TICKS_PER_SECOND: u64 = 100;

/// System clock ticks per second, the unit of `utime`/`stime` in `stat`.
pub fn clock_ticks_per_second() -> u64 {
    static CLK_TCK: std::sync::OnceLock<u64> = std::sync::OnceLock::new();
    *CLK_TCK.get_or_init(|| {
        // SAFETY: sysconf has no preconditions and only reads system configuration.
        let tck = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        if tck > 0 {
            tck as u64
        } else {
            DEFAULT_TICKS_PER_SECOND
        }
    })
}

/// Splits the raw content of `/proc/<pid>/cmdline` into arguments.
pub fn parse_cmdline(raw: &[u8]) -> Vec<String> {
    let raw = raw.strip_suffix(&[0]).unwrap_or(raw);
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(|b| *b == 0)
        .map(|arg| String::from_utf8_lossy(arg).into_owned())
        .collect()
}

/// Handle on a proc filesystem mount.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
    ticks_per_second: u64,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_ticks_per_second(root, clock_ticks_per_second())
    }

    pub fn with_ticks_per_second(root: impl Into<PathBuf>, ticks_per_second: u64) -> Self {
        Self {
            root: root.into(),
            ticks_per_second: ticks_per_second.max(1),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn process_dir(&self, pid: u32) -> PathBuf {
        self.root.join(pid.to_string())
    }

    fn read_stat(&self, dir: &Path) -> Result<ProcStat> {
        let path = dir.join("stat");
        let content = fsutil::read_file_to_string(&path)?;
        ProcStat::parse(&content).map_err(|source| Error::Parse { path, source })
    }

    fn read_key_value<T: KeyValueStat>(&self, path: PathBuf) -> Result<T> {
        let mut reader = fsutil::open_file_reader(&path)?;
        T::from_reader(&mut reader).map_err(|source| Error::Parse { path, source })
    }

    fn read_network(&self, dir: &Path) -> Result<NetworkStat> {
        let path = dir.join("net/dev");
        let mut reader = fsutil::open_file_reader(&path)?;
        NetworkStat::from_reader(&mut reader).map_err(|source| Error::Parse {
            path,
            source: source.into(),
        })
    }

    fn ticks_to_duration(&self, ticks: u64) -> Duration {
        let secs = ticks / self.ticks_per_second;
        let rem = ticks % self.ticks_per_second;
        Duration::from_secs(secs)
            + Duration::from_nanos(rem * 1_000_000_000 / self.ticks_per_second)
    }

    /// Builds the [`ProcessInfo`] of one PID directory.
    fn describe(&self, pid: u32) -> Result<ProcessInfo> {
        let dir = self.process_dir(pid);
        let stat = self.read_stat(&dir)?;
        // unreadable for kernel threads and, without privileges, foreign processes
        let executable = fsutil::read_link(dir.join("exe")).ok();
        let args = parse_cmdline(&fsutil::read_file(dir.join("cmdline"))?);

        Ok(ProcessInfo {
            pid,
            ppid: stat.ppid,
            executable,
            comm: stat.comm,
            args,
        })
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new("/proc")
    }
}

impl ProcessEnumerator for ProcFs {
    type Error = Error;

    fn processes(&self) -> Result<Vec<ProcessInfo>> {
        let entries = std::fs::read_dir(&self.root).map_err(|source| Error::ListProcesses {
            path: self.root.clone(),
            source,
        })?;

        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::ListProcesses {
                path: self.root.clone(),
                source,
            })?;
            let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<u32>().ok())
            else {
                continue;
            };

            match self.describe(pid) {
                Ok(info) => out.push(info),
                // exited while being listed
                Err(err) => log::debug!("Skipping PID {pid}: {err}"),
            }
        }

        Ok(out)
    }
}

impl ProcessInspector for ProcFs {
    type Error = Error;

    fn inspect(&self, pid: u32) -> Result<ProcessCounters> {
        let dir = self.process_dir(pid);
        let stat = self.read_stat(&dir)?;
        let memory: MemoryStatus = self.read_key_value(dir.join("status"))?;
        let io: IoCounters = self.read_key_value(dir.join("io"))?;
        let network = self.read_network(&dir)?;

        Ok(ProcessCounters {
            cpu_time: self.ticks_to_duration(stat.cpu_ticks()),
            rss_bytes: memory.rss_bytes,
            swap_bytes: memory.swap_bytes,
            disk_read_bytes: io.read_bytes,
            disk_write_bytes: io.write_bytes,
            disk_reads: io.syscr,
            disk_writes: io.syscw,
            net_read_bytes: network.rx_bytes,
            net_write_bytes: network.tx_bytes,
        })
    }
}
