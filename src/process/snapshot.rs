use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::SystemTime;

use super::error::{PanicError, ProcessUnavailable};
use super::{ProcessCounters, ProcessInspector};

/// Counters of one process captured by a single inspection call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessSnapshot {
    pub pid: u32,
    /// Wall-clock time right after the counters were read.
    pub captured_at: SystemTime,
    pub counters: ProcessCounters,
}

impl ProcessSnapshot {
    pub fn new(pid: u32, captured_at: SystemTime, counters: ProcessCounters) -> Self {
        Self {
            pid,
            captured_at,
            counters,
        }
    }
}

/// Produces timestamped [`ProcessSnapshot`]s from a [`ProcessInspector`].
#[derive(Debug)]
pub struct SnapshotReader<I> {
    inspector: I,
    clock: fn() -> SystemTime,
}

impl<I: ProcessInspector> SnapshotReader<I> {
    pub fn new(inspector: I) -> Self {
        Self::with_clock(inspector, SystemTime::now)
    }

    pub fn with_clock(inspector: I, clock: fn() -> SystemTime) -> Self {
        Self { inspector, clock }
    }

    /// Reads a fresh snapshot of `pid`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessUnavailable`] if the inspector fails or panics.
    pub fn read(&self, pid: u32) -> Result<ProcessSnapshot, ProcessUnavailable> {
        let counters = match catch_unwind(AssertUnwindSafe(|| self.inspector.inspect(pid))) {
            Ok(Ok(counters)) => counters,
            Ok(Err(err)) => {
                return Err(ProcessUnavailable {
                    pid,
                    source: Box::new(err),
                });
            }
            Err(payload) => {
                return Err(ProcessUnavailable {
                    pid,
                    source: Box::new(PanicError::from_payload(payload)),
                });
            }
        };
        Ok(ProcessSnapshot::new(pid, (self.clock)(), counters))
    }
}
