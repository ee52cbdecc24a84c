//! Memory figures from `/proc/<pid>/status`.
//!
//! Only the resident set (`VmRSS`) and swapped-out size (`VmSwap`) are extracted.
//! The kernel reports both in `kB`; the parser scales them to bytes. Kernel threads
//! have no `Vm*` lines at all, which yields zeros rather than an error.

use std::collections::HashMap;
use std::sync::LazyLock;

use super::parser::KeyValueStat;

/// Memory usage of a single process, in bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemoryStatus {
    /// Resident set size.
    pub rss_bytes: u64,
    /// Swapped-out anonymous memory.
    pub swap_bytes: u64,
}

impl MemoryStatus {
    fn set_rss_bytes(&mut self, v: u64) {
        self.rss_bytes = v;
    }

    fn set_swap_bytes(&mut self, v: u64) {
        self.swap_bytes = v;
    }
}

type Setter = fn(&mut MemoryStatus, u64);

static SETTERS: LazyLock<HashMap<&'static str, Setter>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Setter> = HashMap::with_capacity(2);

    m.insert("VmRSS", MemoryStatus::set_rss_bytes);
    m.insert("VmSwap", MemoryStatus::set_swap_bytes);

    m
});

impl KeyValueStat for MemoryStatus {
    const ALLOW_DUPLICATE_KEYS: bool = false;

    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
        &SETTERS
    }
}
