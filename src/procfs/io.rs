//! Storage I/O accounting from `/proc/<pid>/io`.
//!
//! `read_bytes`/`write_bytes` count traffic that actually reached (or would reach)
//! the block layer, so writes show up in page-sized steps. `syscr`/`syscw` count
//! read and write system calls and serve as the operation counters.

use std::collections::HashMap;
use std::sync::LazyLock;

use super::parser::KeyValueStat;

/// Cumulative I/O counters of a single process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IoCounters {
    pub read_bytes: u64,
    pub write_bytes: u64,
    /// Number of read system calls.
    pub syscr: u64,
    /// Number of write system calls.
    pub syscw: u64,
}

type Setter = fn(&mut IoCounters, u64);

static SETTERS: LazyLock<HashMap<&'static str, Setter>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Setter> = HashMap::with_capacity(4);

    m.insert("read_bytes", |io, v| io.read_bytes = v);
    m.insert("write_bytes", |io, v| io.write_bytes = v);
    m.insert("syscr", |io, v| io.syscr = v);
    m.insert("syscw", |io, v| io.syscw = v);

    m
});

impl KeyValueStat for IoCounters {
    const ALLOW_DUPLICATE_KEYS: bool = false;

    #[inline]
    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
        &SETTERS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procfs::StatParseError;

    #[test]
    fn test_parse_io() {
        let data = "\
rchar: 323934931
wchar: 323929600
syscr: 632687
syscw: 632675
read_bytes: 4096
write_bytes: 8192
cancelled_write_bytes: 0
";
        let io = IoCounters::from_reader(&mut data.as_bytes()).unwrap();
        assert_eq!(
            io,
            IoCounters {
                read_bytes: 4096,
                write_bytes: 8192,
                syscr: 632687,
                syscw: 632675,
            }
        );
    }

    #[test]
    fn test_parse_empty_io() {
        let io = IoCounters::from_reader(&mut "".as_bytes()).unwrap();
        assert_eq!(io, IoCounters::default());
    }

    #[test]
    fn test_parse_invalid_io() {
        let err = IoCounters::from_reader(&mut "syscr: -1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, StatParseError::InvalidKeyValue { line: 1, .. }));
    }
}
