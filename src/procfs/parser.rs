//! Generic parsing of `key: value [unit]` style proc files.
//!
//! Files such as `/proc/<pid>/status` and `/proc/<pid>/io` share one layout: a key
//! terminated by a colon, followed by whitespace, a numeric value and, for some
//! fields, a unit suffix (`kB`). Implementors of [`KeyValueStat`] only declare which
//! keys they care about; the trait supplies the line loop, unit scaling and error
//! reporting.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::OnceLock;
//! use proc_metrics_exporter::procfs::KeyValueStat;
//!
//! #[derive(Default)]
//! struct Threads {
//!     count: u64,
//! }
//!
//! static HANDLERS: OnceLock<HashMap<&'static str, fn(&mut Threads, u64)>> = OnceLock::new();
//!
//! impl KeyValueStat for Threads {
//!     const ALLOW_DUPLICATE_KEYS: bool = false;
//!
//!     fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)> {
//!         HANDLERS.get_or_init(|| {
//!             let mut map = HashMap::new();
//!             map.insert("Threads", (|s: &mut Threads, v| s.count = v) as fn(&mut Threads, u64));
//!             map
//!         })
//!     }
//! }
//!
//! let stat = Threads::from_reader(&mut "Name:\tbash\nThreads:\t4\n".as_bytes()).unwrap();
//! assert_eq!(stat.count, 4);
//! ```

use std::collections::{HashMap, HashSet};
use std::io::BufRead;

use super::StatParseError;

/// A trait for parsing colon-separated, line-oriented proc files into a struct.
pub trait KeyValueStat: Default
where
    Self: 'static,
{
    /// If `false`, encountering the same known key twice is an error.
    const ALLOW_DUPLICATE_KEYS: bool;

    /// Known keys (without the trailing colon) and the setters applying their value.
    fn field_handlers() -> &'static HashMap<&'static str, fn(&mut Self, u64)>;

    /// Parses the whole buffer.
    ///
    /// Lines without a colon and unknown keys are skipped. Parsing stops early once
    /// every known key has been seen and duplicates are disallowed.
    ///
    /// # Errors
    /// Returns a [`StatParseError`] if reading fails, a known value is not a `u64`,
    /// carries an unknown unit, or a key repeats when duplicates are disallowed.
    fn from_reader<R: BufRead>(buf: &mut R) -> Result<Self, StatParseError> {
        let mut stat = Self::default();
        let handlers = Self::field_handlers();
        let field_count = handlers.len();
        let mut seen_keys = HashSet::with_capacity(field_count);

        let mut line = String::new();
        let mut lineno = 0;
        while buf.read_line(&mut line)? != 0 {
            lineno += 1;
            Self::parse_line(&mut stat, &line, lineno, handlers, &mut seen_keys)?;
            if !Self::ALLOW_DUPLICATE_KEYS && seen_keys.len() == field_count {
                break;
            }

            line.clear();
        }

        Ok(stat)
    }

    /// Parses a single `key: value [unit]` line.
    fn parse_line(
        stat: &mut Self,
        line: &str,
        lineno: usize,
        handlers: &HashMap<&'static str, fn(&mut Self, u64)>,
        seen_keys: &mut HashSet<&'static str>,
    ) -> Result<(), StatParseError> {
        let Some((key, rest)) = line.split_once(':') else {
            return Ok(());
        };
        let key = key.trim();
        let Some((k, handler)) = handlers.get_key_value(key) else {
            return Self::on_unknown_key(key, rest.trim(), lineno);
        };

        let mut parts = rest.split_whitespace();
        let raw = parts.next().unwrap_or_default();
        let value = raw
            .parse::<u64>()
            .map_err(|source| StatParseError::InvalidKeyValue {
                key: key.to_string(),
                value: raw.to_string(),
                line: lineno,
                source,
            })?;
        let scale = match parts.next() {
            None => 1,
            Some(unit) => unit_scale(unit).ok_or_else(|| StatParseError::UnknownUnit {
                key: key.to_string(),
                unit: unit.to_string(),
                line: lineno,
            })?,
        };

        if !Self::ALLOW_DUPLICATE_KEYS && !seen_keys.insert(k) {
            return Err(StatParseError::DuplicateField {
                field: key.to_string(),
                line: lineno,
            });
        }
        handler(stat, value.saturating_mul(scale));
        Ok(())
    }

    /// Called for keys missing from [`KeyValueStat::field_handlers`]. Ignores them by default.
    #[inline]
    fn on_unknown_key(_key: &str, _val: &str, _lineno: usize) -> Result<(), StatParseError> {
        Ok(())
    }
}

/// Byte multiplier for the unit suffixes the kernel prints in proc files.
fn unit_scale(unit: &str) -> Option<u64> {
    match unit {
        "B" => Some(1),
        "kB" => Some(1024),
        "mB" => Some(1024 * 1024),
        _ => None,
    }
}
