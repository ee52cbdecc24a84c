//! Parsing of `/proc/<pid>/stat`.
//!
//! The file is a single line of space-separated fields. The second field is the
//! command name in parentheses and may itself contain spaces and parentheses, so
//! the parser anchors on the *last* closing parenthesis before splitting the rest.

use super::StatParseError;

/// Fields of `/proc/<pid>/stat` needed for enumeration and CPU accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcStat {
    pub pid: u32,
    /// Command name, truncated by the kernel to 15 bytes.
    pub comm: String,
    pub ppid: u32,
    /// User mode CPU time in clock ticks.
    pub utime: u64,
    /// Kernel mode CPU time in clock ticks.
    pub stime: u64,
}

impl ProcStat {
    /// Total CPU time (user + system) in clock ticks.
    pub fn cpu_ticks(&self) -> u64 {
        self.utime.saturating_add(self.stime)
    }

    /// Parses the content of a `stat` file.
    ///
    /// # Errors
    ///
    /// Returns [`StatParseError::MissingField`] if the line is truncated and
    /// [`StatParseError::InvalidField`] if a numeric field does not parse.
    pub fn parse(line: &str) -> Result<Self, StatParseError> {
        let open = line.find('(').ok_or(StatParseError::MissingField("comm"))?;
        let close = line.rfind(')').ok_or(StatParseError::MissingField("comm"))?;
        if close < open {
            return Err(StatParseError::MissingField("comm"));
        }

        let pid = parse_field("pid", line[..open].trim())?;
        let comm = line[open + 1..close].to_string();

        // fields after the command name, starting with field 3 (state)
        let mut rest = line[close + 1..].split_whitespace();
        rest.next().ok_or(StatParseError::MissingField("state"))?;
        let ppid = parse_field("ppid", rest.next().ok_or(StatParseError::MissingField("ppid"))?)?;
        // pgrp, session, tty_nr, tpgid, flags, minflt, cminflt, majflt, cmajflt
        let mut rest = rest.skip(9);
        let utime = parse_field(
            "utime",
            rest.next().ok_or(StatParseError::MissingField("utime"))?,
        )?;
        let stime = parse_field(
            "stime",
            rest.next().ok_or(StatParseError::MissingField("stime"))?,
        )?;

        Ok(Self {
            pid,
            comm,
            ppid,
            utime,
            stime,
        })
    }
}

fn parse_field<T>(field: &'static str, value: &str) -> Result<T, StatParseError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    value
        .parse::<T>()
        .map_err(|source| StatParseError::InvalidField {
            field,
            value: value.to_string(),
            source,
        })
}
