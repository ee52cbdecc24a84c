use std::io::BufRead;
use std::path::Path;
use std::{env, fs};

use super::{Error, Result};
use crate::fsutil;

/// Returns true if `rootfs` contains a `proc` directory.
///
/// # Errors
///
/// Returns [`Error::ExistenceCheck`] if the existence check itself fails.
pub fn contains_proc_mount(rootfs: impl AsRef<Path>) -> Result<bool> {
    let path = rootfs.as_ref().join("proc");

    path.try_exists()
        .map_err(|source| Error::ExistenceCheck { path, source })
}

/// Returns true if the PID namespace of `own_proc/self` differs from the one of
/// the init process of `rootfs`.
///
/// # Errors
///
/// Returns [`Error::ReadSymlink`] if either namespace link cannot be read.
pub fn is_pid_namespace_isolated(
    own_proc: impl AsRef<Path>,
    rootfs: impl AsRef<Path>,
) -> Result<bool> {
    let read_ns = |path: &Path| {
        fs::read_link(path).map_err(|source| Error::ReadSymlink {
            path: path.to_path_buf(),
            source,
        })
    };

    let own_ns = read_ns(&own_proc.as_ref().join("self/ns/pid"))?;
    let root_ns = read_ns(&rootfs.as_ref().join("proc/1/ns/pid"))?;

    Ok(own_ns != root_ns)
}

/// Returns true if the cgroup membership file (e.g. `/proc/self/cgroup`) names a
/// container runtime or a container ID.
///
/// # Errors
///
/// * [`Error::FileOpen`] if the file cannot be opened.
/// * [`Error::ReadLine`] if a line cannot be read.
pub fn matches_container_cgroup(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    let buf = fsutil::open_file_reader(path).map_err(|err| Error::FileOpen {
        path: err.path,
        source: err.source,
    })?;

    for line in buf.lines() {
        let line = line.map_err(|source| Error::ReadLine {
            path: path.to_path_buf(),
            source,
        })?;

        if ["docker", "kubepods", "containerd", "libpod"]
            .iter()
            .any(|marker| line.contains(marker))
        {
            return Ok(true);
        }

        if line
            .split(['/', '-', '.'])
            .any(|part| part.len() >= 32 && is_non_empty_hex_string(part))
        {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Returns true if marker files or variables left by container runtimes exist.
pub fn has_container_indicators() -> bool {
    fs::metadata("/.dockerenv").is_ok()
        || fs::metadata("/run/.containerenv").is_ok()
        || env::var_os("container").is_some()
}

pub fn is_non_empty_hex_string(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}
