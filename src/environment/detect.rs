use std::fmt;
use std::path::{Path, PathBuf};

use super::checks::{
    contains_proc_mount, has_container_indicators, is_pid_namespace_isolated,
    matches_container_cgroup,
};
use super::{Error, Result};

/// Where the exporter runs relative to the processes it monitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnvironment {
    /// Directly on the host.
    Host,
    /// Inside a container (Docker, Kubernetes, Podman, ...).
    Container,
}

impl fmt::Display for RuntimeEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Container => f.write_str("container"),
        }
    }
}

/// Detects whether we run in a container or on the host.
///
/// The checks, in order:
///
/// 1. `rootfs` has a `proc` directory whose init process lives in another PID namespace.
/// 2. `/proc/self/cgroup` names a container runtime or a container ID.
/// 3. Marker files or variables of container runtimes exist.
///
/// Failing checks are logged as warnings and treated as negative.
pub fn detect_runtime_environment(rootfs: impl AsRef<Path>) -> RuntimeEnvironment {
    let rootfs = rootfs.as_ref();
    match contains_proc_mount(rootfs) {
        Ok(true) => match is_pid_namespace_isolated("/proc", rootfs) {
            Ok(true) => return RuntimeEnvironment::Container,
            Ok(false) => {}
            Err(err) => log::warn!(
                "Namespace check failed when detecting runtime environment: {}",
                err
            ),
        },
        Ok(false) => {}
        Err(err) => log::warn!("Failed to determine presence of /proc in rootfs: {}", err),
    }

    match matches_container_cgroup("/proc/self/cgroup") {
        Ok(true) => return RuntimeEnvironment::Container,
        Ok(false) => {}
        Err(err) => log::warn!("Cgroup analysis failed during runtime detection: {}", err),
    }

    if has_container_indicators() {
        return RuntimeEnvironment::Container;
    }

    RuntimeEnvironment::Host
}

/// Picks the proc filesystem to monitor.
///
/// An explicit root always wins. Otherwise the runtime environment decides: a
/// container uses the host's proc mounted below `rootfs`, the host uses `/proc`.
///
/// # Errors
///
/// Returns [`Error::MissingHostProc`] when running in a container without the host
/// root mounted at `rootfs`.
pub fn resolve_proc_root(explicit: Option<&Path>, rootfs: impl AsRef<Path>) -> Result<PathBuf> {
    if let Some(root) = explicit {
        log::debug!("Using configured proc root `{}`", root.display());
        return Ok(root.to_path_buf());
    }

    let rootfs = rootfs.as_ref();
    let environment = detect_runtime_environment(rootfs);
    log::debug!("Detected runtime environment: {environment}");
    proc_root_for(environment, rootfs)
}

fn proc_root_for(environment: RuntimeEnvironment, rootfs: &Path) -> Result<PathBuf> {
    match environment {
        RuntimeEnvironment::Host => Ok(PathBuf::from("/proc")),
        RuntimeEnvironment::Container => {
            if contains_proc_mount(rootfs)? {
                Ok(rootfs.join("proc"))
            } else {
                Err(Error::MissingHostProc {
                    path: rootfs.join("proc"),
                })
            }
        }
    }
}
