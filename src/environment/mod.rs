//! Runtime environment detection.
//!
//! Decides which proc filesystem shows the processes to monitor: the local
//! `/proc` on a host, or the host's proc mounted into the container.
mod checks;
mod detect;
mod error;

pub use detect::{RuntimeEnvironment, detect_runtime_environment, resolve_proc_root};
pub use error::{Error, Result};

/// Environment variable naming where the host root is mounted inside a container.
pub const ROOTFS_ENV: &str = "ROOTFS_MOUNT_PATH";

/// Mount point of the host root used when [`ROOTFS_ENV`] is unset.
pub const DEFAULT_ROOTFS: &str = "/rootfs";
