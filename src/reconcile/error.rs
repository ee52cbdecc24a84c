use crate::metrics::{self, CpuSampleSkipped};
use crate::process::{BoxError, NameNotFound, ProcessUnavailable};

/// The process table itself could not be listed. The pass is abandoned.
#[derive(Debug, thiserror::Error)]
#[error("failed to enumerate processes: {source}")]
pub struct EnumerationError {
    #[source]
    pub source: BoxError,
}

/// A per-process failure recorded during a pass. None of these abort the pass.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error("failed to resolve descriptive name of PID {pid}: {source}")]
    NameResolution {
        pid: u32,
        #[source]
        source: NameNotFound,
    },
    #[error(transparent)]
    Unavailable(#[from] ProcessUnavailable),
    #[error(transparent)]
    Metrics(#[from] metrics::Error),
    #[error(transparent)]
    CpuSampleSkipped(#[from] CpuSampleSkipped),
}

impl PassError {
    pub fn pid(&self) -> u32 {
        match self {
            Self::NameResolution { pid, .. } => *pid,
            Self::Unavailable(err) => err.pid,
            Self::Metrics(err) => err.pid(),
            Self::CpuSampleSkipped(err) => err.pid,
        }
    }

    /// Logs the error at the level matching its severity.
    ///
    /// Without a binary filter almost every process lacks the name flag, so
    /// name resolution failures are only worth a debug line in that case.
    pub fn log(&self, binary_filtered: bool) {
        match self {
            Self::NameResolution { .. } if !binary_filtered => log::debug!("{self}"),
            Self::NameResolution { .. } | Self::Unavailable(_) | Self::CpuSampleSkipped(_) => {
                log::warn!("{self}")
            }
            Self::Metrics(_) => log::error!("{self}"),
        }
    }
}
