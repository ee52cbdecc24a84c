//! Per-process time series and the registry they are exposed through.

mod record;
mod sink;

pub use record::{CpuSampleSkipped, ProcessLabels, ProcessMetrics};
pub use sink::{MetricSink, render};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create series `{name}` for PID {pid}: {source}")]
    Series {
        pid: u32,
        name: &'static str,
        #[source]
        source: prometheus::Error,
    },
    #[error("failed to register metrics for PID {pid}: {source}")]
    Registration {
        pid: u32,
        #[source]
        source: prometheus::Error,
    },
}

impl Error {
    pub fn pid(&self) -> u32 {
        match self {
            Self::Series { pid, .. } | Self::Registration { pid, .. } => *pid,
        }
    }
}
