use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::reconcile::Settings;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("metric namespace must not be empty")]
    EmptyNamespace,
    #[error("metric namespace `{0}` is not a valid metric name prefix")]
    InvalidNamespace(String),
    #[error("name flag must not be empty")]
    EmptyNameFlag,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Exports per-process CPU, memory, disk and network usage in the Prometheus text format.
#[derive(Debug, Clone, Parser)]
#[command(name = "proc-metrics-exporter", version)]
pub struct Config {
    /// Prefix of every exported series.
    #[arg(long, env = "EXPORTER_NAMESPACE", default_value = "mine")]
    pub namespace: String,

    /// Only monitor processes whose executable basename equals this. Empty monitors all.
    #[arg(long, env = "EXPORTER_BINARY", default_value = "")]
    pub binary: String,

    /// Command-line flag of the monitored processes holding their descriptive name.
    #[arg(long, env = "EXPORTER_NAMEFLAG", default_value = "name")]
    pub nameflag: String,

    /// Port serving `/metrics`.
    #[arg(long, env = "EXPORTER_PORT", default_value_t = 80)]
    pub port: u16,

    /// Address to bind to.
    #[arg(long, env = "EXPORTER_LISTEN_ADDRESS", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub listen_address: IpAddr,

    /// Seconds between two background reconciliation passes.
    #[arg(
        long,
        env = "EXPORTER_INTERVAL",
        default_value_t = 5,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval: u64,

    /// Run a reconciliation pass inside every scrape before rendering.
    #[arg(long, env = "EXPORTER_REFRESH_ON_SCRAPE")]
    pub refresh_on_scrape: bool,

    /// Seconds a scrape may wait for the metrics before answering 503.
    #[arg(
        long,
        env = "EXPORTER_SCRAPE_TIMEOUT",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub scrape_timeout: Option<u64>,

    /// Proc filesystem to inspect. Detected from the runtime environment if unset.
    #[arg(long, env = "PROC_ROOT")]
    pub proc_root: Option<PathBuf>,
}

impl Config {
    /// Checks the values clap cannot check on its own.
    ///
    /// # Errors
    ///
    /// Fails if the namespace is empty or not a valid metric name prefix, or if the
    /// name flag is empty.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(Error::EmptyNamespace);
        }
        if !is_valid_metric_prefix(&self.namespace) {
            return Err(Error::InvalidNamespace(self.namespace.clone()));
        }
        if self.nameflag.is_empty() {
            return Err(Error::EmptyNameFlag);
        }
        Ok(())
    }

    pub fn settings(&self) -> Settings {
        Settings {
            namespace: self.namespace.clone(),
            binary_filter: (!self.binary.is_empty()).then(|| self.binary.clone()),
            name_flag: self.nameflag.clone(),
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_address, self.port)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn scrape_timeout(&self) -> Option<Duration> {
        self.scrape_timeout.map(Duration::from_secs)
    }
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
fn is_valid_metric_prefix(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == ':')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}
