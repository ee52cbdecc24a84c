use clap::Parser;

use proc_metrics_exporter::config::Config;

/// Entry point of the exporter.
///
/// Logging is configured through `RUST_LOG`, everything else through flags or
/// their environment variables (see `--help`).
///
/// # Examples
///
/// ```bash
/// RUST_LOG=info proc-metrics-exporter --binary myservice --nameflag name --port 9256
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let config = Config::parse();
    proc_metrics_exporter::run(config).await
}
