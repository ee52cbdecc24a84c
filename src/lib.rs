//! Per-process resource usage exporter.
//!
//! Periodically lists the processes of a proc filesystem, keeps one set of
//! Prometheus series (CPU, memory, disk and network usage) per matching process
//! and serves them on `/metrics`. Processes are labelled with their PID, their
//! executable and a descriptive name taken from their own command line.
//!
//! The core is the [`reconcile::Reconciler`], which creates and tears down the
//! series as processes come and go, behind the [`guard::ScrapeGuard`], which keeps
//! scrapes from observing a half-finished pass.
pub mod api;
pub mod config;
pub mod environment;
pub mod error;
pub mod fsutil;
pub mod guard;
pub mod metrics;
pub mod process;
pub mod procfs;
pub mod reconcile;

use std::path::PathBuf;
use std::time::Duration;

use config::Config;
use error::{FatalError, ResultOkLogExt};
use guard::ScrapeGuard;
use process::SnapshotReader;
use procfs::ProcFs;
use reconcile::Reconciler;
use tokio::time::MissedTickBehavior;

/// Time given to log sinks and in-flight scrapes before a fatal exit.
const FATAL_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Runs the exporter until a shutdown signal or a fatal error.
///
/// Resolves the proc filesystem, runs a first reconciliation pass, then serves
/// `/metrics` while a background loop reconciles every `--interval` seconds. On
/// Ctrl-C or SIGTERM the loop and the server stop and every tracked process is
/// unregistered.
///
/// # Errors
///
/// Fails on invalid configuration, when the host proc filesystem is missing in a
/// container, or, after a grace period, when the refresh loop or the HTTP server
/// cannot continue.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    let rootfs = std::env::var_os(environment::ROOTFS_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(environment::DEFAULT_ROOTFS));
    let proc_root = environment::resolve_proc_root(config.proc_root.as_deref(), &rootfs)?;
    log::info!("Monitoring processes of `{}`", proc_root.display());

    let procfs = ProcFs::new(proc_root);
    let settings = config.settings();
    match &settings.binary_filter {
        Some(binary) => log::info!("Monitoring executables named `{binary}`"),
        None => log::info!("Monitoring every process with a `-{}` flag", settings.name_flag),
    }
    let reconciler = Reconciler::new(
        procfs.clone(),
        SnapshotReader::new(procfs),
        prometheus::Registry::new(),
        settings,
    );
    let guard = ScrapeGuard::new(reconciler);

    let initial = guard.clone();
    match tokio::task::spawn_blocking(move || initial.refresh()).await? {
        Ok(report) => log::info!(
            "Initial pass tracks {} processes ({} errors)",
            report.arrived.len(),
            report.errors.len()
        ),
        Err(err) if err.is_fatal() => return Err(err.into()),
        Err(err) => log::error!("Initial reconciliation pass failed: {err}"),
    }

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(());
    let mut server = {
        let state = api::AppState::new(
            guard.clone(),
            config.refresh_on_scrape,
            config.scrape_timeout(),
        );
        let shutdown = async move {
            let _ = shutdown_rx.changed().await;
        };
        tokio::spawn(api::APIServer::new(state).listen(config.listen_addr(), shutdown))
    };
    let mut refresher = tokio::spawn(refresh_loop(guard.clone(), config.interval()));

    let fatal = tokio::select! {
        () = shutdown_signal() => {
            log::info!("Received shutdown signal");
            None
        }
        res = &mut refresher => Some(match res {
            Ok(err) => err,
            Err(err) => FatalError::Task(err),
        }),
        res = &mut server => Some(match res {
            Ok(Ok(())) => FatalError::ServerStopped,
            Ok(Err(err)) => FatalError::Server(err),
            Err(err) => FatalError::Task(err),
        }),
    };

    refresher.abort();
    let _ = shutdown_tx.send(());
    if !server.is_finished() {
        if let Ok(Err(err)) = server.await {
            log::error!("HTTP server failed during shutdown: {err}");
        }
    }

    let teardown = guard.clone();
    if let Some(count) = tokio::task::spawn_blocking(move || teardown.teardown())
        .await
        .ok_log_with(log::Level::Error, "Teardown failed")
    {
        log::info!("Stopped monitoring {count} processes");
    }

    if let Some(err) = fatal {
        log::error!(
            "Fatal error, exiting in {} s: {err}",
            FATAL_GRACE_PERIOD.as_secs()
        );
        tokio::time::sleep(FATAL_GRACE_PERIOD).await;
        return Err(err.into());
    }
    Ok(())
}

/// Reconciles every `period` until a pass fails fatally.
async fn refresh_loop(guard: ScrapeGuard, period: Duration) -> FatalError {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick fires immediately and the initial pass already ran
    interval.tick().await;

    loop {
        interval.tick().await;
        let guard = guard.clone();
        match tokio::task::spawn_blocking(move || guard.refresh()).await {
            Ok(Ok(report)) => log::debug!(
                "Reconciliation pass done in {} ms: arrived={:?}, vanished={:?}, updated={}",
                report.took.as_millis(),
                report.arrived,
                report.vanished,
                report.updated
            ),
            Ok(Err(err)) if err.is_fatal() => return FatalError::Refresh(err),
            Ok(Err(err)) => log::error!("Reconciliation pass failed: {err}"),
            Err(err) => return FatalError::Task(err),
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.ok_log().is_none() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()).ok_log() {
            Some(mut sigterm) => {
                sigterm.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
