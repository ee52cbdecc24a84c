//! Serializes reconciliation passes against reads of the exposed metrics.
//!
//! Every pass and every render runs inside the same exclusive lock, so a scrape
//! either sees the state left by the previous pass or waits for the in-flight
//! pass to complete. There is no other way to reach the tracked set or the sink.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use crate::metrics::MetricSink;
use crate::process::{ProcessEnumerator, ProcessInspector};
use crate::reconcile::{EnumerationError, ReconcileReport, Reconciler};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),
    #[error("failed to render metrics: {0}")]
    Render(#[from] prometheus::Error),
    #[error("reconciler lock poisoned by a panicking pass")]
    Poisoned,
}

impl Error {
    /// Whether the refresh loop can no longer make progress.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Poisoned)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The operations the guard serializes.
pub trait Reconcile: Send {
    fn reconcile(&mut self) -> std::result::Result<ReconcileReport, EnumerationError>;

    fn render(&self) -> prometheus::Result<String>;

    fn teardown(&mut self) -> usize;
}

impl<E, I, S> Reconcile for Reconciler<E, I, S>
where
    E: ProcessEnumerator + Send,
    I: ProcessInspector + Send,
    S: MetricSink + Send,
{
    fn reconcile(&mut self) -> std::result::Result<ReconcileReport, EnumerationError> {
        Reconciler::reconcile(self)
    }

    fn render(&self) -> prometheus::Result<String> {
        Reconciler::render(self)
    }

    fn teardown(&mut self) -> usize {
        Reconciler::teardown(self)
    }
}

/// Cloneable handle on the single reconciler of the process.
#[derive(Clone)]
pub struct ScrapeGuard {
    inner: Arc<Mutex<dyn Reconcile>>,
    /// Set while a scrape-triggered pass is queued or running.
    scrape_pass: Arc<AtomicBool>,
}

/// Clears the scrape pass flag when dropped.
struct ScrapePass<'a>(&'a AtomicBool);

impl Drop for ScrapePass<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ScrapeGuard {
    pub fn new<R: Reconcile + 'static>(reconciler: R) -> Self {
        Self {
            inner: Arc::new(Mutex::new(reconciler)),
            scrape_pass: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs one reconciliation pass and logs its per-process errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Enumeration`] if the process table could not be listed and
    /// [`Error::Poisoned`] if an earlier pass panicked while holding the lock.
    pub fn refresh(&self) -> Result<ReconcileReport> {
        let mut reconciler = self.lock()?;
        let report = reconciler.reconcile()?;
        report.log_errors();
        Ok(report)
    }

    /// Renders the state left by the last completed pass.
    pub fn render(&self) -> Result<String> {
        Ok(self.lock()?.render()?)
    }

    /// Runs a pass and renders its result in one critical section.
    ///
    /// A failed enumeration is logged and the previous state is rendered. If
    /// another scrape already queued a pass, no second one is started and the
    /// result of the pending one is rendered once it completes.
    pub fn refresh_and_render(&self) -> Result<String> {
        if self.scrape_pass.swap(true, Ordering::AcqRel) {
            log::debug!("Scrape pass already pending, rendering its result");
            return self.render();
        }
        let _pending = ScrapePass(&self.scrape_pass);
        let mut reconciler = self.lock()?;
        match reconciler.reconcile() {
            Ok(report) => report.log_errors(),
            Err(err) => log::error!("{err}"),
        }
        Ok(reconciler.render()?)
    }

    /// Unregisters everything, even if a previous pass panicked.
    pub fn teardown(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .teardown()
    }

    fn lock(&self) -> Result<MutexGuard<'_, dyn Reconcile + 'static>> {
        match self.inner.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => {
                log::debug!("Waiting for in-flight reconciliation pass");
                self.inner.lock().map_err(|_| Error::Poisoned)
            }
            Err(TryLockError::Poisoned(_)) => Err(Error::Poisoned),
        }
    }
}
