pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A process vanished or became unreadable between enumeration and inspection.
///
/// This is a soft, per-process failure: the caller keeps the last good metrics of
/// the PID and tries again on the next pass.
#[derive(Debug, thiserror::Error)]
#[error("process {pid} is unavailable: {source}")]
pub struct ProcessUnavailable {
    pub pid: u32,
    #[source]
    pub source: BoxError,
}

/// A panic raised by the OS layer, captured as an ordinary error.
#[derive(Debug, thiserror::Error)]
#[error("panicked: {0}")]
pub struct PanicError(pub String);

impl PanicError {
    /// Extracts the message of a panic payload returned by [`std::panic::catch_unwind`].
    pub fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => payload
                .downcast_ref::<&'static str>()
                .map(|s| (*s).to_owned())
                .unwrap_or_else(|| "unknown panic payload".to_owned()),
        };
        Self(message)
    }
}
