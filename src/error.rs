use crate::guard;

/// Reasons for the supervisor in [`crate::run`] to stop the exporter.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("refresh loop cannot continue: {0}")]
    Refresh(#[source] guard::Error),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("HTTP server failed: {0}")]
    Server(#[source] std::io::Error),
    #[error("HTTP server stopped unexpectedly")]
    ServerStopped,
}

/// Turns a `Result` into an `Option`, reporting the error through `log`.
pub trait ResultOkLogExt<T, E> {
    /// Logs the error at `error` level.
    fn ok_log(self) -> Option<T>;

    /// Logs the error at `level`, prefixed with `context`.
    fn ok_log_with(self, level: log::Level, context: &str) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error,
{
    fn ok_log(self) -> Option<T> {
        self.map_err(|err| log::error!("{err}")).ok()
    }

    fn ok_log_with(self, level: log::Level, context: &str) -> Option<T> {
        self.map_err(|err| log::log!(level, "{context}: {err}")).ok()
    }
}
