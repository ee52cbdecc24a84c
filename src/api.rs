use std::future::Future;
use std::time::Duration;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tokio::net::ToSocketAddrs;

use crate::guard::ScrapeGuard;

const INDEX_PAGE: &str = "<html>
<head><title>Process Metrics Exporter</title></head>
<body>
<h1>Process Metrics Exporter</h1>
<p><a href=\"/metrics\">Metrics</a></p>
</body>
</html>
";

/// Shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    guard: ScrapeGuard,
    refresh_on_scrape: bool,
    scrape_timeout: Option<Duration>,
}

impl AppState {
    pub fn new(guard: ScrapeGuard, refresh_on_scrape: bool, scrape_timeout: Option<Duration>) -> Self {
        Self {
            guard,
            refresh_on_scrape,
            scrape_timeout,
        }
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

async fn metrics(State(state): State<AppState>) -> Response {
    let guard = state.guard.clone();
    let refresh = state.refresh_on_scrape;
    let scrape = tokio::task::spawn_blocking(move || {
        if refresh {
            guard.refresh_and_render()
        } else {
            guard.render()
        }
    });

    // on timeout the blocking task is detached and finishes its pass unobserved
    let joined = match state.scrape_timeout {
        Some(timeout) => match tokio::time::timeout(timeout, scrape).await {
            Ok(joined) => joined,
            Err(_) => {
                log::warn!("Scrape timed out after {} ms", timeout.as_millis());
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "metrics not available in time",
                )
                    .into_response();
            }
        },
        None => scrape.await,
    };

    match joined {
        Ok(Ok(body)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Ok(Err(err)) => {
            log::error!("Failed to serve metrics: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render metrics").into_response()
        }
        Err(err) => {
            log::error!("Scrape task failed: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render metrics").into_response()
        }
    }
}

pub struct APIServer {
    router: axum::Router,
}

impl APIServer {
    pub fn new(state: AppState) -> Self {
        let router = axum::Router::new()
            .route("/", get(index))
            .route("/metrics", get(metrics))
            .with_state(state);
        Self { router }
    }

    /// Serves until `shutdown` resolves and in-flight requests are answered.
    ///
    /// # Errors
    ///
    /// Fails if the address cannot be bound or the accept loop breaks.
    pub async fn listen(
        self,
        addr: impl ToSocketAddrs,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        log::info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
