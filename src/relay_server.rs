// Relay Server
//
// HTTP server hosting the media relay next to the built frontend.
//
// Routes:
// - GET /api/proxy?url=...&headers=...  streams a remote resource through the relay
// - anything else                       static assets, falling back to the app shell

use crate::config::RelayConfig;
use crate::relay::{DomainAllowList, MediaRelay, RelayError, RelayQuery, RelayRequest};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::Response,
    routing::get,
    Router,
};
use std::{path::Path, sync::Arc};
use tokio::signal;
use tower_http::services::{ServeDir, ServeFile};

pub struct RelayServerState {
    pub relay: MediaRelay,
}

pub struct RelayServer {
    config: RelayConfig,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    /// Build the relay described by the config: shared client, default
    /// headers and, when configured, the domain allow-list.
    pub fn build_relay(&self) -> anyhow::Result<MediaRelay> {
        let client = MediaRelay::build_client(self.config.upstream_timeout)?;
        let relay = MediaRelay::new(client, &self.config.default_headers);

        Ok(match &self.config.allowed_domains {
            Some(domains) => {
                let allow_list = DomainAllowList::new(domains);
                log::info!("Relay restricted to: {}", allow_list.domains().join(", "));
                relay.with_guard(allow_list)
            }
            None => relay,
        })
    }

    pub async fn start(self) -> anyhow::Result<()> {
        let relay = self.build_relay()?;
        let app = router(relay, &self.config.static_dir);

        let addr = self.config.listen_addr();
        log::info!("Relay server starting on http://{}", addr);
        log::info!("Static directory: {:?}", self.config.static_dir);
        if let Some(timeout) = self.config.upstream_timeout {
            log::info!("Upstream timeout: {:?}", timeout);
        }

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        log::info!("Relay server stopped");
        Ok(())
    }
}

pub fn router(relay: MediaRelay, static_dir: &Path) -> Router {
    let state = Arc::new(RelayServerState { relay });

    let app_shell = ServeFile::new(static_dir.join("index.html"));
    let assets = ServeDir::new(static_dir).fallback(app_shell);

    Router::new()
        .route("/api/proxy", get(proxy_media))
        .fallback_service(assets)
        .with_state(state)
}

async fn proxy_media(
    State(state): State<Arc<RelayServerState>>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Result<Response, RelayError> {
    let query: RelayQuery = pairs.into_iter().collect();
    let request = RelayRequest::from_query(query).map_err(|e| {
        log::warn!("Rejected relay request: {}", e);
        e
    })?;

    state
        .relay
        .relay(request, headers.get(header::RANGE))
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        log::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                log::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
