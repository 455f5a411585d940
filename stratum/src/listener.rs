use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Json;
use serde_json::json;
use tokio::net::TcpListener;

use crate::Config;
use crate::error::ProxyError;
use crate::network::WebSocketHandler;
use crate::router::{ProxyRouter, RouterHandle};
use crate::stats::GlobalStats;
use crate::sweeper::LivenessSweeper;

#[derive(Debug, Clone)]
struct AppState {
    router: RouterHandle,
    stats: Arc<GlobalStats>,
    keepalive: Duration,
}

pub struct Listener {
    listener: TcpListener,
    config: Arc<Config>,
}

impl Listener {
    /// Bind the listen address. Failure here is the only fatal error.
    pub async fn new(config: Arc<Config>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.server.bind_address)
            .await
            .map_err(|e| ProxyError::Bind {
                address: config.server.bind_address.to_string(),
                message: e.to_string(),
            })?;

        tracing::info!(
            "Pool proxy listening on {} (forwarding to {})",
            listener.local_addr()?,
            config.pool.address()
        );

        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn accept(self) -> anyhow::Result<()> {
        self.accept_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves
    pub async fn accept_until<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let stats = Arc::new(GlobalStats::new());
        let (router, router_task) = ProxyRouter::spawn(self.config.clone(), stats.clone());
        let sweeper =
            LivenessSweeper::new(self.config.limiter.sweep_interval(), router.clone()).spawn();

        let app = app(AppState {
            router,
            stats,
            keepalive: self.config.server.keepalive_interval(),
        });

        let result = axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await;

        sweeper.abort();
        router_task.abort();

        tracing::info!("Pool proxy stopped");

        Ok(result?)
    }
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/proxy", get(websocket))
        .route("/ws", get(websocket))
        .route("/health", get(health))
        .route("/api/stats", get(stats))
        .fallback(not_found)
        .with_state(state)
}

async fn websocket(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let remote_addr = forwarded_for(&headers).unwrap_or_else(|| peer.ip().to_string());
    let handler = WebSocketHandler::new(state.router, state.keepalive);

    ws.on_upgrade(move |socket| handler.run(socket, remote_addr))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "uptime": state.stats.uptime().as_secs(),
    }))
}

async fn stats(State(state): State<AppState>) -> Response {
    match state.router.snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => {
            tracing::error!("stats snapshot failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

/// First address of `X-Forwarded-For`, when present
fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .map(str::trim)
        .find(|addr| !addr.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_takes_first_entry() {
        let mut headers = HeaderMap::new();
        assert_eq!(forwarded_for(&headers), None);

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(forwarded_for(&headers), Some("203.0.113.7".to_string()));
    }
}
