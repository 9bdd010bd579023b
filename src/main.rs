//! GeoShare 실시간 위치 공유 허브

mod config;
mod coordinator;
mod handlers;
mod location;
mod protocol;
mod registry;
mod state;

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{HeaderValue, Method},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use config::Config;
use futures::{SinkExt, StreamExt};
use protocol::{ClientMessage, ServerMessage};
use registry::ClientId;
use state::AppState;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = Arc::new(AppState::new(config.clone()));
    let app = router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("GeoShare hub started");
    tracing::info!("Address: {}", addr);
    tracing::info!("WebSocket: ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("GeoShare hub stopped");
    Ok(())
}

/// 라우터 설정
fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// CORS 설정
fn cors_layer(config: &Config) -> CorsLayer {
    let origin = if config.allows_any_origin() {
        AllowOrigin::from(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn index_handler() -> &'static str {
    "Hello World"
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "server": "geoshare-hub",
        "clients": state.peers.len(),
        "timestamp": std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // 연결 처리
    let client_id = handlers::handle_connection(&state, tx.clone());

    // 송신 태스크
    let send_client_id = client_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(client_id = %send_client_id, error = %e, "Failed to encode message")
                }
            }
        }
    });

    // 수신 처리
    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => handle_client_message(&state, &client_id, &tx, msg),
                Err(e) => {
                    tracing::debug!(client_id = %client_id, error = %e, "Unparseable message dropped")
                }
            },
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::debug!(client_id = %client_id, error = %e, "WebSocket receive error");
                break;
            }
            _ => {}
        }
    }

    // 연결 해제
    handlers::handle_disconnect(&state, &client_id);
    send_task.abort();
}

fn handle_client_message(
    state: &Arc<AppState>,
    client_id: &ClientId,
    sender: &mpsc::UnboundedSender<ServerMessage>,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::Heartbeat => {
            handlers::handle_heartbeat(sender);
        }
        ClientMessage::SendLocation(report) => {
            handlers::handle_send_location(state, client_id, report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn make_app(cors_origins: &str) -> Router {
        let origins = cors_origins.to_string();
        let config = Config::from_lookup(move |key| match key {
            "CORS_ORIGINS" => Some(origins.clone()),
            _ => None,
        });
        router(Arc::new(AppState::new(config)))
    }

    #[tokio::test]
    async fn index_returns_fixed_text() {
        let app = make_app("*");
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 1_000).await.unwrap();
        assert_eq!(&body[..], b"Hello World");
    }

    #[tokio::test]
    async fn health_reports_connected_clients() {
        let app = make_app("*");
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["server"], "geoshare-hub");
        assert_eq!(parsed["clients"], 0);
    }

    #[tokio::test]
    async fn cors_allows_configured_origin() {
        let app = make_app("http://localhost:3001");
        let req = Request::builder()
            .uri("/")
            .header(header::ORIGIN, "http://localhost:3001")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:3001"
        );
    }

    #[tokio::test]
    async fn cors_rejects_unknown_origin() {
        let app = make_app("http://localhost:3001");
        let req = Request::builder()
            .uri("/")
            .header(header::ORIGIN, "http://evil.test")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn ws_route_requires_upgrade() {
        let app = make_app("*");
        let req = Request::builder().uri("/ws").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
    }
}
