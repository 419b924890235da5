// src/serve/server.rs

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Redirect};
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::model::ServerSection;
use crate::serve::reload::{ReloadHub, ReloadSignal};

/// Browser-side client: opens the reload socket and refreshes the page on a
/// reload frame. Served at `/livereload.js` so built pages can include it with
/// a single script tag.
const CLIENT_SCRIPT: &str = r#"(() => {
  const proto = location.protocol === "https:" ? "wss" : "ws";
  const sock = new WebSocket(proto + "://" + location.host + "/livereload");
  sock.onmessage = (ev) => {
    try {
      const msg = JSON.parse(ev.data);
      if (msg.cmd === "reload") location.reload();
    } catch (_) {}
  };
})();
"#;

#[derive(Clone)]
struct ServeState {
    hub: ReloadHub,
}

/// Outbound frame sent to connected clients.
#[derive(serde::Serialize)]
struct ReloadFrame<'a> {
    cmd: &'a str,
    task: &'a str,
}

/// Start the static dev server. Runs until the process shuts down.
///
/// Routes:
/// - `GET /` -> redirect to the configured start path (when set)
/// - `GET /livereload` -> WebSocket subscription to the reload hub
/// - `GET /livereload.js` -> embedded client script
/// - everything else -> static files under `[server].root`
pub async fn run_server(cfg: ServerSection, hub: ReloadHub) -> Result<()> {
    let state = Arc::new(ServeState { hub });

    let mut app = Router::new()
        .route("/livereload", get(ws_handler))
        .route("/livereload.js", get(client_script))
        .with_state(state);

    if let Some(start_path) = &cfg.start_path {
        let target = format!("/{}", start_path.trim_start_matches("./").trim_start_matches('/'));
        app = app.route(
            "/",
            get(move || {
                let target = target.clone();
                async move { Redirect::temporary(&target) }
            }),
        );
    }

    let app = app
        .fallback_service(ServeDir::new(&cfg.root))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", cfg.port))
        .await
        .with_context(|| format!("binding dev server to port {}", cfg.port))?;

    info!(
        port = cfg.port,
        root = %cfg.root,
        "dev server listening on http://127.0.0.1:{}",
        cfg.port
    );

    axum::serve(listener, app).await.context("dev server exited")
}

async fn client_script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript")],
        CLIENT_SCRIPT,
    )
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServeState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One connected browser session: forward reload signals until the client
/// disconnects or its subscription lags out.
async fn handle_socket(socket: WebSocket, state: Arc<ServeState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut signals = state.hub.subscribe();

    debug!(
        clients = state.hub.subscriber_count(),
        "live-reload client connected"
    );

    loop {
        tokio::select! {
            signal = signals.recv() => {
                match signal {
                    Ok(ReloadSignal { task }) => {
                        let frame = ReloadFrame { cmd: "reload", task: &task };
                        let Ok(json) = serde_json::to_string(&frame) else {
                            continue;
                        };
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("live-reload client lagged, missed {} signals", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) => {
                        break;
                    }
                }
            }
        }
    }

    debug!("live-reload client disconnected");
}
