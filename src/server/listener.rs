//! Listener setup and the per-connection frame pump.
//!
//! # Responsibilities
//! - Bind one TCP listener per listener group and serve upgrade requests
//! - Run the admission pipeline before completing any handshake
//! - Pump frames between the socket and the dispatch core
//! - Fire idle events when a configured idle window elapses
//!
//! # Data Flow
//! ```text
//! HTTP request → upgrade_handler
//!     → UpgradeGate::admit (reject / abort / accept)
//!     → WebSocketUpgrade::on_upgrade → pump
//!         reader half → EventRouter::do_on_message / do_on_binary
//!         writer half ← ChannelTransport frame queue
//!         socket gone → EventRouter::do_on_close
//! ```
//!
//! # Design Decisions
//! - Each configured idle window (reader, writer, all) runs as its own timer
//!   and fires its own event, re-arming from the fire instant
//! - A pre-handshake hook that closes the connection gets no handshake; the
//!   platform still has to answer something, so the reply is an empty 403
//!   with `Connection: close`, the quietest refusal it can produce

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::admission::{Admission, UpgradeGate, UpgradeRequest};
use crate::config::{CorsConfig, EndpointConfig};
use crate::dispatch::{Connection, EventPayload, EventRouter, Transport};

use super::registry::ListenerGroup;
use super::transport::{ChannelTransport, OutFrame};

/// State shared by every upgrade request on one listener.
#[derive(Clone)]
struct AppState {
    gate: Arc<UpgradeGate>,
    router: Arc<EventRouter>,
    config: Arc<EndpointConfig>,
}

/// Serve one listener group until shutdown.
pub async fn serve(group: ListenerGroup) -> Result<(), std::io::Error> {
    let config = Arc::new(group.config);

    if config.tls.is_some() {
        tracing::warn!(
            host = %config.host,
            port = config.port,
            "TLS settings present but termination is delegated; serving plaintext"
        );
    }
    if config.use_compression {
        tracing::warn!(
            host = %config.host,
            port = config.port,
            "per-message compression is not negotiated; option ignored"
        );
    }

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;
    tracing::info!(
        address = %addr,
        patterns = group.router.pattern_count(),
        "endpoint listener starting"
    );

    let state = AppState {
        gate: Arc::new(UpgradeGate::new(Arc::clone(&group.router))),
        router: group.router,
        config: Arc::clone(&config),
    };
    let app = build_router(&config, state);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(address = %addr, "endpoint listener stopped");
    Ok(())
}

/// Build the Axum router. Every path funnels into the one upgrade handler;
/// path matching is the admission gate's job, not Axum's.
fn build_router(config: &EndpointConfig, state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", any(upgrade_handler))
        .route("/{*path}", any(upgrade_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(&config.cors) {
        app = app.layer(cors);
    }
    app
}

fn cors_layer(config: &CorsConfig) -> Option<CorsLayer> {
    if config.allowed_origins.is_empty() {
        return None;
    }
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "unparseable CORS origin skipped");
                None
            }
        })
        .collect();
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_credentials(config.allow_credentials),
    )
}

async fn upgrade_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let (mut parts, _body) = request.into_parts();
    let req = UpgradeRequest::from_parts(&parts);

    let transport = Arc::new(ChannelTransport::new(Some(addr)));
    let conn = Arc::new(Connection::new(
        Arc::clone(&transport) as Arc<dyn crate::dispatch::Transport>
    ));

    let accepted = match state.gate.admit(&conn, &req) {
        Admission::Accept(accepted) => accepted,
        Admission::Reject(rejection) => {
            tracing::debug!(
                connection = %conn.id(),
                path = req.path(),
                status = rejection.status().as_u16(),
                "upgrade rejected"
            );
            return rejection.into_response();
        }
        Admission::Abort => {
            tracing::debug!(connection = %conn.id(), path = req.path(), "upgrade aborted by handler");
            return (StatusCode::FORBIDDEN, [(header::CONNECTION, "close")]).into_response();
        }
    };

    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &()).await {
        Ok(upgrade) => upgrade,
        Err(err) => {
            tracing::warn!(connection = %conn.id(), error = %err, "handshake extraction failed");
            return UpgradeGate::reject_malformed().into_response();
        }
    };
    let mut upgrade = upgrade
        .max_message_size(state.config.max_frame_payload)
        .max_frame_size(state.config.max_frame_payload);
    if let Some(protocol) = accepted.subprotocols.clone() {
        upgrade = upgrade.protocols([protocol]);
    }

    let pattern = accepted.pattern;
    upgrade
        .on_upgrade(move |socket| pump(socket, state, conn, transport, req, pattern))
        .into_response()
}

/// Run a dispatch closure, offloading to the blocking pool when the
/// listener is configured for it.
async fn run_dispatch(use_pool: bool, task: impl FnOnce() + Send + 'static) {
    if use_pool {
        if let Err(err) = tokio::task::spawn_blocking(task).await {
            tracing::error!(error = %err, "worker pool dispatch failed");
        }
    } else {
        task();
    }
}

/// The per-connection frame pump. Owns the socket until either side closes.
async fn pump(
    socket: WebSocket,
    state: AppState,
    conn: Arc<Connection>,
    transport: Arc<ChannelTransport>,
    req: UpgradeRequest,
    pattern: String,
) {
    let use_pool = state.config.use_worker_pool;
    let router = state.router;
    let (mut sink, mut stream) = socket.split();

    let Some(mut frames) = transport.take_receiver() else {
        tracing::error!(connection = %conn.id(), "frame queue already claimed; dropping connection");
        return;
    };

    // Write activity is observed from the writer task through a shared
    // millisecond mark so the idle timers can see it.
    let epoch = Instant::now();
    let write_mark = Arc::new(AtomicU64::new(0));
    let writer_mark = Arc::clone(&write_mark);
    let writer = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            let message = match frame {
                OutFrame::Text(text) => Message::Text(text.into()),
                OutFrame::Binary(data) => Message::Binary(data),
                OutFrame::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            };
            if sink.send(message).await.is_err() {
                break;
            }
            writer_mark.store(epoch.elapsed().as_millis() as u64, Ordering::Relaxed);
        }
    });

    {
        let router = Arc::clone(&router);
        let conn = Arc::clone(&conn);
        let req = req.clone();
        let pattern = pattern.clone();
        run_dispatch(use_pool, move || router.do_on_open(&conn, &req, &pattern)).await;
    }

    let mut idle = IdleSchedule::new(&state.config);
    let mut last_read = Instant::now();

    while transport.is_active() {
        let last_write = epoch + Duration::from_millis(write_mark.load(Ordering::Relaxed));
        let next = match idle.next_deadline(last_read, last_write) {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline.into(), stream.next()).await {
                    Ok(item) => item,
                    Err(_) => {
                        for payload in idle.expired(Instant::now(), last_read, last_write) {
                            let router = Arc::clone(&router);
                            let conn = Arc::clone(&conn);
                            run_dispatch(use_pool, move || router.do_on_event(&conn, &payload))
                                .await;
                        }
                        continue;
                    }
                }
            }
            None => stream.next().await,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                last_read = Instant::now();
                let router = Arc::clone(&router);
                let conn = Arc::clone(&conn);
                run_dispatch(use_pool, move || router.do_on_message(&conn, text.as_str())).await;
            }
            Some(Ok(Message::Binary(data))) => {
                last_read = Instant::now();
                let router = Arc::clone(&router);
                let conn = Arc::clone(&conn);
                run_dispatch(use_pool, move || router.do_on_binary(&conn, &data)).await;
            }
            // The library answers pings on its own.
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                last_read = Instant::now();
            }
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(err)) => {
                let error: Arc<dyn std::error::Error + Send + Sync> = Arc::new(err);
                let router = Arc::clone(&router);
                let conn = Arc::clone(&conn);
                run_dispatch(use_pool, move || router.do_on_error(&conn, &error)).await;
                break;
            }
        }
    }

    transport.close();
    let _ = writer.await;

    {
        let router = Arc::clone(&router);
        let conn = Arc::clone(&conn);
        run_dispatch(use_pool, move || router.do_on_close(&conn)).await;
    }
    tracing::debug!(connection = %conn.id(), pattern, online = router.online(), "connection torn down");
}

/// Idle timers for one connection. Every configured window runs
/// independently and fires its own event; a fired timer re-arms from the
/// fire instant, so a quiet connection keeps being notified each interval.
struct IdleSchedule {
    timers: Vec<IdleTimer>,
}

struct IdleTimer {
    kind: IdleKind,
    window: Duration,
    rearmed: Instant,
}

#[derive(Clone, Copy)]
enum IdleKind {
    Reader,
    Writer,
    All,
}

impl IdleTimer {
    fn deadline(&self, last_read: Instant, last_write: Instant) -> Instant {
        let activity = match self.kind {
            IdleKind::Reader => last_read,
            IdleKind::Writer => last_write,
            IdleKind::All => last_read.max(last_write),
        };
        activity.max(self.rearmed) + self.window
    }

    fn payload(&self) -> EventPayload {
        match self.kind {
            IdleKind::Reader => EventPayload::ReaderIdle,
            IdleKind::Writer => EventPayload::WriterIdle,
            IdleKind::All => EventPayload::AllIdle,
        }
    }
}

impl IdleSchedule {
    fn new(config: &EndpointConfig) -> Self {
        let now = Instant::now();
        let mut timers = Vec::new();
        for (secs, kind) in [
            (config.reader_idle_secs, IdleKind::Reader),
            (config.writer_idle_secs, IdleKind::Writer),
            (config.all_idle_secs, IdleKind::All),
        ] {
            if secs > 0 {
                timers.push(IdleTimer {
                    kind,
                    window: Duration::from_secs(secs),
                    rearmed: now,
                });
            }
        }
        Self { timers }
    }

    /// The nearest deadline across all armed timers, `None` when no idle
    /// window is configured.
    fn next_deadline(&self, last_read: Instant, last_write: Instant) -> Option<Instant> {
        self.timers
            .iter()
            .map(|timer| timer.deadline(last_read, last_write))
            .min()
    }

    /// Payloads for every window past its deadline; fired timers re-arm.
    fn expired(
        &mut self,
        now: Instant,
        last_read: Instant,
        last_write: Instant,
    ) -> Vec<EventPayload> {
        let mut fired = Vec::new();
        for timer in &mut self.timers {
            if timer.deadline(last_read, last_write) <= now {
                timer.rearmed = now;
                fired.push(timer.payload());
            }
        }
        fired
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
