use crate::error::RuntimeError;
use crate::message::{ClientMessage, Control, Health, ServerMessage, SessionInfo, StatusReport};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Json, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use kvbench::{BenchRunner, Connector, RunnerState, StopHandle};
use kvbench_core::{BenchEvent, SessionStatus};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use tokio::sync::mpsc::{self, UnboundedSender};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument, warn, Instrument};
use uuid::Uuid;

type Registry = Arc<Mutex<HashMap<Uuid, SessionInfo>>>;

struct ServerState<C> {
    connector: C,
    sessions: Registry,
}

/// Relay routes backed by `connector`.
pub fn router<C>(connector: C) -> Router
where
    C: Connector + Clone + Sync + 'static,
{
    let state = ServerState {
        connector,
        sessions: Arc::new(Mutex::new(HashMap::new())),
    };

    Router::new()
        .route("/ws", get(ws::<C>))
        .route("/api/health", get(health::<C>))
        .route("/api/sessions", get(sessions::<C>))
        .with_state(Arc::new(state))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

pub(crate) async fn server_task<C>(port: u16, connector: C) -> Result<(), RuntimeError>
where
    C: Connector + Clone + Sync + 'static,
{
    let socket_addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(socket_addr).await?;

    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(connector))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
}

impl IntoResponse for RuntimeError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal error: {self}"),
        )
            .into_response()
    }
}

async fn health<C>(State(state): State<Arc<ServerState<C>>>) -> Result<Json<Health>, RuntimeError>
where
    C: Connector + Clone + Sync + 'static,
{
    let active_sessions = state.sessions.lock()?.len();
    Ok(Json(Health {
        status: "healthy",
        timestamp: OffsetDateTime::now_utc(),
        active_sessions,
    }))
}

async fn sessions<C>(
    State(state): State<Arc<ServerState<C>>>,
) -> Result<Json<Vec<SessionInfo>>, RuntimeError>
where
    C: Connector + Clone + Sync + 'static,
{
    let mut sessions: Vec<_> = state.sessions.lock()?.values().cloned().collect();
    sessions.sort_by_key(|s| s.start_time);
    Ok(Json(sessions))
}

async fn ws<C>(State(state): State<Arc<ServerState<C>>>, ws: WebSocketUpgrade) -> Response
where
    C: Connector + Clone + Sync + 'static,
{
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

struct Active<C: Connector> {
    runner: Arc<BenchRunner<C, UnboundedSender<BenchEvent>>>,
    stop: StopHandle,
}

impl<C: Connector> Active<C> {
    fn is_running(&self) -> bool {
        !self.runner.state().is_terminal()
    }
}

#[instrument(name = "client", skip_all, fields(id = %Uuid::new_v4()))]
async fn handle_ws<C>(socket: WebSocket, state: Arc<ServerState<C>>)
where
    C: Connector + Clone + Sync + 'static,
{
    info!("Client connected.");
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<BenchEvent>();
    let mut active: Option<Active<C>> = None;

    loop {
        let reply = tokio::select! {
            msg = receiver.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        debug!("Socket error: {err}");
                        break;
                    }
                };

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => handle_client(msg, &state, &tx, &mut active),
                    Err(err) => Some(
                        Control::Invalid {
                            errors: vec![format!("malformed message: {err}")],
                        }
                        .into(),
                    ),
                }
            }
            Some(event) = rx.recv() => {
                if let (true, Some(active)) = (event.is_terminal(), &active) {
                    if let Some(status) = finished_status(active.runner.state()) {
                        set_status(&state.sessions, active.runner.session_id(), status);
                    }
                }
                Some(ServerMessage::from(event))
            }
        };

        if let Some(reply) = reply {
            if let Err(err) = send(&mut sender, &reply).await {
                debug!("Unable to write to client: {err}");
                break;
            }
        }
    }

    if let Some(active) = active {
        if active.is_running() {
            info!("Client disconnected mid-session, requesting stop.");
            active.stop.stop();
        }
        remove(&state.sessions, active.runner.session_id());
    }
    info!("Client disconnected.");
}

fn handle_client<C>(
    msg: ClientMessage,
    state: &ServerState<C>,
    tx: &UnboundedSender<BenchEvent>,
    active: &mut Option<Active<C>>,
) -> Option<ServerMessage>
where
    C: Connector + Clone + Sync + 'static,
{
    match msg {
        ClientMessage::StartTest { config } => {
            if active.as_ref().is_some_and(Active::is_running) {
                return Some(
                    Control::Rejected {
                        message: "a test is already running on this connection".to_string(),
                    }
                    .into(),
                );
            }

            let config = match config.validate() {
                Ok(config) => config,
                Err(errors) => {
                    debug!("Rejecting invalid config: {errors}");
                    return Some(Control::Invalid { errors: errors.0 }.into());
                }
            };

            if let Some(previous) = active.take() {
                remove(&state.sessions, previous.runner.session_id());
            }

            let runner = Arc::new(BenchRunner::new(
                config.clone(),
                state.connector.clone(),
                tx.clone(),
            ));
            let id = runner.session_id();
            insert(
                &state.sessions,
                SessionInfo {
                    id,
                    status: SessionStatus::Running,
                    start_time: OffsetDateTime::now_utc(),
                    config,
                },
            );

            let task = runner.clone();
            tokio::spawn(
                async move {
                    if let Err(err) = task.run().await {
                        warn!("Session {} not started: {err}", task.session_id());
                    }
                }
                .in_current_span(),
            );

            *active = Some(Active {
                stop: runner.stop_handle(),
                runner,
            });
            None
        }
        ClientMessage::StopTest => {
            match active {
                Some(active) if active.is_running() => {
                    info!("Stop requested for session {}.", active.runner.session_id());
                    active.stop.stop();
                }
                _ => debug!("Stop requested with no running session."),
            }
            None
        }
        ClientMessage::GetTestStatus => {
            let report = active
                .as_ref()
                .and_then(|a| lookup(&state.sessions, a.runner.session_id()))
                .map(StatusReport::Session)
                .unwrap_or_else(StatusReport::idle);
            Some(Control::Status(report).into())
        }
    }
}

fn finished_status(state: RunnerState) -> Option<SessionStatus> {
    match state {
        RunnerState::Completed => Some(SessionStatus::Completed),
        RunnerState::Stopped => Some(SessionStatus::Stopped),
        RunnerState::Error => Some(SessionStatus::Error),
        _ => None,
    }
}

async fn send(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(msg) {
        Ok(text) => text,
        Err(err) => {
            error!("Unable to serialize message: {err}");
            return Ok(());
        }
    };
    sender.send(Message::Text(text)).await
}

fn with_registry<R>(
    registry: &Registry,
    f: impl FnOnce(&mut HashMap<Uuid, SessionInfo>) -> R,
) -> Option<R> {
    match registry.lock() {
        Ok(mut sessions) => Some(f(&mut sessions)),
        Err(_) => {
            error!("{}", RuntimeError::PoisonData);
            None
        }
    }
}

fn insert(registry: &Registry, info: SessionInfo) {
    with_registry(registry, |s| s.insert(info.id, info));
}

fn remove(registry: &Registry, id: Uuid) {
    with_registry(registry, |s| s.remove(&id));
}

fn lookup(registry: &Registry, id: Uuid) -> Option<SessionInfo> {
    with_registry(registry, |s| s.get(&id).cloned()).flatten()
}

fn set_status(registry: &Registry, id: Uuid, status: SessionStatus) {
    with_registry(registry, |s| {
        if let Some(info) = s.get_mut(&id) {
            info.status = status;
        }
    });
}
