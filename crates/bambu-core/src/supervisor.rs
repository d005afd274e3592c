// ── Connection supervisor ──
//
// The single entry point for connect and refresh requests. All session
// mutations run on one worker task, so connect, reconnect, publish, and
// refresh never interleave. Consumers talk to the worker through a
// bounded command queue and observe results through the StateStore.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use bambu_api::{Connector, TransportEvent};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::CoreError;
use crate::model::{Credentials, status};
use crate::session::{ConnectionState, Session, SessionContext};
use crate::store::StateStore;

const COMMAND_CHANNEL_SIZE: usize = 32;

/// What a connect request ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A credential field was empty; nothing happened.
    Ignored,
    /// Same credentials and the live session is connected; kept as is.
    Reused,
    /// A new transport was opened (any previous one was closed first).
    Connecting,
}

/// A command sent to the worker, with its reply channel.
enum Command {
    Connect {
        credentials: Credentials,
        force: bool,
        response_tx: oneshot::Sender<Result<RequestOutcome, CoreError>>,
    },
    Refresh {
        response_tx: oneshot::Sender<bool>,
    },
}

// ── Supervisor ───────────────────────────────────────────────────────

/// Owner of the printer connection.
///
/// Cheaply cloneable via `Arc<SupervisorInner>`. Dropping every clone
/// stops the worker and closes the transport.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<SupervisorInner>,
}

struct SupervisorInner {
    store: StateStore,
    connection_state: watch::Receiver<ConnectionState>,
    command_tx: mpsc::Sender<Command>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    /// Spawn the worker. Must be called from within a Tokio runtime.
    /// Nothing connects until the first [`request`](Self::request).
    pub fn spawn<C: Connector>(connector: C, config: MonitorConfig, store: StateStore) -> Self {
        let (phase_tx, phase_rx) = watch::channel(ConnectionState::Idle);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let cancel = CancellationToken::new();

        let ctx = SessionContext {
            store: store.clone(),
            config,
            phase: phase_tx,
        };
        let worker = tokio::spawn(worker_loop(connector, ctx, command_rx, cancel.clone()));

        Self {
            inner: Arc::new(SupervisorInner {
                store,
                connection_state: phase_rx,
                command_tx,
                cancel,
                worker: Mutex::new(Some(worker)),
            }),
        }
    }

    /// Connect, reuse, or force a reconnect.
    ///
    /// - any empty credential field: no-op ([`RequestOutcome::Ignored`])
    /// - same credentials, `force == false`, session connected: no-op
    ///   ([`RequestOutcome::Reused`])
    /// - otherwise: close the current transport and open a new one
    pub async fn request(
        &self,
        credentials: Credentials,
        force: bool,
    ) -> Result<RequestOutcome, CoreError> {
        if !credentials.is_complete() {
            debug!("ignoring connect request with incomplete credentials");
            return Ok(RequestOutcome::Ignored);
        }

        let (tx, rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(Command::Connect {
                credentials,
                force,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::SupervisorStopped)?;

        rx.await.map_err(|_| CoreError::SupervisorStopped)?
    }

    /// Ask the printer for a full status push now. Returns `false` when
    /// there is no connected session or no request could be queued.
    pub async fn refresh(&self) -> Result<bool, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(Command::Refresh { response_tx: tx })
            .await
            .map_err(|_| CoreError::SupervisorStopped)?;

        rx.await.map_err(|_| CoreError::SupervisorStopped)
    }

    /// Subscribe to session phase changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.clone()
    }

    pub fn is_connected(&self) -> bool {
        *self.inner.connection_state.borrow() == ConnectionState::Connected
    }

    pub fn store(&self) -> &StateStore {
        &self.inner.store
    }

    /// Stop the worker, closing the transport with the shutdown grace
    /// period. Later requests fail with [`CoreError::SupervisorStopped`].
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(handle) = self.inner.worker.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "supervisor worker ended abnormally");
            }
        }
        debug!("supervisor shut down");
    }
}

// ── Worker ───────────────────────────────────────────────────────────

async fn worker_loop<C: Connector>(
    connector: C,
    ctx: SessionContext,
    mut commands: mpsc::Receiver<Command>,
    cancel: CancellationToken,
) {
    let mut session: Option<Session<C::Link>> = None;
    let mut refresh = refresh_interval(ctx.config.refresh_interval);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = next_event(&mut session) => match event {
                Some(event) => {
                    if let Some(active) = session.as_mut() {
                        active.handle_event(event, &ctx).await;
                    }
                }
                None => {
                    warn!("transport stopped retrying, dropping session");
                    if let Some(stale) = session.take() {
                        stale.close(ctx.config.reconnect_grace).await;
                    }
                }
            },
            command = commands.recv() => {
                let Some(command) = command else { break };
                match command {
                    Command::Connect { credentials, force, response_tx } => {
                        let outcome = connect(&connector, &mut session, credentials, force, &ctx).await;
                        let _ = response_tx.send(outcome);
                    }
                    Command::Refresh { response_tx } => {
                        let sent = match session.as_ref() {
                            Some(active) => active.refresh(&ctx).await,
                            None => false,
                        };
                        let _ = response_tx.send(sent);
                    }
                }
            }
            () = next_tick(&mut refresh) => {
                if let Some(active) = session.as_ref() {
                    debug!("periodic refresh");
                    active.refresh(&ctx).await;
                }
            }
        }
    }

    if let Some(active) = session.take() {
        active.close(ctx.config.shutdown_grace).await;
    }
    ctx.set_phase(ConnectionState::Idle);
    debug!("supervisor worker exiting");
}

/// Reconnect unless the live session already serves `credentials`.
async fn connect<C: Connector>(
    connector: &C,
    slot: &mut Option<Session<C::Link>>,
    credentials: Credentials,
    force: bool,
    ctx: &SessionContext,
) -> Result<RequestOutcome, CoreError> {
    let reusable = !force
        && slot
            .as_ref()
            .is_some_and(|active| active.credentials() == &credentials && active.is_connected());
    if reusable {
        debug!(serial = %credentials.serial, "reusing connected session");
        return Ok(RequestOutcome::Reused);
    }

    info!(ip = %credentials.ip, serial = %credentials.serial, force, "connecting to printer");
    ctx.set_status(status::CONNECTING);
    ctx.set_phase(ConnectionState::Connecting);

    if let Some(previous) = slot.take() {
        previous.close(ctx.config.reconnect_grace).await;
    }

    match Session::open(connector, credentials, &ctx.config) {
        Ok(session) => {
            *slot = Some(session);
            Ok(RequestOutcome::Connecting)
        }
        Err(e) => {
            warn!(error = %e, "failed to open transport");
            ctx.set_phase(ConnectionState::Error);
            ctx.set_status(status::ERROR);
            Err(e.into())
        }
    }
}

async fn next_event<L: bambu_api::Link>(
    session: &mut Option<Session<L>>,
) -> Option<TransportEvent> {
    match session {
        Some(active) => active.next_event().await,
        None => pending().await,
    }
}

/// First tick fires one full period after start.
fn refresh_interval(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}
