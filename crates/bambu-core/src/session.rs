// ── Connection session ──
//
// One logical lifetime of a transport link to one printer. Owned and
// driven exclusively by the supervisor's worker task: every method here
// runs on that task, so nothing in this module needs locking.

use bambu_api::wire::{self, Request};
use bambu_api::{ConnectParams, Connector, Link, TransportEvent};
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::config::MonitorConfig;
use crate::model::{Credentials, UNKNOWN_DEVICE, status};
use crate::parser::parse_report;
use crate::store::StateStore;

// ── ConnectionState ──────────────────────────────────────────────────

/// Session phase, observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session (never started or torn down).
    Idle,
    /// Transport opened, waiting for the broker to acknowledge.
    Connecting,
    Connected,
    /// An established connection dropped; the transport keeps retrying.
    Disconnected,
    /// The connect sequence failed; the transport keeps retrying.
    Error,
}

/// Shared collaborators every session writes through.
pub(crate) struct SessionContext {
    pub store: StateStore,
    pub config: MonitorConfig,
    pub phase: watch::Sender<ConnectionState>,
}

impl SessionContext {
    pub(crate) fn set_phase(&self, phase: ConnectionState) {
        self.phase.send_if_modified(|current| {
            if *current == phase {
                return false;
            }
            *current = phase;
            true
        });
    }

    pub(crate) fn set_status(&self, status_text: &str) {
        self.store.update(|s| s.with_status(status_text));
    }
}

// ── Session ──────────────────────────────────────────────────────────

pub(crate) struct Session<L: Link> {
    credentials: Credentials,
    report_topic: String,
    request_topic: String,
    link: L,
    events: mpsc::Receiver<TransportEvent>,
    connected: bool,
}

impl<L: Link> Session<L> {
    /// Open a transport for `credentials`. The handshake completes
    /// asynchronously and arrives as a [`TransportEvent`].
    pub(crate) fn open<C>(
        connector: &C,
        credentials: Credentials,
        config: &MonitorConfig,
    ) -> Result<Self, bambu_api::Error>
    where
        C: Connector<Link = L>,
    {
        let params = ConnectParams {
            host: credentials.ip.clone(),
            port: config.port,
            client_id: wire::client_id(&credentials.serial),
            username: wire::USERNAME.into(),
            password: credentials.access_code.clone(),
            keep_alive: config.keep_alive,
            connect_timeout: config.connect_timeout,
            tls: config.tls.to_transport(),
            reconnect: config.reconnect.clone(),
            event_capacity: config.event_capacity,
        };

        let (link, events) = connector.open(params)?;

        Ok(Self {
            report_topic: wire::report_topic(&credentials.serial),
            request_topic: wire::request_topic(&credentials.serial),
            credentials,
            link,
            events,
            connected: false,
        })
    }

    pub(crate) fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected
    }

    /// Next transport event. `None` once the transport has given up.
    pub(crate) async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    pub(crate) async fn handle_event(&mut self, event: TransportEvent, ctx: &SessionContext) {
        match event {
            TransportEvent::Connected => self.on_connected(ctx).await,
            TransportEvent::Message { topic, payload } => self.on_message(&topic, &payload, ctx),
            TransportEvent::ConnectFailed(reason) => {
                warn!(serial = %self.credentials.serial, %reason, "connect sequence failed");
                self.connected = false;
                ctx.set_phase(ConnectionState::Error);
                ctx.set_status(status::ERROR);
            }
            TransportEvent::Lost(reason) => {
                warn!(serial = %self.credentials.serial, %reason, "connection lost");
                self.connected = false;
                ctx.set_phase(ConnectionState::Disconnected);
                ctx.set_status(status::DISCONNECTED);
            }
        }
    }

    async fn on_connected(&mut self, ctx: &SessionContext) {
        info!(serial = %self.credentials.serial, ip = %self.credentials.ip, "connected to printer");
        self.connected = true;
        ctx.set_phase(ConnectionState::Connected);

        if let Err(e) = self.link.subscribe(&self.report_topic).await {
            warn!(error = %e, topic = %self.report_topic, "subscribe failed");
        }

        self.refresh(ctx).await;

        let serial = self.credentials.serial.clone();
        ctx.store.update(|s| {
            let mut next = s.clone();
            if next.status_text.contains("Connecting") {
                next.status_text = status::CONNECTED.into();
            }
            if next.device_name == UNKNOWN_DEVICE {
                next.device_name = serial;
            }
            next
        });
    }

    fn on_message(&self, topic: &str, payload: &[u8], ctx: &SessionContext) {
        if topic != self.report_topic {
            trace!(topic, "ignoring message on unexpected topic");
            return;
        }

        let previous = ctx.store.get();
        match parse_report(payload, &previous, Utc::now()) {
            Ok(next) if next != *previous => ctx.store.replace(next),
            Ok(_) => trace!("report produced no change"),
            Err(e) => debug!(error = %e, bytes = payload.len(), "dropping malformed report"),
        }
    }

    /// Ask the printer for a full status push. Skipped while not connected;
    /// publish failures are logged and otherwise ignored. Returns whether
    /// at least one request was queued.
    pub(crate) async fn refresh(&self, ctx: &SessionContext) -> bool {
        if !self.connected {
            debug!("refresh skipped, transport not connected");
            return false;
        }

        let mut requests = vec![Request::push_all()];
        if ctx.config.fetch_version {
            requests.push(Request::get_version());
        }

        let mut queued = false;
        for request in requests {
            let body = match request.to_bytes() {
                Ok(body) => body,
                Err(e) => {
                    warn!(error = %e, "failed to encode refresh request");
                    continue;
                }
            };
            match self.link.publish(&self.request_topic, body).await {
                Ok(()) => queued = true,
                Err(e) => warn!(error = %e, "refresh request failed"),
            }
        }
        queued
    }

    /// Close the transport within `grace`. Teardown errors are discarded.
    pub(crate) async fn close(self, grace: std::time::Duration) {
        debug!(serial = %self.credentials.serial, ?grace, "closing session");
        if let Err(e) = self.link.close(grace).await {
            debug!(error = %e, "ignoring transport teardown error");
        }
    }
}
