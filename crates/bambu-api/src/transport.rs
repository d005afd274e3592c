//! MQTT-over-TLS transport with auto-reconnect.
//!
//! [`MqttConnector`] opens one broker connection per call and spawns a
//! background pump that drives the `rumqttc` event loop. Everything the
//! pump observes is pushed onto a bounded [`TransportEvent`] channel; the
//! caller owns the receiving end and is expected to consume it from a
//! single task. Network failures are retried with exponential backoff +
//! jitter until the link is closed.
//!
//! The [`Connector`] and [`Link`] traits are the seam the session layer
//! is written against, so tests can substitute an in-memory transport.
//!
//! # Example
//!
//! ```rust,ignore
//! use bambu_api::{ConnectParams, Connector, Link, MqttConnector, TransportEvent};
//!
//! let (link, mut events) = MqttConnector.open(params)?;
//! while let Some(event) = events.recv().await {
//!     if matches!(event, TransportEvent::Connected) {
//!         link.subscribe("device/01S00A123456789/report").await?;
//!     }
//! }
//! link.close(Duration::from_millis(500)).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, NetworkOptions, Outgoing, Packet, QoS,
    TlsConfiguration, Transport,
};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::tls::TlsMode;

// ── Client request queue capacity ────────────────────────────────────

const REQUEST_CHANNEL_CAPACITY: usize = 16;

/// Full status reports with AMS data run to tens of kilobytes.
const MAX_INCOMING_PACKET: usize = 1024 * 1024;
const MAX_OUTGOING_PACKET: usize = 64 * 1024;

// ── TransportEvent ───────────────────────────────────────────────────

/// Something the transport observed, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The broker acknowledged our CONNECT (initial or after a retry).
    Connected,
    /// An application message arrived on a subscribed topic.
    Message { topic: String, payload: Bytes },
    /// The connection sequence failed before the first acknowledgement.
    ConnectFailed(String),
    /// An established connection dropped. Reconnection continues underneath.
    Lost(String),
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for transport reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── ConnectParams ────────────────────────────────────────────────────

/// Everything needed to open one broker connection.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: String,
    pub password: SecretString,
    pub keep_alive: Duration,
    pub connect_timeout: Duration,
    pub tls: TlsMode,
    pub reconnect: ReconnectConfig,
    /// Capacity of the bounded event channel handed back to the caller.
    pub event_capacity: usize,
}

// ── Traits ───────────────────────────────────────────────────────────

/// Opens transport links. One call, one connection.
pub trait Connector: Send + Sync + 'static {
    type Link: Link;

    /// Start connecting. Returns immediately with the link handle and the
    /// receiving end of its event channel; the handshake completes
    /// asynchronously and is reported as [`TransportEvent::Connected`] or
    /// [`TransportEvent::ConnectFailed`].
    fn open(
        &self,
        params: ConnectParams,
    ) -> Result<(Self::Link, mpsc::Receiver<TransportEvent>), Error>;
}

/// An open transport link.
pub trait Link: Send + Sync + 'static {
    /// Subscribe to a topic at QoS 0.
    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), Error>> + Send;

    /// Publish a payload at QoS 0, fire-and-forget.
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Disconnect and stop the background pump, waiting at most `grace`.
    fn close(self, grace: Duration) -> impl Future<Output = Result<(), Error>> + Send;
}

// ── MqttConnector ────────────────────────────────────────────────────

/// [`Connector`] backed by `rumqttc` over rustls.
#[derive(Debug, Clone, Copy, Default)]
pub struct MqttConnector;

impl Connector for MqttConnector {
    type Link = MqttLink;

    fn open(
        &self,
        params: ConnectParams,
    ) -> Result<(MqttLink, mpsc::Receiver<TransportEvent>), Error> {
        let tls = params.tls.client_config()?;

        let mut options = MqttOptions::new(&params.client_id, &params.host, params.port);
        options
            .set_credentials(&params.username, params.password.expose_secret())
            .set_keep_alive(params.keep_alive)
            .set_clean_session(true)
            .set_max_packet_size(MAX_INCOMING_PACKET, MAX_OUTGOING_PACKET)
            .set_transport(Transport::tls_with_config(TlsConfiguration::Rustls(tls)));

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        let mut network = NetworkOptions::new();
        network.set_connection_timeout(params.connect_timeout.as_secs().max(1));
        eventloop.set_network_options(network);

        let (event_tx, event_rx) = mpsc::channel(params.event_capacity.max(1));
        let cancel = CancellationToken::new();

        tracing::info!(
            host = %params.host,
            port = params.port,
            client_id = %params.client_id,
            "Opening MQTT transport"
        );

        let task_cancel = cancel.clone();
        let pump = tokio::spawn(async move {
            pump_loop(eventloop, event_tx, params.reconnect, task_cancel).await;
        });

        Ok((
            MqttLink {
                client,
                cancel,
                pump: Some(pump),
            },
            event_rx,
        ))
    }
}

// ── MqttLink ─────────────────────────────────────────────────────────

/// Handle to an open `rumqttc` connection.
///
/// Dropping the link cancels its pump without a graceful DISCONNECT.
pub struct MqttLink {
    client: AsyncClient,
    cancel: CancellationToken,
    pump: Option<JoinHandle<()>>,
}

impl Link for MqttLink {
    async fn subscribe(&self, topic: &str) -> Result<(), Error> {
        self.client.subscribe(topic, QoS::AtMostOnce).await?;
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Error> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await?;
        Ok(())
    }

    async fn close(mut self, grace: Duration) -> Result<(), Error> {
        let Some(mut pump) = self.pump.take() else {
            return Ok(());
        };

        // The pump exits on its own once the DISCONNECT is flushed.
        if let Err(e) = self.client.try_disconnect() {
            tracing::debug!(error = %e, "Disconnect request not queued");
            self.cancel.cancel();
        }

        if tokio::time::timeout(grace, &mut pump).await.is_ok() {
            return Ok(());
        }

        self.cancel.cancel();
        pump.abort();
        Err(Error::Teardown {
            grace_ms: u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
        })
    }
}

impl Drop for MqttLink {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Background event pump ────────────────────────────────────────────

/// Main loop: poll → forward → on error, backoff → poll again.
///
/// `rumqttc` reconnects on the next `poll()` after an error, so the loop
/// only has to pace retries and translate connection transitions.
async fn pump_loop(
    mut eventloop: EventLoop,
    event_tx: mpsc::Sender<TransportEvent>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;
    let mut connected = false;
    let mut ever_connected = false;

    loop {
        let polled = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            polled = eventloop.poll() => polled,
        };

        let event = match polled {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!("MQTT connected");
                connected = true;
                ever_connected = true;
                attempt = 0;
                Some(TransportEvent::Connected)
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => Some(TransportEvent::Message {
                topic: publish.topic,
                payload: publish.payload,
            }),
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::debug!("MQTT disconnect sent");
                break;
            }
            Ok(_) => None,
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(error = %reason, attempt, "MQTT connection error");

                let event = if connected {
                    connected = false;
                    Some(TransportEvent::Lost(reason))
                } else if ever_connected {
                    None
                } else {
                    Some(TransportEvent::ConnectFailed(reason))
                };

                if let Some(event) = event {
                    if event_tx.send(event).await.is_err() {
                        break;
                    }
                }

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            max_retries = max,
                            "MQTT reconnection limit reached, giving up"
                        );
                        break;
                    }
                }

                let delay = calculate_backoff(attempt, &reconnect);
                tracing::info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                    "Waiting before reconnect"
                );

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }

                attempt = attempt.saturating_add(1);
                None
            }
        };

        if let Some(event) = event {
            // Receiver gone means the session was superseded.
            if event_tx.send(event).await.is_err() {
                break;
            }
        }
    }

    tracing::debug!("MQTT pump exiting");
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% and derived from the attempt number.
pub(crate) fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(31)).unwrap_or(31);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
