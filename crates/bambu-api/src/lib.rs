// bambu-api: MQTT-over-TLS transport and wire protocol for Bambu Lab printers

pub mod error;
pub mod tls;
pub mod transport;
pub mod wire;

pub use error::Error;
pub use tls::TlsMode;
pub use transport::{
    ConnectParams, Connector, Link, MqttConnector, MqttLink, ReconnectConfig, TransportEvent,
};
