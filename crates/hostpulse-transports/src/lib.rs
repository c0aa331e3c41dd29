//! Network transports for hostpulse.
//!
//! - [`MqttTransport`] publishes BSON documents to a broker.
//! - [`HttpTransport`] posts JSON event envelopes to a session-authenticated
//!   REST endpoint.
//! - [`MqttListener`] subscribes to the topics the MQTT transport publishes
//!   on and decodes what arrives.
//!
//! Connection failures at construction are [`ConnectError`]s and are fatal
//! for the caller. Per-reading failures surface as
//! [`SendError`](hostpulse_core::SendError) and are absorbed by the checker.

pub mod http;
pub mod listener;
pub mod mqtt;

pub use http::{Endpoint, HttpConfig, HttpTransport};
pub use listener::{ListenerHandle, MqttListener};
pub use mqtt::{MqttConfig, MqttTransport};

use thiserror::Error;

/// A transport could not be set up.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The broker answered the connect request with a refusal.
    #[error("broker {host}:{port} refused the connection: {reason}")]
    Refused {
        host: String,
        port: u16,
        reason: String,
    },

    /// The broker could not be reached or the connection broke before the
    /// handshake completed.
    #[error("cannot connect to broker {host}:{port}")]
    Unreachable {
        host: String,
        port: u16,
        #[source]
        source: rumqttc::ConnectionError,
    },

    /// The connection closed without a handshake response.
    #[error("broker {host}:{port} closed the connection before acknowledging it")]
    NoAck { host: String, port: u16 },

    /// The HTTP client could not be built.
    #[error("cannot build HTTP client")]
    Client(#[source] reqwest::Error),

    /// The initial login was rejected.
    #[error("initial login failed")]
    Login(#[from] LoginError),
}

/// Logging in to the HTTP session endpoint failed.
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("login request failed")]
    Request(#[from] reqwest::Error),

    #[error("login endpoint responded with status {0}")]
    Status(u16),

    #[error("login response carried no '{header}' header")]
    MissingToken { header: String },

    #[error("failed to encode login request")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostpulse_core::display_chain;

    #[test]
    fn login_error_is_wrapped_as_source() {
        let err = ConnectError::from(LoginError::Status(500));
        assert_eq!(
            display_chain(&err),
            "initial login failed: login endpoint responded with status 500"
        );
    }
}
