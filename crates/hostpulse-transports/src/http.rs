//! HttpTransport: posts each reading as a JSON event to a REST endpoint.
//!
//! Every request carries the session token in a configurable header. The
//! token is obtained by posting credentials to the login endpoint and is
//! read back from the same header on the response. A 401 or 403 from the
//! data endpoint drops the token and logs in again right away; the rejected
//! event is reported as failed, not resent.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info, warn};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

use hostpulse_core::{DeltaReading, MetricName, Reading, SendError, TopicTemplate, Transport};

use crate::{ConnectError, LoginError};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_PATH: &str = "/api/event";
pub const DEFAULT_LOGIN_PATH: &str = "/api/session";
pub const DEFAULT_SESSION_HEADER: &str = "x-session-key";
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Location of one API endpoint. Displays as `protocol://host:port/path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Endpoint {
    pub fn new(
        protocol: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        path: impl Into<String>,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            host: host.into(),
            port,
            path: path.into(),
        }
    }

    /// Plain-HTTP endpoint.
    pub fn http(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self::new("http", host, port, path)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sep = if self.path.starts_with('/') { "" } else { "/" };
        write!(
            f,
            "{}://{}:{}{}{}",
            self.protocol, self.host, self.port, sep, self.path
        )
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub client_id: String,
    pub username: String,
    pub password: String,
    pub data: Endpoint,
    pub login: Endpoint,
    pub session_header: String,
    /// Parsed and kept, but sends are never retried.
    pub max_retries: u32,
    pub topics: TopicTemplate,
    pub lat: f64,
    pub lng: f64,
    pub timeout: Duration,
}

impl HttpConfig {
    /// Defaults for everything but identity and credentials.
    pub fn new(
        client_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            username: username.into(),
            password: password.into(),
            data: Endpoint::http(DEFAULT_HOST, DEFAULT_PORT, DEFAULT_DATA_PATH),
            login: Endpoint::http(DEFAULT_HOST, DEFAULT_PORT, DEFAULT_LOGIN_PATH),
            session_header: DEFAULT_SESSION_HEADER.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            topics: TopicTemplate::default(),
            lat: 0.0,
            lng: 0.0,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// JSON body posted to the data endpoint.
#[derive(Debug, Serialize)]
pub struct Event<'a, T: Serialize> {
    pub value: &'a T,
    #[serde(rename = "eventType")]
    pub event_type: String,
    pub item: &'a str,
    pub username: &'a str,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    email: Option<&'a str>,
}

fn unix_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub struct HttpTransport {
    config: HttpConfig,
    client: Client,
    session: Option<String>,
    logins: u64,
}

impl HttpTransport {
    /// Build the client and log in. A failed login is fatal here.
    pub fn connect(config: HttpConfig) -> Result<Self, ConnectError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ConnectError::Client)?;
        let mut transport = Self {
            config,
            client,
            session: None,
            logins: 0,
        };
        transport.login()?;
        Ok(transport)
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Current session token, if logged in.
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// Number of login attempts so far.
    pub fn logins(&self) -> u64 {
        self.logins
    }

    /// Post credentials to the login endpoint and keep the returned token.
    pub fn login(&mut self) -> Result<String, LoginError> {
        self.session = None;
        self.logins += 1;
        info!(
            "logging in to {} with {}",
            self.config.login, self.config.username
        );

        let body = serde_json::to_vec(&LoginRequest {
            username: &self.config.username,
            password: &self.config.password,
            email: None,
        })?;
        let response = self
            .client
            .post(self.config.login.to_string())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoginError::Status(status.as_u16()));
        }
        let token = response
            .headers()
            .get(self.config.session_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| LoginError::MissingToken {
                header: self.config.session_header.clone(),
            })?;

        debug!("logged in with session {token}");
        self.session = Some(token.clone());
        Ok(token)
    }

    fn send<T: Serialize>(&mut self, topic: String, value: &T) -> Result<(), SendError> {
        let session = match self.session.clone() {
            Some(session) => session,
            None => self
                .login()
                .map_err(|e| SendError::NotLoggedIn(Box::new(e)))?,
        };

        let event = Event {
            value,
            event_type: topic,
            item: &self.config.client_id,
            username: &self.config.username,
            timestamp: unix_ms_now(),
            lat: self.config.lat,
            lng: self.config.lng,
        };
        let body = serde_json::to_vec(&event).map_err(|e| SendError::Encode(Box::new(e)))?;
        debug!("send {} to {}", event.event_type, self.config.data);

        let response = self
            .client
            .post(self.config.data.to_string())
            .header(CONTENT_TYPE, "application/json")
            .header(self.config.session_header.as_str(), session.as_str())
            .body(body)
            .send()
            .map_err(|e| SendError::Delivery(Box::new(e)))?;

        let status = response.status();
        debug!("response {status}");
        match status.as_u16() {
            _ if status.is_success() => Ok(()),
            code @ (401 | 403) => {
                warn!("session rejected with {code}, logging in again");
                match self.login() {
                    Ok(_) => Err(SendError::SessionExpired { status: code }),
                    Err(e) => Err(SendError::LoginFailed {
                        status: code,
                        source: Box::new(e),
                    }),
                }
            }
            code => Err(SendError::Status(code)),
        }
    }
}

impl Transport for HttpTransport {
    fn send_absolute(&mut self, name: MetricName, reading: &Reading) -> Result<(), SendError> {
        let topic = self.config.topics.topic(&self.config.client_id, name);
        self.send(topic, reading)
    }

    fn send_delta(&mut self, name: MetricName, delta: &DeltaReading) -> Result<(), SendError> {
        let topic = self.config.topics.delta_topic(&self.config.client_id, name);
        self.send(topic, delta)
    }

    fn on_shutdown(&mut self) {
        info!("closing HTTP session after {} logins", self.logins);
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_renders_as_url() {
        let ep = Endpoint::http("localhost", 8080, "/api/event");
        assert_eq!(ep.to_string(), "http://localhost:8080/api/event");
        let ep = Endpoint::new("https", "example.org", 443, "api/session");
        assert_eq!(ep.to_string(), "https://example.org:443/api/session");
    }

    #[test]
    fn config_defaults() {
        let config = HttpConfig::new("abc", "user", "secret");
        assert_eq!(config.data.to_string(), "http://localhost:8080/api/event");
        assert_eq!(config.login.to_string(), "http://localhost:8080/api/session");
        assert_eq!(config.session_header, "x-session-key");
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn event_envelope_field_names() {
        let value = serde_json::json!({"used": 1});
        let event = Event {
            value: &value,
            event_type: "/ef/machine/abc/stats/mem".to_string(),
            item: "abc",
            username: "user",
            timestamp: 1_700_000_000_000,
            lat: 0.0,
            lng: 0.0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventType"], "/ef/machine/abc/stats/mem");
        assert_eq!(json["item"], "abc");
        assert_eq!(json["value"]["used"], 1);
        assert_eq!(json["timestamp"], 1_700_000_000_000_u64);
        assert_eq!(json["lat"], 0.0);
    }

    #[test]
    fn login_request_sends_null_email() {
        let json = serde_json::to_value(LoginRequest {
            username: "u",
            password: "p",
            email: None,
        })
        .unwrap();
        assert!(json["email"].is_null());
        assert_eq!(json.as_object().unwrap().len(), 3);
    }
}
