//! Error types shared by metric sources and transports.

use std::path::PathBuf;

use thiserror::Error;

use crate::reading::MetricName;

/// Boxed error used to carry transport-library failures through the core
/// without depending on those libraries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Render an error with its whole `source()` chain, `outer: inner: root`.
pub fn display_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut next = err.source();
    while let Some(cause) = next {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        next = cause.source();
    }
    text
}

/// A metric source could not produce a reading (or a delta) this cycle.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The underlying OS facility could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The facility was read but its content did not parse.
    #[error("malformed {}: {detail}", path.display())]
    Malformed { path: PathBuf, detail: String },

    /// `delta` was handed two readings of different metrics.
    #[error("cannot diff a {old} reading against a {new} reading")]
    ShapeMismatch { old: MetricName, new: MetricName },
}

impl SourceError {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Unavailable {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            detail: detail.into(),
        }
    }
}

/// A transport failed to deliver one reading.
#[derive(Debug, Error)]
pub enum SendError {
    /// The reading could not be encoded for the wire.
    #[error("failed to encode payload")]
    Encode(#[source] BoxError),

    /// The network or broker client rejected the request.
    #[error("delivery failed")]
    Delivery(#[source] BoxError),

    /// The endpoint answered with a non-success status.
    #[error("endpoint responded with status {0}")]
    Status(u16),

    /// The session was rejected; a fresh one was obtained but this reading
    /// was not delivered.
    #[error("session rejected with status {status}, logged in again")]
    SessionExpired { status: u16 },

    /// The session was rejected and logging in again failed too.
    #[error("session rejected with status {status} and re-login failed")]
    LoginFailed {
        status: u16,
        #[source]
        source: BoxError,
    },

    /// No session was held and logging in before the send failed.
    #[error("not logged in")]
    NotLoggedIn(#[source] BoxError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_includes_every_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = SendError::Delivery(Box::new(io));
        assert_eq!(display_chain(&err), "delivery failed: refused");
    }

    #[test]
    fn unavailable_names_the_path() {
        let err = SourceError::unavailable(
            "/proc/diskstats",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.to_string().starts_with("cannot read /proc/diskstats"));
    }
}
