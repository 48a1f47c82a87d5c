//! The error type shared by every part of the hub.

use std::{borrow::Cow, error::Error, fmt};

/// Everything that can go wrong while binding, sending, receiving, or
/// configuring the hub.
#[derive(Debug)]
pub enum HubError {
    /// Returned when the ZeroMQ library reports a failure.
    Zmq(zmq::Error),

    /// Returned when io fails, usually while reading a config file or
    /// driving the terminal.
    IoError(std::io::Error),

    /// Returned when a config file cannot be deserialized.
    RonSpannedError(ron::de::SpannedError),

    /// Returned when a config cannot be serialized.
    RonError(ron::Error),

    /// Returned when the broadcast endpoint could not be bound within the
    /// configured number of attempts.
    BindExhausted {
        /// The endpoint we tried to bind.
        endpoint: String,
        /// How many binds were attempted before giving up.
        attempts: u32,
    },

    /// Returned when the ingest endpoint cannot be bound. This is fatal for
    /// telemetry ingestion and is never retried.
    IngestBind {
        /// The endpoint we tried to bind.
        endpoint: String,
        /// The underlying transport error.
        source: zmq::Error,
    },

    /// Returned when sending on a publisher whose socket is closed.
    NotBound,

    /// Returned when an inbound message does not have exactly two parts.
    MalformedMessage {
        /// The number of parts that actually arrived.
        parts: usize,
    },

    /// Returned when a message starts like a build handshake but does not
    /// carry an integer build number.
    BadHandshake(String),

    /// Returned when a cursor dropdown index is outside `0..4`.
    InvalidDropdown(usize),

    /// Returned when a cursor style is outside the dropdown's styles.
    InvalidStyle(u8),

    /// Returned when a cursor size is NaN or infinite.
    InvalidCursorSize(f64),

    /// Returned when toggling an operation the panel was not configured with.
    UnknownOperation(String),

    /// Returned when the listener thread panicked instead of exiting.
    ListenerPanicked,
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use HubError as HE;
        let msg = match self {
            HE::Zmq(error) => Cow::from(format!("zmq error: {}", error)),
            HE::IoError(error) => Cow::from(format!("io error: {}", error)),
            HE::RonSpannedError(error) => Cow::from(format!("config error: {}", error)),
            HE::RonError(error) => Cow::from(format!("ron error: {}", error)),
            HE::BindExhausted { endpoint, attempts } => Cow::from(format!(
                "could not bind {} after {} attempts",
                endpoint, attempts
            )),
            HE::IngestBind { endpoint, source } => {
                Cow::from(format!("could not bind ingest endpoint {}: {}", endpoint, source))
            }
            HE::NotBound => Cow::from("publisher socket is not bound"),
            HE::MalformedMessage { parts } => {
                Cow::from(format!("expected a 2 part message, got {} parts", parts))
            }
            HE::BadHandshake(content) => Cow::from(format!("bad handshake {:?}", content)),
            HE::InvalidDropdown(index) => Cow::from(format!("no cursor dropdown {}", index)),
            HE::InvalidStyle(style) => Cow::from(format!("no cursor style {}", style)),
            HE::InvalidCursorSize(size) => Cow::from(format!("invalid cursor size {}", size)),
            HE::UnknownOperation(name) => Cow::from(format!("unknown operation {:?}", name)),
            HE::ListenerPanicked => Cow::from("listener thread panicked"),
        };

        write!(f, "{}", msg)
    }
}

impl Error for HubError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HubError::Zmq(error) => Some(error),
            HubError::IoError(error) => Some(error),
            HubError::RonSpannedError(error) => Some(error),
            HubError::RonError(error) => Some(error),
            HubError::IngestBind { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<zmq::Error> for HubError {
    fn from(value: zmq::Error) -> Self {
        Self::Zmq(value)
    }
}

impl From<std::io::Error> for HubError {
    fn from(value: std::io::Error) -> Self {
        Self::IoError(value)
    }
}

impl From<ron::de::SpannedError> for HubError {
    fn from(value: ron::de::SpannedError) -> Self {
        Self::RonSpannedError(value)
    }
}

impl From<ron::Error> for HubError {
    fn from(value: ron::Error) -> Self {
        Self::RonError(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_endpoint() {
        let err = HubError::BindExhausted {
            endpoint: "tcp://*:7788".to_owned(),
            attempts: 3,
        };
        assert_eq!(err.to_string(), "could not bind tcp://*:7788 after 3 attempts");
    }

    #[test]
    fn zmq_errors_convert() {
        let err: HubError = zmq::Error::EADDRINUSE.into();
        assert!(matches!(err, HubError::Zmq(zmq::Error::EADDRINUSE)));
        assert!(err.source().is_some());
    }
}
