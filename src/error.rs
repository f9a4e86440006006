//! Our error types for the bridge.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong between the broker and the instrument.
#[derive(Error, Debug)]
pub enum Error {
    /// The byte stream to the GPIB controller failed mid-exchange.
    #[error("serial communication error: {0}")]
    Serial(#[from] io::Error),
    /// The serial device could not be opened.
    #[error(transparent)]
    Port(#[from] serialport::Error),
    /// The controller did not identify itself as the expected model/firmware.
    #[error("controller identity mismatch: expected {expected:?}, got {got:?}")]
    IdentityMismatch {
        expected: &'static str,
        got: String,
    },
    /// The controller's bootstrap response had fewer lines than required.
    #[error("truncated controller bootstrap response ({0} line(s))")]
    TruncatedBootstrap(usize),
    /// A query produced zero or several response lines where one was expected.
    #[error("ambiguous response to {command:?}: {lines:?}")]
    AmbiguousResponse {
        command: String,
        lines: Vec<String>,
    },
    /// A response line did not parse as the expected quantity.
    #[error("malformed response to {command:?}: {response:?}")]
    MalformedResponse { command: String, response: String },
    /// An inbound bus payload did not parse for its topic.
    #[error("invalid payload {payload:?} on topic {topic:?}")]
    InvalidPayload { topic: String, payload: String },
    /// An MQTT request could not be queued on the client.
    #[error("MQTT request failed: {0}")]
    Mqtt(#[from] rumqttc::ClientError),
    /// The broker connection dropped.
    #[error("MQTT connection lost: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
}

impl Error {
    /// Whether the synchronization loop may log this error and keep running.
    ///
    /// Protocol-level anomalies (odd instrument responses, unparseable bus
    /// payloads) are recoverable; bootstrap, serial and broker failures are
    /// not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::AmbiguousResponse { .. }
                | Error::MalformedResponse { .. }
                | Error::InvalidPayload { .. }
        )
    }
}
