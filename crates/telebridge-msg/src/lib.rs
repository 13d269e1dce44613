//! ---
//! tb_section: "02-messaging-ipc-data-model"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Envelope schema helpers and protocol codecs."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
//! Envelope schema, codec, topic routing, and pub/sub transports.
#![warn(missing_docs)]

pub mod codec;
pub mod logging;
pub mod replay;
pub mod router;
pub mod transport;
pub mod types;
#[cfg(feature = "zmq")]
pub mod zmq_transport;

/// Shared result type for transport operations.
pub type Result<T> = std::result::Result<T, MessagingError>;

/// Decode-time failures for a single envelope. All variants are recoverable:
/// the offending message is dropped and processing continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// Payload is not valid UTF-8/JSON or a field carries the wrong type.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    /// A required field is absent or `null`; carries the dotted field path.
    #[error("missing field `{0}`")]
    MissingField(String),
    /// The `camera` field is present but is not valid base64.
    #[error("invalid camera encoding: {0}")]
    InvalidEncoding(String),
    /// A message arrived on a topic that was never registered.
    #[error("unexpected topic '{0}'")]
    UnexpectedTopic(String),
    /// A value cannot be expressed on the wire (e.g. non-finite floats).
    #[error("unrepresentable value: {0}")]
    Unrepresentable(String),
}

impl EnvelopeError {
    /// Stable label used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            EnvelopeError::MalformedPayload(_) => "malformed_payload",
            EnvelopeError::MissingField(_) => "missing_field",
            EnvelopeError::InvalidEncoding(_) => "invalid_encoding",
            EnvelopeError::UnexpectedTopic(_) => "unexpected_topic",
            EnvelopeError::Unrepresentable(_) => "unrepresentable",
        }
    }
}

/// Transport-level errors.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// The underlying connection is gone; receive loops must stop.
    #[error("transport disconnected: {0}")]
    Disconnected(String),
    /// A message arrived with an unexpected frame layout; only that message is lost.
    #[error("framing error: {0}")]
    Framing(String),
    /// Wrapper for ZeroMQ socket errors.
    #[cfg(feature = "zmq")]
    #[error("zmq error: {0}")]
    Zmq(#[from] zmq::Error),
    /// Wrapper for IO errors (replay files).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON problems in replay records.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// An envelope could not be encoded for publishing.
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
}

impl MessagingError {
    /// Whether a receive loop can keep going after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MessagingError::Framing(_) | MessagingError::Envelope(_))
    }

    /// Stable label used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            MessagingError::Disconnected(_) => "disconnected",
            MessagingError::Framing(_) => "framing",
            #[cfg(feature = "zmq")]
            MessagingError::Zmq(_) => "zmq",
            MessagingError::Io(_) => "io",
            MessagingError::Json(_) => "json",
            MessagingError::Envelope(err) => err.kind(),
        }
    }
}

pub use codec::{decode, encode_advisory, encode_pose, encode_telemetry};
pub use logging::{log_message, BridgeMetrics, MessageDirection};
pub use replay::{publish_advisory, publish_pose, publish_telemetry, replay_from_file};
pub use router::{RouteTableError, TopicKind, TopicRouter};
pub use transport::{InMemoryTransport, Publisher, Transport};
pub use types::{
    AdvisoryEnvelope, Envelope, Orientation, Pose, Position, RawMessage, TelemetryEnvelope,
    MAX_TIMESTAMP_MS,
};
#[cfg(feature = "zmq")]
pub use zmq_transport::{ZmqPublisher, ZmqSubscriber};
