//! ---
//! tb_section: "02-messaging-ipc-data-model"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Envelope schema helpers and protocol codecs."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use telebridge_common::time::from_epoch_millis;

use crate::EnvelopeError;

/// One message as delivered by a transport: a topic label plus an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Topic label the transport filtered on.
    pub topic: String,
    /// Undecoded payload bytes.
    pub payload: Vec<u8>,
}

impl RawMessage {
    /// Construct a raw message from its parts.
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Cartesian position in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Position {
    /// Construct a position.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Orientation quaternion. Values are carried as received; unit norm is not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
    /// Scalar component.
    pub w: f64,
}

impl Orientation {
    /// The identity rotation.
    pub const IDENTITY: Orientation = Orientation::new(0.0, 0.0, 0.0, 1.0);

    /// Construct an orientation quaternion.
    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Euclidean norm of the quaternion.
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }
}

/// Rigid-body pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Translation component.
    pub position: Position,
    /// Rotation component.
    pub orientation: Orientation,
}

impl Pose {
    /// Construct a pose.
    pub const fn new(position: Position, orientation: Orientation) -> Self {
        Self {
            position,
            orientation,
        }
    }

    pub(crate) fn is_finite(&self) -> bool {
        let p = &self.position;
        let o = &self.orientation;
        [p.x, p.y, p.z, o.x, o.y, o.z, o.w]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Latest accepted timestamp, 9999-12-31T23:59:59.999Z.
///
/// Frame names sort chronologically only while the year has four digits.
pub const MAX_TIMESTAMP_MS: i64 = 253_402_300_799_999;

/// Sensor envelope: timestamped pose with an optional camera frame.
///
/// Fields are read-only once constructed; decoding always yields a fresh value.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEnvelope {
    timestamp_ms: i64,
    timestamp: DateTime<Utc>,
    pose: Pose,
    camera: Option<Vec<u8>>,
}

impl TelemetryEnvelope {
    /// Construct an envelope without a camera frame.
    pub fn new(timestamp_ms: i64, pose: Pose) -> Result<Self, EnvelopeError> {
        if timestamp_ms < 0 {
            return Err(EnvelopeError::MalformedPayload(format!(
                "timestamp must be non-negative (got {timestamp_ms})"
            )));
        }
        if timestamp_ms > MAX_TIMESTAMP_MS {
            return Err(EnvelopeError::MalformedPayload(format!(
                "timestamp {timestamp_ms} is past year 9999"
            )));
        }
        let timestamp = from_epoch_millis(timestamp_ms).ok_or_else(|| {
            EnvelopeError::MalformedPayload(format!("timestamp {timestamp_ms} is out of range"))
        })?;
        Ok(Self {
            timestamp_ms,
            timestamp,
            pose,
            camera: None,
        })
    }

    /// Attach decoded camera bytes. Empty input means "no frame".
    pub fn with_camera(mut self, frame: Vec<u8>) -> Self {
        self.camera = if frame.is_empty() { None } else { Some(frame) };
        self
    }

    /// Milliseconds since the Unix epoch as carried on the wire.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    /// Calendar timestamp (UTC).
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Pose carried by the envelope.
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Decoded (binary) camera frame, if this tick carried one.
    pub fn camera(&self) -> Option<&[u8]> {
        self.camera.as_deref()
    }
}

/// Plain-text advisory. The payload is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisoryEnvelope {
    text: String,
}

impl AdvisoryEnvelope {
    /// Wrap advisory text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Advisory content.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A decoded envelope of any supported kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Pose with optional camera frame.
    Telemetry(TelemetryEnvelope),
    /// Pose only.
    Pose(Pose),
    /// Plain-text advisory.
    Advisory(AdvisoryEnvelope),
}

impl Envelope {
    /// Convenience accessor returning the envelope kind as a static string.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Telemetry(_) => "telemetry",
            Envelope::Pose(_) => "pose",
            Envelope::Advisory(_) => "advisory",
        }
    }
}
