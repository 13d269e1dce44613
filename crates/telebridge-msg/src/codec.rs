//! ---
//! tb_section: "02-messaging-ipc-data-model"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Envelope schema helpers and protocol codecs."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
//! Wire codec for sensor, pose, and advisory payloads.
//!
//! Sensor payloads are UTF-8 JSON objects:
//!
//! ```text
//! { "timestamp": <int ms-epoch>,
//!   "pose": { "position":    {"x": f, "y": f, "z": f},
//!             "orientation": {"x": f, "y": f, "z": f, "w": f} },
//!   "camera": "<base64 JPEG or empty>" }
//! ```
//!
//! Pose payloads are the inner `pose` object on its own. Advisory payloads are
//! raw UTF-8 text and never go through JSON.
//!
//! Floats are parsed with `serde_json`'s `float_roundtrip` feature, so every
//! value survives an encode/decode cycle bit for bit.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::router::TopicKind;
use crate::types::{AdvisoryEnvelope, Envelope, Orientation, Pose, Position, TelemetryEnvelope};
use crate::EnvelopeError;

type CodecResult<T> = std::result::Result<T, EnvelopeError>;

#[derive(Deserialize)]
struct WirePosition {
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
}

#[derive(Deserialize)]
struct WireOrientation {
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    w: Option<f64>,
}

#[derive(Deserialize)]
struct WirePose {
    position: Option<WirePosition>,
    orientation: Option<WireOrientation>,
}

#[derive(Deserialize)]
struct WireTelemetry {
    timestamp: Option<i64>,
    pose: Option<WirePose>,
    camera: Option<String>,
}

#[derive(Serialize)]
struct OutboundTelemetry<'a> {
    timestamp: i64,
    pose: &'a Pose,
    camera: String,
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}.{name}")
    }
}

fn field<T>(value: Option<T>, prefix: &str, name: &str) -> CodecResult<T> {
    value.ok_or_else(|| EnvelopeError::MissingField(join(prefix, name)))
}

impl WirePosition {
    fn resolve(self, prefix: &str) -> CodecResult<Position> {
        Ok(Position::new(
            field(self.x, prefix, "x")?,
            field(self.y, prefix, "y")?,
            field(self.z, prefix, "z")?,
        ))
    }
}

impl WireOrientation {
    fn resolve(self, prefix: &str) -> CodecResult<Orientation> {
        Ok(Orientation::new(
            field(self.x, prefix, "x")?,
            field(self.y, prefix, "y")?,
            field(self.z, prefix, "z")?,
            field(self.w, prefix, "w")?,
        ))
    }
}

impl WirePose {
    fn resolve(self, prefix: &str) -> CodecResult<Pose> {
        let position =
            field(self.position, prefix, "position")?.resolve(&join(prefix, "position"))?;
        let orientation = field(self.orientation, prefix, "orientation")?
            .resolve(&join(prefix, "orientation"))?;
        Ok(Pose::new(position, orientation))
    }
}

fn parse<'de, T: Deserialize<'de>>(payload: &'de [u8]) -> CodecResult<T> {
    let mut de = serde_json::Deserializer::from_slice(payload);
    let value = serde_path_to_error::deserialize(&mut de).map_err(|err| {
        let path = err.path().to_string();
        let inner = err.into_inner();
        if path == "." {
            EnvelopeError::MalformedPayload(inner.to_string())
        } else {
            EnvelopeError::MalformedPayload(format!("{inner} (at `{path}`)"))
        }
    })?;
    de.end()
        .map_err(|err| EnvelopeError::MalformedPayload(err.to_string()))?;
    Ok(value)
}

/// Decode a payload according to the handler kind its topic is registered for.
pub fn decode(kind: TopicKind, payload: &[u8]) -> CodecResult<Envelope> {
    match kind {
        TopicKind::Sensor => decode_telemetry(payload).map(Envelope::Telemetry),
        TopicKind::Pose => decode_pose(payload).map(Envelope::Pose),
        TopicKind::Advisory => decode_advisory(payload).map(Envelope::Advisory),
    }
}

/// Decode a sensor envelope, validating every required field.
pub fn decode_telemetry(payload: &[u8]) -> CodecResult<TelemetryEnvelope> {
    let wire: WireTelemetry = parse(payload)?;
    let timestamp = field(wire.timestamp, "", "timestamp")?;
    let pose = field(wire.pose, "", "pose")?.resolve("pose")?;
    let envelope = TelemetryEnvelope::new(timestamp, pose)?;

    match wire.camera.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(envelope.with_camera(decode_camera(text)?)),
        _ => Ok(envelope),
    }
}

/// Decode a pose-only envelope.
pub fn decode_pose(payload: &[u8]) -> CodecResult<Pose> {
    let wire: WirePose = parse(payload)?;
    wire.resolve("")
}

/// Decode an advisory. The text is returned exactly as received.
pub fn decode_advisory(payload: &[u8]) -> CodecResult<AdvisoryEnvelope> {
    std::str::from_utf8(payload)
        .map(AdvisoryEnvelope::new)
        .map_err(|err| EnvelopeError::MalformedPayload(format!("advisory is not UTF-8: {err}")))
}

/// Decode the base64 text carried in the `camera` field.
pub fn decode_camera(text: &str) -> CodecResult<Vec<u8>> {
    BASE64
        .decode(text.trim())
        .map_err(|err| EnvelopeError::InvalidEncoding(err.to_string()))
}

/// Base64 text for a binary camera frame.
pub fn encode_camera(frame: &[u8]) -> String {
    BASE64.encode(frame)
}

fn ensure_finite(pose: &Pose) -> CodecResult<()> {
    if pose.is_finite() {
        Ok(())
    } else {
        Err(EnvelopeError::Unrepresentable(
            "pose contains non-finite values".into(),
        ))
    }
}

fn to_json<T: Serialize>(value: &T) -> CodecResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|err| EnvelopeError::Unrepresentable(err.to_string()))
}

/// Encode a sensor envelope. An absent frame is sent as an empty `camera` string.
pub fn encode_telemetry(envelope: &TelemetryEnvelope) -> CodecResult<Vec<u8>> {
    ensure_finite(envelope.pose())?;
    to_json(&OutboundTelemetry {
        timestamp: envelope.timestamp_ms(),
        pose: envelope.pose(),
        camera: envelope.camera().map(encode_camera).unwrap_or_default(),
    })
}

/// Encode a pose-only envelope.
pub fn encode_pose(pose: &Pose) -> CodecResult<Vec<u8>> {
    ensure_finite(pose)?;
    to_json(pose)
}

/// Encode an advisory: the text bytes, no envelope.
pub fn encode_advisory(advisory: &AdvisoryEnvelope) -> Vec<u8> {
    advisory.text().as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sensor_payload(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    fn reference_payload() -> serde_json::Value {
        json!({
            "timestamp": 1_700_000_000_123i64,
            "pose": {
                "position": {"x": 1.0, "y": 2.0, "z": 3.0},
                "orientation": {"x": 0, "y": 0, "z": 0, "w": 1}
            },
            "camera": ""
        })
    }

    fn bits(pose: &Pose) -> [u64; 7] {
        let p = pose.position;
        let o = pose.orientation;
        [p.x, p.y, p.z, o.x, o.y, o.z, o.w].map(f64::to_bits)
    }

    #[test]
    fn pose_roundtrip_is_bit_exact() {
        let awkward = [
            Pose::new(
                Position::new(0.1, -0.0, f64::MIN_POSITIVE),
                Orientation::new(1e308, -1e-308, 5e-324, 0.30000000000000004),
            ),
            Pose::new(
                Position::new(std::f64::consts::PI, -2.5e-7, 123456789.98765433),
                Orientation::new(0.7071067811865476, 0.0, 0.0, 0.7071067811865475),
            ),
        ];

        for pose in awkward {
            let envelope = TelemetryEnvelope::new(1_700_000_000_123, pose).unwrap();
            let decoded = decode_telemetry(&encode_telemetry(&envelope).unwrap()).unwrap();
            assert_eq!(bits(decoded.pose()), bits(&pose));

            let pose_only = decode_pose(&encode_pose(&pose).unwrap()).unwrap();
            assert_eq!(bits(&pose_only), bits(&pose));
        }
    }

    #[test]
    fn integer_coordinates_decode_as_floats() {
        let envelope = decode_telemetry(&sensor_payload(reference_payload())).unwrap();
        assert_eq!(envelope.pose().orientation, Orientation::IDENTITY);
        assert_eq!(envelope.pose().position, Position::new(1.0, 2.0, 3.0));
        assert!(envelope.camera().is_none());
    }

    #[test]
    fn absent_and_null_camera_mean_no_frame() {
        let mut payload = reference_payload();
        payload.as_object_mut().unwrap().remove("camera");
        assert!(decode_telemetry(&sensor_payload(payload.clone()))
            .unwrap()
            .camera()
            .is_none());

        payload["camera"] = serde_json::Value::Null;
        assert!(decode_telemetry(&sensor_payload(payload))
            .unwrap()
            .camera()
            .is_none());
    }

    #[test]
    fn camera_is_base64_decoded() {
        let mut payload = reference_payload();
        payload["camera"] = json!(encode_camera(&[0xFF, 0xD8, 0xFF, 0xD9]));
        let envelope = decode_telemetry(&sensor_payload(payload)).unwrap();
        assert_eq!(envelope.camera(), Some(&[0xFF, 0xD8, 0xFF, 0xD9][..]));
    }

    #[test]
    fn invalid_camera_encoding_is_reported() {
        let mut payload = reference_payload();
        payload["camera"] = json!("not*base64!");
        let err = decode_telemetry(&sensor_payload(payload)).unwrap_err();
        assert!(matches!(err, EnvelopeError::InvalidEncoding(_)));
    }

    #[test]
    fn missing_fields_report_their_path() {
        let cases = [
            ("/timestamp", "timestamp"),
            ("/pose", "pose"),
            ("/pose/position", "pose.position"),
            ("/pose/position/y", "pose.position.y"),
            ("/pose/orientation/w", "pose.orientation.w"),
        ];
        for (pointer, expected) in cases {
            let mut payload = reference_payload();
            let (parent, leaf) = pointer.rsplit_once('/').unwrap();
            let container = if parent.is_empty() {
                &mut payload
            } else {
                payload.pointer_mut(parent).unwrap()
            };
            container.as_object_mut().unwrap().remove(leaf);

            let err = decode_telemetry(&sensor_payload(payload)).unwrap_err();
            assert_eq!(err, EnvelopeError::MissingField(expected.into()));
        }
    }

    #[test]
    fn null_coordinate_counts_as_missing() {
        let mut payload = reference_payload();
        payload["pose"]["position"]["z"] = serde_json::Value::Null;
        let err = decode_telemetry(&sensor_payload(payload)).unwrap_err();
        assert_eq!(err, EnvelopeError::MissingField("pose.position.z".into()));
    }

    #[test]
    fn wrong_types_are_malformed() {
        let mut payload = reference_payload();
        payload["pose"]["position"]["x"] = json!("one");
        let err = decode_telemetry(&sensor_payload(payload)).unwrap_err();
        match err {
            EnvelopeError::MalformedPayload(message) => {
                assert!(message.contains("pose.position.x"), "{message}")
            }
            other => panic!("unexpected error {other:?}"),
        }

        let mut payload = reference_payload();
        payload["timestamp"] = json!(1_700_000_000_123.5);
        assert_eq!(
            decode_telemetry(&sensor_payload(payload)).unwrap_err().kind(),
            "malformed_payload"
        );
    }

    #[test]
    fn timestamps_past_year_9999_are_malformed() {
        let mut payload = reference_payload();
        payload["timestamp"] = json!(crate::MAX_TIMESTAMP_MS);
        let last = decode_telemetry(&sensor_payload(payload)).unwrap();
        assert_eq!(last.timestamp_ms(), crate::MAX_TIMESTAMP_MS);

        let mut payload = reference_payload();
        payload["timestamp"] = json!(crate::MAX_TIMESTAMP_MS + 1);
        assert_eq!(
            decode_telemetry(&sensor_payload(payload)).unwrap_err().kind(),
            "malformed_payload"
        );
    }

    #[test]
    fn non_json_and_trailing_garbage_are_malformed() {
        let payloads: [&[u8]; 4] = [b"hello", b"", b"{\"timestamp\": 1} trailing", b"[1,2,3]"];
        for payload in payloads {
            let err = decode_telemetry(payload).unwrap_err();
            assert_eq!(err.kind(), "malformed_payload", "{payload:?}");
        }
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let mut payload = reference_payload();
        payload["battery"] = json!(0.87);
        payload["pose"]["frame_id"] = json!("map");
        assert!(decode_telemetry(&sensor_payload(payload)).is_ok());
    }

    #[test]
    fn pose_only_paths_have_no_prefix() {
        let err = decode_pose(br#"{"position": {"x": 1, "y": 2, "z": 3}}"#).unwrap_err();
        assert_eq!(err, EnvelopeError::MissingField("orientation".into()));
    }

    #[test]
    fn advisory_is_verbatim() {
        let text = "  {not json}\nHello, this is a test message.  ";
        let decoded = decode(TopicKind::Advisory, text.as_bytes()).unwrap();
        assert_eq!(decoded, Envelope::Advisory(AdvisoryEnvelope::new(text)));
        assert_eq!(
            encode_advisory(&AdvisoryEnvelope::new(text)),
            text.as_bytes()
        );
    }

    #[test]
    fn advisory_rejects_invalid_utf8() {
        let err = decode_advisory(&[0xC3, 0x28]).unwrap_err();
        assert_eq!(err.kind(), "malformed_payload");
    }

    #[test]
    fn non_finite_pose_cannot_be_encoded() {
        let pose = Pose::new(Position::new(f64::NAN, 0.0, 0.0), Orientation::IDENTITY);
        assert_eq!(encode_pose(&pose).unwrap_err().kind(), "unrepresentable");
    }
}
