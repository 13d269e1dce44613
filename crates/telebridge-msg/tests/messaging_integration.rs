//! ---
//! tb_section: "02-messaging-ipc-data-model"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Envelope schema helpers and protocol codecs."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
use std::time::Duration;

use telebridge_msg::codec::encode_camera;
use telebridge_msg::{
    publish_advisory, publish_telemetry, replay_from_file, AdvisoryEnvelope, Envelope,
    EnvelopeError, InMemoryTransport, Orientation, Pose, Position, TelemetryEnvelope, TopicKind,
    TopicRouter, Transport,
};

fn router() -> TopicRouter {
    TopicRouter::new([
        ("sensor_data", TopicKind::Sensor),
        ("tts", TopicKind::Advisory),
    ])
    .expect("router")
}

#[test]
fn reference_sensor_envelope_routes_to_telemetry() {
    let payload = format!(
        r#"{{"timestamp":1700000000123,"pose":{{"position":{{"x":1.0,"y":2.0,"z":3.0}},"orientation":{{"x":0,"y":0,"z":0,"w":1}}}},"camera":"{}"}}"#,
        encode_camera(b"\xff\xd8\xff\xe0")
    );
    let envelope = router()
        .route("sensor_data", payload.as_bytes())
        .expect("decode");
    let telemetry = match envelope {
        Envelope::Telemetry(telemetry) => telemetry,
        other => panic!("expected telemetry, got {other:?}"),
    };
    assert_eq!(telemetry.timestamp_ms(), 1_700_000_000_123);
    assert_eq!(telemetry.pose().position, Position::new(1.0, 2.0, 3.0));
    assert_eq!(telemetry.pose().orientation, Orientation::IDENTITY);
    assert_eq!(telemetry.camera(), Some(&b"\xff\xd8\xff\xe0"[..]));
}

#[test]
fn end_to_end_exchange_over_in_memory_transport() {
    let mut publisher = InMemoryTransport::new();
    let mut subscriber = publisher.clone();
    let pose = Pose::new(Position::new(0.5, -0.25, 9.0), Orientation::IDENTITY);
    let telemetry = TelemetryEnvelope::new(1_700_000_000_000, pose)
        .expect("envelope")
        .with_camera(vec![1, 2, 3]);

    publish_telemetry(&mut publisher, "sensor_data", &telemetry).expect("publish telemetry");
    publish_advisory(&mut publisher, "tts", &AdvisoryEnvelope::new("hello")).expect("publish");
    publisher.push("sensor_data_raw", "{}").expect("push");

    let router = router();
    let mut decoded = Vec::new();
    while let Some(raw) = subscriber.recv(Duration::from_millis(10)).expect("recv") {
        decoded.push(router.route(&raw.topic, &raw.payload));
    }

    assert_eq!(decoded.len(), 3);
    assert_eq!(decoded[0], Ok(Envelope::Telemetry(telemetry)));
    assert_eq!(
        decoded[1],
        Ok(Envelope::Advisory(AdvisoryEnvelope::new("hello")))
    );
    assert_eq!(
        decoded[2],
        Err(EnvelopeError::UnexpectedTopic("sensor_data_raw".into()))
    );
}

#[test]
fn replay_from_file_publishes_all_records() {
    let mut publisher = InMemoryTransport::new();
    let mut subscriber = publisher.clone();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.ndjson");
    std::fs::write(
        &path,
        concat!(
            r#"{"topic":"sensor_data","payload":{"timestamp":1,"pose":{"position":{"x":0,"y":0,"z":0},"orientation":{"x":0,"y":0,"z":0,"w":1}},"camera":""}}"#,
            "\n",
            r#"{"topic":"tts","payload":"battery low","delay_ms":2}"#,
            "\n",
        ),
    )
    .expect("write replay file");

    assert_eq!(replay_from_file(&mut publisher, &path).expect("replay"), 2);

    let router = router();
    let first = subscriber.recv(Duration::from_millis(10)).unwrap().unwrap();
    match router.route(&first.topic, &first.payload).unwrap() {
        Envelope::Telemetry(telemetry) => assert!(telemetry.camera().is_none()),
        other => panic!("unexpected envelope {other:?}"),
    }
    let second = subscriber.recv(Duration::from_millis(10)).unwrap().unwrap();
    assert_eq!(
        router.route(&second.topic, &second.payload).unwrap(),
        Envelope::Advisory(AdvisoryEnvelope::new("battery low"))
    );
}
