//! ---
//! tb_section: "15-testing-qa-runbook"
//! tb_subsection: "integration-tests"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "End-to-end tests for the telebridge pipeline."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use telebridge_core::{Outcome, TelemetrySink};
use telebridge_frames::{reconstruct_decoded, FrameStore};
use telebridge_msg::{AdvisoryEnvelope, Envelope, InMemoryTransport, TopicKind, TopicRouter};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn encode(image: RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

fn black_jpeg_base64() -> String {
    BASE64.encode(encode(RgbImage::new(2, 2), ImageFormat::Jpeg))
}

fn envelope(timestamp: i64, camera: Value) -> Vec<u8> {
    let mut value = json!({
        "timestamp": timestamp,
        "pose": {
            "position": {"x": 1.0, "y": 2.0, "z": 3.0},
            "orientation": {"x": 0, "y": 0, "z": 0, "w": 1}
        }
    });
    if !camera.is_null() {
        value["camera"] = camera;
    }
    serde_json::to_vec(&value).unwrap()
}

struct Harness {
    transport: InMemoryTransport,
    sink: TelemetrySink<InMemoryTransport>,
    report: Captured,
    output: PathBuf,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let dir = tempdir().unwrap();
    let output = dir.path().join("captured_images");
    let transport = InMemoryTransport::new();
    let report = Captured::default();
    let router = TopicRouter::new([
        ("sensor_data", TopicKind::Sensor),
        ("tts", TopicKind::Advisory),
    ])
    .unwrap();
    let sink = TelemetrySink::new(transport.clone(), router, FrameStore::new(&output))
        .with_report(Box::new(report.clone()))
        .with_recv_timeout(Duration::from_millis(5));
    Harness {
        transport,
        sink,
        report,
        output,
        _dir: dir,
    }
}

fn files_in(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn reference_envelope_prints_pose_and_writes_one_frame() {
    let mut h = harness();
    h.transport
        .push(
            "sensor_data",
            envelope(1_700_000_000_123, json!(black_jpeg_base64())),
        )
        .unwrap();

    let outcome = h.sink.process_next().unwrap();
    let saved = match outcome {
        Outcome::Telemetry {
            timestamp_ms,
            saved: Some(saved),
            ..
        } => {
            assert_eq!(timestamp_ms, 1_700_000_000_123);
            saved
        }
        other => panic!("unexpected outcome {other:?}"),
    };

    let files = files_in(&h.output);
    assert_eq!(files, vec!["frame_20231114_221320_123000.jpg".to_owned()]);
    assert!(files[0].starts_with("frame_20231114_"));
    assert_eq!(saved, h.output.join(&files[0]));

    let report = h.report.text();
    assert!(report.contains("Position: x=1.000, y=2.000, z=3.000"), "{report}");
    assert!(report.contains("w=1.000"), "{report}");
    assert!(report.contains(&format!("Saved image: {}", saved.display())), "{report}");
}

#[test]
fn advisory_text_is_delivered_unmodified() {
    let mut h = harness();
    h.transport.push("tts", "hello").unwrap();
    h.transport.push("tts", "{\"not\": \"parsed\"}").unwrap();

    assert_eq!(
        h.sink.process_next().unwrap(),
        Outcome::Advisory(AdvisoryEnvelope::new("hello"))
    );
    assert_eq!(
        h.sink.process_next().unwrap(),
        Outcome::Advisory(AdvisoryEnvelope::new("{\"not\": \"parsed\"}"))
    );
    assert!(h.report.text().starts_with("Advisory: hello\n"));
    assert!(files_in(&h.output).is_empty());
}

#[test]
fn envelopes_without_camera_write_nothing() {
    let mut h = harness();
    for camera in [json!(""), json!("   "), Value::Null] {
        h.transport
            .push("sensor_data", envelope(1_700_000_000_123, camera))
            .unwrap();
    }

    for _ in 0..3 {
        match h.sink.process_next().unwrap() {
            Outcome::Telemetry { saved: None, .. } => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert!(files_in(&h.output).is_empty());
    assert_eq!(h.sink.stats().dropped, 0);
    assert!(!h.report.text().contains("Saved image"));
}

#[test]
fn bad_frames_do_not_stop_the_loop() {
    let h = harness();
    let garbage_image = BASE64.encode(b"this is not a jpeg");
    h.transport
        .push("sensor_data", envelope(1_700_000_000_001, json!("@@not-base64@@")))
        .unwrap();
    h.transport
        .push("sensor_data", envelope(1_700_000_000_002, json!(garbage_image)))
        .unwrap();
    h.transport
        .push("sensor_data", envelope(1_700_000_000_003, json!(black_jpeg_base64())))
        .unwrap();
    h.transport.close();

    let err = h.sink.run(&CancellationToken::new()).unwrap_err();
    assert_eq!(err.kind(), "disconnected");
    assert_eq!(
        files_in(&h.output),
        vec!["frame_20231114_221320_003000.jpg".to_owned()]
    );
    assert_eq!(h.report.text().matches("Timestamp:").count(), 1);
}

#[test]
fn frames_are_written_in_arrival_order() {
    let h = harness();
    for ms in [5, 6, 7] {
        h.transport
            .push(
                "sensor_data",
                envelope(1_700_000_000_000 + ms, json!(black_jpeg_base64())),
            )
            .unwrap();
    }
    h.transport.close();

    let err = h.sink.run(&CancellationToken::new()).unwrap_err();
    assert_eq!(err.kind(), "disconnected");
    assert_eq!(
        files_in(&h.output),
        vec![
            "frame_20231114_221320_005000.jpg".to_owned(),
            "frame_20231114_221320_006000.jpg".to_owned(),
            "frame_20231114_221320_007000.jpg".to_owned(),
        ]
    );
}

#[test]
fn interrupt_stops_an_idle_sink_cleanly() {
    let h = harness();
    let token = CancellationToken::new();
    let worker = {
        let token = token.clone();
        let sink = h.sink;
        std::thread::spawn(move || sink.run(&token))
    };
    std::thread::sleep(Duration::from_millis(30));
    token.cancel();

    let stats = worker.join().unwrap().unwrap();
    assert_eq!(stats.received, 0);
    assert!(h.report.text().ends_with("Shutting down...\n"));
}

#[test]
fn lossless_frame_survives_the_wire_byte_for_byte() {
    let original = RgbImage::from_fn(32, 24, |x, y| {
        Rgb([(x * 7) as u8, (y * 10) as u8, ((x + y) * 3) as u8])
    });
    let payload = envelope(
        1_700_000_000_123,
        json!(BASE64.encode(encode(original.clone(), ImageFormat::Png))),
    );

    let router = TopicRouter::new([("sensor_data", TopicKind::Sensor)]).unwrap();
    let telemetry = match router.route("sensor_data", &payload).unwrap() {
        Envelope::Telemetry(telemetry) => telemetry,
        other => panic!("unexpected envelope {other:?}"),
    };
    let frame = reconstruct_decoded(telemetry.camera().unwrap(), telemetry.timestamp()).unwrap();
    assert_eq!(frame.image().as_raw(), original.as_raw());
}

#[test]
fn unwritable_output_reports_records_without_saved_path() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("captured_images");
    fs::write(&blocker, b"not a directory").unwrap();

    let transport = InMemoryTransport::new();
    let report = Captured::default();
    let router = TopicRouter::new([
        ("sensor_data", TopicKind::Sensor),
        ("tts", TopicKind::Advisory),
    ])
    .unwrap();
    let mut sink = TelemetrySink::new(transport.clone(), router, FrameStore::new(&blocker))
        .with_report(Box::new(report.clone()))
        .with_recv_timeout(Duration::from_millis(5));

    transport
        .push("sensor_data", envelope(1_700_000_000_123, json!(black_jpeg_base64())))
        .unwrap();
    transport
        .push("sensor_data", envelope(1_700_000_000_456, json!(black_jpeg_base64())))
        .unwrap();
    transport.push("tts", b"still running".to_vec()).unwrap();

    for expected in [1_700_000_000_123, 1_700_000_000_456] {
        match sink.process_next().unwrap() {
            Outcome::Telemetry {
                timestamp_ms,
                saved: None,
                ..
            } => assert_eq!(timestamp_ms, expected),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert!(matches!(sink.process_next().unwrap(), Outcome::Advisory(_)));

    let stats = sink.stats();
    assert_eq!(stats.telemetry, 2);
    assert_eq!(stats.frames_saved, 0);
    assert_eq!(stats.advisories, 1);
    assert_eq!(stats.dropped, 2);

    let text = report.text();
    assert!(text.contains("Timestamp: 1700000000123"), "{text}");
    assert!(text.contains("Timestamp: 1700000000456"), "{text}");
    assert!(!text.contains("Saved image"), "{text}");
    assert!(text.contains("Advisory: still running"), "{text}");
    assert!(blocker.is_file());
}
