//! ---
//! tb_section: "02-messaging-ipc-data-model"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Envelope schema helpers and protocol codecs."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::codec;
use crate::logging::{log_message, MessageDirection};
use crate::transport::Publisher;
use crate::types::{AdvisoryEnvelope, Pose, RawMessage, TelemetryEnvelope};
use crate::Result;

fn publish<P: Publisher + ?Sized>(publisher: &mut P, message: RawMessage) -> Result<()> {
    publisher.send(&message)?;
    log_message(MessageDirection::Outbound, &message);
    Ok(())
}

/// Encode and publish a sensor envelope under `topic`.
pub fn publish_telemetry<P: Publisher + ?Sized>(
    publisher: &mut P,
    topic: &str,
    envelope: &TelemetryEnvelope,
) -> Result<()> {
    let payload = codec::encode_telemetry(envelope)?;
    publish(publisher, RawMessage::new(topic, payload))
}

/// Encode and publish a bare pose under `topic`.
pub fn publish_pose<P: Publisher + ?Sized>(publisher: &mut P, topic: &str, pose: &Pose) -> Result<()> {
    let payload = codec::encode_pose(pose)?;
    publish(publisher, RawMessage::new(topic, payload))
}

/// Publish advisory text verbatim under `topic`.
pub fn publish_advisory<P: Publisher + ?Sized>(
    publisher: &mut P,
    topic: &str,
    advisory: &AdvisoryEnvelope,
) -> Result<()> {
    publish(
        publisher,
        RawMessage::new(topic, codec::encode_advisory(advisory)),
    )
}

#[derive(Debug, Deserialize)]
struct ReplayRecord {
    topic: String,
    payload: Value,
    #[serde(default)]
    delay_ms: Option<u64>,
}

impl ReplayRecord {
    // Strings go out as raw bytes so text topics replay verbatim.
    fn into_message(self) -> Result<RawMessage> {
        let payload = match self.payload {
            Value::String(text) => text.into_bytes(),
            other => serde_json::to_vec(&other)?,
        };
        Ok(RawMessage::new(self.topic, payload))
    }
}

/// Replay messages from a newline-delimited JSON file.
///
/// Each line holds an object with `topic`, `payload` and an optional
/// `delay_ms` slept before the message is sent. A string payload is sent as
/// its raw bytes; any other JSON value is serialized compactly.
pub fn replay_from_file<P, F>(publisher: &mut P, path: F) -> Result<usize>
where
    P: Publisher + ?Sized,
    F: AsRef<Path>,
{
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut count = 0usize;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ReplayRecord = serde_json::from_str(&line)?;
        if let Some(delay) = record.delay_ms {
            std::thread::sleep(Duration::from_millis(delay));
        }
        publish(publisher, record.into_message()?)?;
        count += 1;
    }

    Ok(count)
}
