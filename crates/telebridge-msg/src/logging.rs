//! ---
//! tb_section: "02-messaging-ipc-data-model"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Envelope schema helpers and protocol codecs."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
use prometheus::{IntCounter, IntCounterVec, Opts, Registry};
use tracing::debug;

use crate::types::RawMessage;

/// Direction of the message movement, used for consistent logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDirection {
    /// Message published via a transport.
    Outbound,
    /// Message received from a transport.
    Inbound,
}

/// Emit a structured log entry for message activity.
pub fn log_message(direction: MessageDirection, message: &RawMessage) {
    debug!(
        topic = %message.topic,
        bytes = message.payload.len(),
        direction = ?direction,
        "messaging activity"
    );
}

/// Prometheus metric handles for bridge activity.
#[derive(Clone)]
pub struct BridgeMetrics {
    received: IntCounter,
    dropped: IntCounterVec,
    frames_saved: IntCounter,
}

impl BridgeMetrics {
    /// Register bridge metrics with the provided registry.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let received = IntCounter::with_opts(Opts::new(
            "telebridge_messages_received_total",
            "Messages consumed from transports",
        ))?;
        let dropped = IntCounterVec::new(
            Opts::new(
                "telebridge_envelopes_dropped_total",
                "Envelopes discarded because they could not be processed",
            ),
            &["kind"],
        )?;
        let frames_saved = IntCounter::with_opts(Opts::new(
            "telebridge_frames_saved_total",
            "Camera frames persisted to disk",
        ))?;

        registry.register(Box::new(received.clone()))?;
        registry.register(Box::new(dropped.clone()))?;
        registry.register(Box::new(frames_saved.clone()))?;

        Ok(Self {
            received,
            dropped,
            frames_saved,
        })
    }

    /// Record a received message.
    pub fn observe_received(&self) {
        self.received.inc();
    }

    /// Record a dropped envelope under its error kind.
    pub fn observe_dropped(&self, kind: &str) {
        self.dropped.with_label_values(&[kind]).inc();
    }

    /// Record a persisted frame.
    pub fn observe_frame_saved(&self) {
        self.frames_saved.inc();
    }
}
