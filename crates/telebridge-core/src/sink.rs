//! ---
//! tb_section: "01-core-functionality"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Telemetry sink loop and lifecycle management."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use telebridge_common::config::AppConfig;
use telebridge_frames::{FrameReconstructor, FrameStore};
use telebridge_msg::{
    AdvisoryEnvelope, BridgeMetrics, Envelope, MessagingError, Pose, TelemetryEnvelope,
    TopicRouter, Transport,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::naming::resolve_filename_suffix;
use crate::report;

const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_millis(250);

/// Result of one receive cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing arrived within the receive timeout.
    Idle,
    /// A sensor envelope was processed.
    Telemetry {
        /// Wire timestamp of the envelope.
        timestamp_ms: i64,
        /// Decoded pose.
        pose: Pose,
        /// Path of the persisted frame, if one was carried and written.
        saved: Option<PathBuf>,
    },
    /// A pose-only envelope was processed.
    Pose(Pose),
    /// An advisory was received.
    Advisory(AdvisoryEnvelope),
    /// The message was discarded; `kind` is the stable error label.
    Dropped {
        /// Error kind that caused the drop.
        kind: &'static str,
    },
}

/// Counters accumulated over the lifetime of a sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SinkStats {
    /// Messages taken off the transport.
    pub received: u64,
    /// Sensor envelopes processed.
    pub telemetry: u64,
    /// Pose-only envelopes processed.
    pub poses: u64,
    /// Advisories processed.
    pub advisories: u64,
    /// Frames written to disk.
    pub frames_saved: u64,
    /// Messages or frames discarded.
    pub dropped: u64,
}

/// Subscriber-side loop: receive, decode, reconstruct, persist, report.
///
/// The sink owns its transport. [`run`](Self::run) consumes the sink, so the
/// connection is released whichever way the loop ends.
pub struct TelemetrySink<T: Transport> {
    transport: T,
    router: TopicRouter,
    reconstructor: FrameReconstructor,
    store: FrameStore,
    report: Box<dyn Write + Send>,
    recv_timeout: Duration,
    metrics: Option<BridgeMetrics>,
    stats: SinkStats,
}

impl<T: Transport> TelemetrySink<T> {
    /// Sink reporting to stdout with default naming and timeout.
    pub fn new(transport: T, router: TopicRouter, store: FrameStore) -> Self {
        Self {
            transport,
            router,
            reconstructor: FrameReconstructor::new(),
            store,
            report: Box::new(io::stdout()),
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            metrics: None,
            stats: SinkStats::default(),
        }
    }

    /// Build a sink from loaded configuration.
    pub fn from_config(transport: T, config: &AppConfig) -> Result<Self> {
        let router = TopicRouter::from_channels(&config.subscriber.channels)
            .context("invalid subscriber channel table")?;
        let store = FrameStore::new(&config.output.directory).with_quality(config.output.jpeg_quality);
        let reconstructor =
            match resolve_filename_suffix(config.output.filename_suffix.as_deref()) {
                Some(suffix) => FrameReconstructor::with_suffix(suffix),
                None => FrameReconstructor::new(),
            };
        Ok(Self::new(transport, router, store)
            .with_reconstructor(reconstructor)
            .with_recv_timeout(config.subscriber.recv_timeout))
    }

    /// Replace the frame reconstructor (e.g. to add a filename suffix).
    pub fn with_reconstructor(mut self, reconstructor: FrameReconstructor) -> Self {
        self.reconstructor = reconstructor;
        self
    }

    /// Send human-readable records somewhere other than stdout.
    pub fn with_report(mut self, report: Box<dyn Write + Send>) -> Self {
        self.report = report;
        self
    }

    /// Bound on each blocking receive; also bounds shutdown latency.
    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Feed Prometheus counters.
    pub fn with_metrics(mut self, metrics: BridgeMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Counters so far.
    pub fn stats(&self) -> SinkStats {
        self.stats
    }

    /// Run one receive cycle to completion.
    ///
    /// Per-message failures are logged and reported as [`Outcome::Dropped`].
    /// Only unrecoverable transport errors are returned.
    pub fn process_next(&mut self) -> std::result::Result<Outcome, MessagingError> {
        let raw = match self.transport.recv(self.recv_timeout) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(Outcome::Idle),
            Err(err) if err.is_recoverable() => {
                warn!(
                    transport = self.transport.name(),
                    kind = err.kind(),
                    error = %err,
                    "dropping undeliverable message"
                );
                return Ok(self.dropped(err.kind()));
            }
            Err(err) => return Err(err),
        };

        self.stats.received += 1;
        if let Some(metrics) = &self.metrics {
            metrics.observe_received();
        }

        let envelope = match self.router.route(&raw.topic, &raw.payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(
                    topic = %raw.topic,
                    bytes = raw.payload.len(),
                    kind = err.kind(),
                    error = %err,
                    "dropping envelope"
                );
                return Ok(self.dropped(err.kind()));
            }
        };

        let outcome = match envelope {
            Envelope::Telemetry(telemetry) => self.handle_telemetry(&raw.topic, telemetry),
            Envelope::Pose(pose) => {
                self.stats.poses += 1;
                self.emit(|out| report::write_pose_record(out, &pose));
                Outcome::Pose(pose)
            }
            Envelope::Advisory(advisory) => {
                self.stats.advisories += 1;
                self.emit(|out| report::write_advisory(out, &advisory));
                Outcome::Advisory(advisory)
            }
        };
        Ok(outcome)
    }

    fn handle_telemetry(&mut self, topic: &str, telemetry: TelemetryEnvelope) -> Outcome {
        let mut saved = None;
        if let Some(bytes) = telemetry.camera() {
            let frame = match self
                .reconstructor
                .reconstruct_decoded(bytes, telemetry.timestamp())
            {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(
                        topic,
                        bytes = bytes.len(),
                        kind = err.kind(),
                        stage = ?err.stage(),
                        error = %err,
                        "dropping envelope with undecodable frame"
                    );
                    return self.dropped(err.kind());
                }
            };
            match self.store.save(&frame) {
                Ok(path) => {
                    self.stats.frames_saved += 1;
                    if let Some(metrics) = &self.metrics {
                        metrics.observe_frame_saved();
                    }
                    saved = Some(path);
                }
                Err(err) => {
                    error!(topic, kind = err.kind(), error = %err, "frame not saved");
                    self.stats.dropped += 1;
                    if let Some(metrics) = &self.metrics {
                        metrics.observe_dropped(err.kind());
                    }
                }
            }
        }

        self.stats.telemetry += 1;
        self.emit(|out| report::write_telemetry(out, &telemetry, saved.as_deref()));
        Outcome::Telemetry {
            timestamp_ms: telemetry.timestamp_ms(),
            pose: *telemetry.pose(),
            saved,
        }
    }

    fn dropped(&mut self, kind: &'static str) -> Outcome {
        self.stats.dropped += 1;
        if let Some(metrics) = &self.metrics {
            metrics.observe_dropped(kind);
        }
        Outcome::Dropped { kind }
    }

    fn emit<F>(&mut self, render: F)
    where
        F: FnOnce(&mut dyn Write) -> io::Result<()>,
    {
        if let Err(err) = render(self.report.as_mut()) {
            warn!(error = %err, "failed to write report record");
        }
    }

    /// Loop until `token` is cancelled or the transport is lost.
    ///
    /// The token is checked between cycles; a message that has started
    /// processing always completes. Returns the final counters.
    pub fn run(mut self, token: &CancellationToken) -> std::result::Result<SinkStats, MessagingError> {
        info!(
            transport = self.transport.name(),
            topics = ?self.router.topics(),
            output = %self.store.directory().display(),
            "telemetry sink started"
        );

        let result = loop {
            if token.is_cancelled() {
                self.emit(|out| {
                    writeln!(out, "Shutting down...")?;
                    out.flush()
                });
                break Ok(());
            }
            if let Err(err) = self.process_next() {
                error!(kind = err.kind(), error = %err, "transport lost, stopping sink");
                break Err(err);
            }
        };

        let stats = self.stats;
        info!(
            received = stats.received,
            frames_saved = stats.frames_saved,
            dropped = stats.dropped,
            "telemetry sink shutting down"
        );
        result.map(|()| stats)
    }
}

/// Run `sink` on the blocking pool until `token` is cancelled.
pub fn spawn_sink<T>(
    sink: TelemetrySink<T>,
    token: CancellationToken,
) -> JoinHandle<std::result::Result<SinkStats, MessagingError>>
where
    T: Transport + 'static,
{
    tokio::task::spawn_blocking(move || sink.run(&token))
}
