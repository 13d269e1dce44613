//! ---
//! tb_section: "01-core-functionality"
//! tb_subsection: "binary"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Binary entrypoint for the telebridge subscriber daemon."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use prometheus::Registry;
use telebridge_common::config::{
    AppConfig, ChannelConfig, ChannelKind, DEFAULT_SENSOR_ENDPOINT, SESSION_SUFFIX,
};
use telebridge_common::logging::init_tracing;
use telebridge_core::{spawn_sink, SinkStats, TelemetrySink};
use telebridge_msg::{BridgeMetrics, MessagingError, ZmqSubscriber};
use tokio::signal;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "configs/telebridge.toml";

#[derive(Debug, Parser)]
#[command(author, version, about = "telebridge subscriber daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Directory for captured frames")]
    output_dir: Option<PathBuf>,

    #[arg(long, value_name = "ENDPOINT", help = "Sensor publisher endpoint")]
    sensor_endpoint: Option<String>,

    #[arg(
        long,
        value_name = "ENDPOINT",
        help = "Also subscribe to text advisories on this endpoint"
    )]
    advisory_endpoint: Option<String>,

    #[arg(long, help = "Also subscribe to pose-only envelopes on the sensor endpoint")]
    pose: bool,

    #[arg(
        long,
        value_name = "SUFFIX",
        num_args = 0..=1,
        default_missing_value = SESSION_SUFFIX,
        help = "Disambiguate frame names; without a value a per-process id is used"
    )]
    session_suffix: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.output_dir {
            config.output.directory = dir.clone();
        }
        if let Some(endpoint) = &self.sensor_endpoint {
            let mut retargeted = false;
            for channel in &mut config.subscriber.channels {
                if matches!(channel.kind, ChannelKind::Sensor | ChannelKind::Pose) {
                    channel.endpoint = endpoint.clone();
                    retargeted = true;
                }
            }
            if !retargeted {
                config
                    .subscriber
                    .upsert_channel(ChannelConfig::sensor(endpoint.clone()));
            }
        }
        if self.pose {
            let endpoint = config
                .subscriber
                .channels
                .iter()
                .find(|channel| channel.kind == ChannelKind::Sensor)
                .map(|channel| channel.endpoint.clone())
                .or_else(|| self.sensor_endpoint.clone())
                .unwrap_or_else(|| DEFAULT_SENSOR_ENDPOINT.to_owned());
            config.subscriber.upsert_channel(ChannelConfig::pose(endpoint));
        }
        if let Some(endpoint) = &self.advisory_endpoint {
            config
                .subscriber
                .upsert_channel(ChannelConfig::advisory(endpoint.clone()));
        }
        if let Some(suffix) = &self.session_suffix {
            config.output.filename_suffix = Some(suffix.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from(DEFAULT_CONFIG_PATH));

    let loaded = AppConfig::load_with_source(&candidates)?;
    let mut config = loaded.config;
    cli.apply(&mut config);
    config.validate().context("invalid configuration")?;
    init_tracing("telebridged", &config.logging)?;
    match &loaded.source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; using defaults"),
    }

    let registry = Registry::new();
    let metrics = BridgeMetrics::register(&registry)?;

    let topics: Vec<&str> = config
        .subscriber
        .channels
        .iter()
        .map(|channel| channel.topic.as_str())
        .collect();
    let subscriber = ZmqSubscriber::connect(&config.subscriber.endpoints(), &topics)
        .context("failed to open subscriber socket")?;
    let sink = TelemetrySink::from_config(subscriber, &config)?.with_metrics(metrics);

    let token = CancellationToken::new();
    let mut handle = spawn_sink(sink, token.clone());

    info!("daemon running; waiting for termination signal");
    tokio::select! {
        finished = &mut handle => return finish(finished, &registry),
        interrupted = signal::ctrl_c() => {
            interrupted.context("failed to listen for ctrl-c")?;
            info!("ctrl-c received; shutting down");
            token.cancel();
        }
    }
    finish(handle.await, &registry)
}

fn finish(
    joined: std::result::Result<std::result::Result<SinkStats, MessagingError>, JoinError>,
    registry: &Registry,
) -> Result<()> {
    let stats = joined
        .context("telemetry sink task failed")?
        .context("telemetry sink stopped")?;
    info!(stats = %serde_json::to_string(&stats)?, "final sink counters");
    for family in registry.gather() {
        let total: f64 = family
            .get_metric()
            .iter()
            .map(|metric| metric.get_counter().get_value())
            .sum();
        info!(metric = family.get_name(), total, "metric summary");
    }
    Ok(())
}
