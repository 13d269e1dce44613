//! ---
//! tb_section: "05-networking-external-interfaces"
//! tb_subsection: "binary"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Producer CLI publishing telemetry and advisories."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use telebridge_common::config::{ADVISORY_TOPIC, POSE_TOPIC, SENSOR_TOPIC};
use telebridge_common::logging;
use telebridge_common::time::now_millis;
use telebridge_msg::{
    publish_advisory, publish_pose, publish_telemetry, replay_from_file, AdvisoryEnvelope,
    Orientation, Pose, Position, TelemetryEnvelope, ZmqPublisher,
};
use tracing::info;

const DEFAULT_SENSOR_BIND: &str = "tcp://*:5556";
const DEFAULT_ADVISORY_BIND: &str = "tcp://*:5557";

#[derive(Debug, Parser)]
#[command(author, version, about = "telebridge producer utility", long_about = None)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "ENDPOINT",
        help = "Endpoint to bind the publisher to"
    )]
    bind: Option<String>,

    #[arg(long, global = true, value_name = "TOPIC", help = "Override the topic label")]
    topic: Option<String>,

    #[arg(
        long,
        global = true,
        default_value_t = 500,
        value_name = "MS",
        help = "Wait after binding so subscribers can join"
    )]
    settle_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct PoseArgs {
    #[arg(long, value_parser = parse_position, default_value = "0,0,0", help = "x,y,z in metres")]
    position: Position,
    #[arg(long, value_parser = parse_orientation, default_value = "0,0,0,1", help = "x,y,z,w quaternion")]
    orientation: Orientation,
}

impl PoseArgs {
    fn pose(&self) -> Pose {
        Pose::new(self.position, self.orientation)
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Publish text advisories")]
    Advisory {
        #[arg(long, help = "Advisory text, sent verbatim")]
        text: String,
        #[arg(long, default_value_t = 1, help = "Number of times to send")]
        repeat: u32,
        #[arg(long, default_value_t = 5000, help = "Delay between repeats")]
        interval_ms: u64,
    },
    #[command(about = "Publish one sensor envelope, optionally with a camera frame")]
    Sensor {
        #[arg(long, value_name = "FILE", help = "JPEG or PNG file to attach")]
        image: Option<PathBuf>,
        #[command(flatten)]
        pose: PoseArgs,
    },
    #[command(about = "Publish one pose-only envelope")]
    Pose {
        #[command(flatten)]
        pose: PoseArgs,
    },
    #[command(about = "Replay a newline-delimited JSON capture; each record names its own topic")]
    Replay {
        #[arg(long, value_name = "FILE")]
        file: PathBuf,
    },
}

fn parse_floats<const N: usize>(raw: &str) -> std::result::Result<[f64; N], String> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!("expected {N} comma-separated numbers, got '{raw}'"));
    }
    let mut values = [0.0; N];
    for (slot, part) in values.iter_mut().zip(parts) {
        *slot = part
            .parse::<f64>()
            .map_err(|err| format!("'{part}': {err}"))?;
    }
    Ok(values)
}

fn parse_position(raw: &str) -> std::result::Result<Position, String> {
    let [x, y, z] = parse_floats::<3>(raw)?;
    Ok(Position::new(x, y, z))
}

fn parse_orientation(raw: &str) -> std::result::Result<Orientation, String> {
    let [x, y, z, w] = parse_floats::<4>(raw)?;
    Ok(Orientation::new(x, y, z, w))
}

impl Cli {
    fn validate(&self) -> Result<()> {
        if matches!(self.command, Commands::Replay { .. }) && self.topic.is_some() {
            bail!("--topic does not apply to replay; each record carries its own topic");
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    logging::init_console();
    let cli = Cli::parse();
    cli.validate()?;

    let default_bind = match cli.command {
        Commands::Advisory { .. } => DEFAULT_ADVISORY_BIND,
        _ => DEFAULT_SENSOR_BIND,
    };
    let endpoint = cli.bind.clone().unwrap_or_else(|| default_bind.to_owned());
    let mut publisher = ZmqPublisher::bind(&endpoint)
        .with_context(|| format!("failed to bind publisher to {endpoint}"))?;
    std::thread::sleep(Duration::from_millis(cli.settle_ms));

    let topic = |default: &str| cli.topic.clone().unwrap_or_else(|| default.to_owned());
    match &cli.command {
        Commands::Advisory {
            text,
            repeat,
            interval_ms,
        } => {
            if *repeat == 0 {
                bail!("--repeat must be at least 1");
            }
            let topic = topic(ADVISORY_TOPIC);
            let advisory = AdvisoryEnvelope::new(text.clone());
            for sent in 1..=*repeat {
                publish_advisory(&mut publisher, &topic, &advisory)?;
                info!(topic = %topic, sent, "advisory published");
                if sent < *repeat {
                    std::thread::sleep(Duration::from_millis(*interval_ms));
                }
            }
        }
        Commands::Sensor { image, pose } => {
            let mut envelope = TelemetryEnvelope::new(now_millis(), pose.pose())?;
            if let Some(path) = image {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("unable to read image {}", path.display()))?;
                envelope = envelope.with_camera(bytes);
            }
            let topic = topic(SENSOR_TOPIC);
            publish_telemetry(&mut publisher, &topic, &envelope)?;
            info!(topic = %topic, timestamp_ms = envelope.timestamp_ms(), with_frame = envelope.camera().is_some(), "sensor envelope published");
        }
        Commands::Pose { pose } => {
            let topic = topic(POSE_TOPIC);
            publish_pose(&mut publisher, &topic, &pose.pose())?;
            info!(topic = %topic, "pose published");
        }
        Commands::Replay { file } => {
            let count = replay_from_file(&mut publisher, file)
                .with_context(|| format!("replay of {} failed", file.display()))?;
            info!(count, "replay complete");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_coordinate_lists() {
        assert_eq!(
            parse_position("1, 2.5,-3").unwrap(),
            Position::new(1.0, 2.5, -3.0)
        );
        assert_eq!(parse_orientation("0,0,0,1").unwrap(), Orientation::IDENTITY);
        assert!(parse_position("1,2").is_err());
        assert!(parse_orientation("0,0,zero,1").is_err());
    }

    #[test]
    fn replay_rejects_topic_override() {
        let cli = Cli::try_parse_from([
            "telebridgectl",
            "--topic",
            "camera",
            "replay",
            "--file",
            "capture.ndjson",
        ])
        .unwrap();
        let err = cli.validate().unwrap_err();
        assert!(err.to_string().contains("--topic"));

        let cli =
            Cli::try_parse_from(["telebridgectl", "replay", "--file", "capture.ndjson"]).unwrap();
        assert!(cli.validate().is_ok());

        let cli = Cli::try_parse_from(["telebridgectl", "--topic", "camera", "pose"]).unwrap();
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn cli_accepts_sensor_subcommand() {
        let cli = Cli::try_parse_from([
            "telebridgectl",
            "sensor",
            "--image",
            "frame.jpg",
            "--position",
            "1,2,3",
        ])
        .unwrap();
        match cli.command {
            Commands::Sensor { image, pose } => {
                assert_eq!(image, Some(PathBuf::from("frame.jpg")));
                assert_eq!(pose.orientation, Orientation::IDENTITY);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(cli.settle_ms, 500);
    }
}
