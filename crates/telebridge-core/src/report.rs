//! ---
//! tb_section: "01-core-functionality"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Telemetry sink loop and lifecycle management."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
//! Human-readable per-envelope records.

use std::io::{self, Write};
use std::path::Path;

use telebridge_msg::{AdvisoryEnvelope, Pose, TelemetryEnvelope};

fn write_pose<W: Write + ?Sized>(out: &mut W, pose: &Pose) -> io::Result<()> {
    let p = pose.position;
    let o = pose.orientation;
    writeln!(out, "Position: x={:.3}, y={:.3}, z={:.3}", p.x, p.y, p.z)?;
    writeln!(
        out,
        "Orientation: x={:.3}, y={:.3}, z={:.3}, w={:.3}",
        o.x, o.y, o.z, o.w
    )
}

/// Timestamp, pose, and the saved frame path when one was written.
pub fn write_telemetry<W: Write + ?Sized>(
    out: &mut W,
    envelope: &TelemetryEnvelope,
    saved: Option<&Path>,
) -> io::Result<()> {
    writeln!(
        out,
        "Timestamp: {} ({})",
        envelope.timestamp_ms(),
        envelope.timestamp().format("%Y-%m-%dT%H:%M:%S%.3fZ")
    )?;
    write_pose(out, envelope.pose())?;
    if let Some(path) = saved {
        writeln!(out, "Saved image: {}", path.display())?;
    }
    writeln!(out)?;
    out.flush()
}

/// Pose-only record.
pub fn write_pose_record<W: Write + ?Sized>(out: &mut W, pose: &Pose) -> io::Result<()> {
    write_pose(out, pose)?;
    writeln!(out)?;
    out.flush()
}

/// Advisory text, exactly as received.
pub fn write_advisory<W: Write + ?Sized>(out: &mut W, advisory: &AdvisoryEnvelope) -> io::Result<()> {
    writeln!(out, "Advisory: {}", advisory.text())?;
    out.flush()
}
