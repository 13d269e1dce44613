//! ---
//! tb_section: "01-core-functionality"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Telemetry sink loop and lifecycle management."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
//! Telemetry sink: the subscriber-side receive, decode, persist and report loop.

pub mod naming;
pub mod report;
pub mod sink;

pub use naming::resolve_filename_suffix;
pub use sink::{spawn_sink, Outcome, SinkStats, TelemetrySink};
