//! ---
//! tb_section: "01-core-functionality"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Telemetry sink loop and lifecycle management."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
use telebridge_common::config::SESSION_SUFFIX;
use uuid::Uuid;

/// Turn the configured `filename_suffix` into the suffix used for this process.
///
/// `"session"` becomes the first 8 hex digits of a fresh UUIDv4, any other
/// value is used as is, and an empty value means no suffix.
pub fn resolve_filename_suffix(configured: Option<&str>) -> Option<String> {
    match configured.map(str::trim) {
        None | Some("") => None,
        Some(SESSION_SUFFIX) => {
            let id = Uuid::new_v4().simple().to_string();
            Some(id[..8].to_owned())
        }
        Some(fixed) => Some(fixed.to_owned()),
    }
}
