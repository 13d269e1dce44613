//! ---
//! tb_section: "03-persistence-logging"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Frame reconstruction and storage bindings."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use image::RgbImage;

use crate::{DecodeStage, FrameError, Result};

/// File name for a frame captured at `captured_at`.
///
/// `frame_<YYYYMMDD>_<HHMMSS>_<micros>.jpg` in UTC. Every component is fixed
/// width, so lexical order matches chronological order.
pub fn frame_filename(captured_at: DateTime<Utc>, suffix: Option<&str>) -> String {
    let stamp = captured_at.format("%Y%m%d_%H%M%S_%6f");
    match suffix {
        Some(suffix) => format!("frame_{stamp}_{suffix}.jpg"),
        None => format!("frame_{stamp}.jpg"),
    }
}

/// A decoded raster plus the name it will be stored under.
#[derive(Debug, Clone)]
pub struct ReconstructedFrame {
    image: RgbImage,
    captured_at: DateTime<Utc>,
    filename: String,
}

impl ReconstructedFrame {
    /// Decoded 8-bit RGB raster.
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Capture time the name was derived from.
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Generated file name (no directory component).
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

/// Turns camera blobs into named raster frames. Performs no I/O.
#[derive(Debug, Clone, Default)]
pub struct FrameReconstructor {
    suffix: Option<String>,
}

impl FrameReconstructor {
    /// Reconstructor producing plain `frame_<date>_<time>_<us>.jpg` names.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `_<suffix>` to every generated name.
    pub fn with_suffix(suffix: impl Into<String>) -> Self {
        Self {
            suffix: Some(suffix.into()),
        }
    }

    /// Configured name suffix, if any.
    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    /// Base64-decode `blob`, then decode the resulting image bytes.
    pub fn reconstruct(&self, blob: &str, captured_at: DateTime<Utc>) -> Result<ReconstructedFrame> {
        let bytes = BASE64
            .decode(blob.trim())
            .map_err(|err| FrameError::decode(DecodeStage::Base64, err))?;
        self.reconstruct_decoded(&bytes, captured_at)
    }

    /// Decode already binary image bytes (JPEG or PNG, sniffed from content).
    pub fn reconstruct_decoded(
        &self,
        bytes: &[u8],
        captured_at: DateTime<Utc>,
    ) -> Result<ReconstructedFrame> {
        let image = image::load_from_memory(bytes)
            .map_err(|err| FrameError::decode(DecodeStage::Image, err))?
            .to_rgb8();
        Ok(ReconstructedFrame {
            image,
            captured_at,
            filename: frame_filename(captured_at, self.suffix()),
        })
    }
}

/// Reconstruct a frame from base64 text with default naming.
pub fn reconstruct(blob: &str, captured_at: DateTime<Utc>) -> Result<ReconstructedFrame> {
    FrameReconstructor::new().reconstruct(blob, captured_at)
}

/// Reconstruct a frame from binary image bytes with default naming.
pub fn reconstruct_decoded(bytes: &[u8], captured_at: DateTime<Utc>) -> Result<ReconstructedFrame> {
    FrameReconstructor::new().reconstruct_decoded(bytes, captured_at)
}
