//! ---
//! tb_section: "03-persistence-logging"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Frame reconstruction and storage bindings."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

use crate::reconstruct::ReconstructedFrame;
use crate::{FrameError, Result};

/// JPEG quality used when none is configured.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Writes reconstructed frames as JPEG files under one directory.
#[derive(Debug, Clone)]
pub struct FrameStore {
    directory: PathBuf,
    quality: u8,
}

impl FrameStore {
    /// Store writing into `directory` at the default quality.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Override the JPEG quality (clamped to 1..=100).
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    /// Output directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Configured JPEG quality.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode `frame` as JPEG and write it to `<directory>/<filename>`.
    ///
    /// The directory is created on demand. An existing file with the same
    /// name is overwritten.
    pub fn save(&self, frame: &ReconstructedFrame) -> Result<PathBuf> {
        fs::create_dir_all(&self.directory)
            .map_err(|err| FrameError::persistence(&self.directory, err))?;

        let path = self.directory.join(frame.filename());
        let file = File::create(&path).map_err(|err| FrameError::persistence(&path, err))?;
        let mut writer = BufWriter::new(file);
        JpegEncoder::new_with_quality(&mut writer, self.quality)
            .encode_image(frame.image())
            .map_err(|err| FrameError::persistence(&path, err))?;
        writer
            .flush()
            .map_err(|err| FrameError::persistence(&path, err))?;

        debug!(path = %path.display(), quality = self.quality, "frame persisted");
        Ok(path)
    }
}
