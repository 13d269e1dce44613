//! ---
//! tb_section: "03-persistence-logging"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Frame reconstruction and storage bindings."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
//! Camera frame reconstruction and JPEG persistence.
#![warn(missing_docs)]

use std::fmt;
use std::path::PathBuf;

/// Result alias used throughout the frames crate.
pub type Result<T> = std::result::Result<T, FrameError>;

/// Decoding stage that rejected a camera blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    /// The blob was not valid base64 text.
    Base64,
    /// The decoded bytes were not a supported compressed image.
    Image,
}

impl fmt::Display for DecodeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeStage::Base64 => f.write_str("base64"),
            DecodeStage::Image => f.write_str("image"),
        }
    }
}

/// Error type for the frames subsystem.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The blob could not be turned into a raster image.
    #[error("frame decode failed at {stage} stage: {message}")]
    Decode {
        /// Stage that failed.
        stage: DecodeStage,
        /// Decoder message.
        message: String,
    },
    /// The frame could not be written to disk.
    #[error("failed to persist frame to {}: {message}", path.display())]
    Persistence {
        /// Target path of the failed write.
        path: PathBuf,
        /// IO or encoder message.
        message: String,
    },
}

impl FrameError {
    /// Stable label used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            FrameError::Decode { .. } => "frame_decode",
            FrameError::Persistence { .. } => "persistence",
        }
    }

    /// Failed decode stage, if this is a decode error.
    pub fn stage(&self) -> Option<DecodeStage> {
        match self {
            FrameError::Decode { stage, .. } => Some(*stage),
            FrameError::Persistence { .. } => None,
        }
    }

    pub(crate) fn decode(stage: DecodeStage, err: impl fmt::Display) -> Self {
        FrameError::Decode {
            stage,
            message: err.to_string(),
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, err: impl fmt::Display) -> Self {
        FrameError::Persistence {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

pub mod reconstruct;
pub mod store;

pub use reconstruct::{
    frame_filename, reconstruct, reconstruct_decoded, FrameReconstructor, ReconstructedFrame,
};
pub use store::{FrameStore, DEFAULT_JPEG_QUALITY};
