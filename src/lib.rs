//! Spotter - live camera console with pretrained-model detection overlays.
//!
//! Spotter shows a live camera feed, draws bounding boxes from a pretrained
//! object-detection network on top of it, and can save PNG screenshots and
//! MJPEG/AVI recordings of the annotated feed.
//!
//! # Module Structure
//!
//! - `capture`: camera frame sources (synthetic, V4L2 devices)
//! - `detect`: detector backends and the class label map
//! - `overlay`: burns boxes and labels into frames
//! - `record`: recording sessions and the AVI sink
//! - `session`: session state, commands, and the per-tick pipeline
//! - `config`: file/env configuration for the binaries
//!
//! The GUI shell lives in `src/bin/spotter.rs` (feature `gui`). Every control
//! it exposes is a [`session::Command`] applied to the session, so the whole
//! pipeline runs and tests headless.

use std::fmt;
use std::path::PathBuf;

pub mod capture;
pub mod config;
pub mod detect;
pub mod frame;
pub mod overlay;
pub mod record;
pub mod session;

pub use capture::{CameraConfig, CameraSource};
pub use config::AppConfig;
#[cfg(feature = "backend-tract")]
pub use detect::TractBackend;
pub use detect::{BoundingBox, Detection, DetectorBackend, LabelMap, ModelSpec, StubBackend};
pub use frame::Frame;
pub use overlay::Overlay;
pub use record::{Recorder, SinkSettings};
pub use session::{Command, Notice, Session, SessionState, TickReport};

/// Application fault taxonomy.
///
/// Faults travel through `anyhow::Result` with context attached at each
/// boundary. Callers that need to branch on the kind (the GUI shell, tests)
/// recover the entry with [`AppError::classify`].
#[derive(Clone, Debug, PartialEq)]
pub enum AppError {
    /// A required startup asset is absent or unreadable. Fatal: raised before
    /// any window opens, never at runtime.
    MissingAsset { path: PathBuf },
    /// The requested camera device could not be opened. The session does not
    /// start.
    DeviceUnavailable { device: String, reason: String },
    /// A mid-session camera read failed. The session stops and the device is
    /// released.
    ReadFailure { device: String },
    /// The recording output path could not be created. Recording does not
    /// start; the session continues unaffected.
    CannotCreateSink { path: PathBuf, reason: String },
    /// A control field held a value that cannot be parsed.
    InvalidInput { field: &'static str, value: String },
}

impl AppError {
    /// Recover the taxonomy entry from an `anyhow` chain, if one is present.
    pub fn classify(err: &anyhow::Error) -> Option<&AppError> {
        err.downcast_ref::<AppError>()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::MissingAsset { path } => {
                write!(f, "required asset not found: {}", path.display())
            }
            AppError::DeviceUnavailable { device, reason } => {
                write!(f, "camera {} could not be opened: {}", device, reason)
            }
            AppError::ReadFailure { device } => {
                write!(f, "failed to read from camera {}", device)
            }
            AppError::CannotCreateSink { path, reason } => {
                write!(
                    f,
                    "cannot create recording output {}: {}",
                    path.display(),
                    reason
                )
            }
            AppError::InvalidInput { field, value } => {
                write!(f, "{} is not a valid value for {}", value, field)
            }
        }
    }
}

impl std::error::Error for AppError {}
