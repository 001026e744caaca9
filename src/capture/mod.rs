//! Camera frame sources.
//!
//! A [`CameraSource`] wraps one camera device and produces RGB [`Frame`]s on
//! demand. It owns the device lifecycle: the device is held exclusively while
//! the source is open, and [`CameraSource::close`] is idempotent so the
//! session can release it unconditionally, including after a read failure.
//!
//! Two backends sit behind the facade, selected by the device string:
//! - `stub://…` paths use the synthetic source (always compiled; tests and
//!   the demo binary run on it). `stub://solid` produces one flat color,
//!   `stub://failing` opens but fails every read, anything else a
//!   deterministic moving pattern.
//! - every other path is a V4L2 device node (feature: `ingest-v4l2`).

#[cfg(feature = "ingest-v4l2")]
mod v4l2;

use anyhow::Result;

use crate::frame::Frame;
use crate::AppError;

/// Configuration for a camera source. `device` is the concrete device string
/// ("/dev/video0", "stub://bench", …).
#[derive(Clone, Debug)]
pub struct CameraConfig {
    pub device: String,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
    /// Target frame rate requested from the device.
    pub target_fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "stub://bench".to_string(),
            width: 640,
            height: 480,
            target_fps: 20,
        }
    }
}

/// Frame counters for the stats line.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub device: String,
}

pub struct CameraSource {
    device: String,
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(v4l2::DeviceCamera),
    Closed,
}

impl CameraSource {
    /// Open the device described by `config`.
    ///
    /// Failure is [`AppError::DeviceUnavailable`]; no partial handle is left
    /// behind.
    pub fn open(config: CameraConfig) -> Result<Self> {
        let device = config.device.clone();
        if device.starts_with("stub://") {
            log::info!("CameraSource: opened {} (synthetic)", device);
            return Ok(Self {
                device,
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            });
        }

        #[cfg(feature = "ingest-v4l2")]
        {
            let backend = v4l2::DeviceCamera::open(config)?;
            log::info!("CameraSource: opened {}", device);
            Ok(Self {
                device,
                backend: CameraBackend::Device(backend),
            })
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            Err(AppError::DeviceUnavailable {
                device,
                reason: "this build has no V4L2 support (enable the ingest-v4l2 feature)"
                    .to_string(),
            }
            .into())
        }
    }

    /// Capture the next frame. May block until the device delivers one.
    ///
    /// Failure is [`AppError::ReadFailure`]; the caller is expected to close
    /// the source afterwards.
    pub fn read(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.read(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(camera) => camera.read(),
            CameraBackend::Closed => Err(AppError::ReadFailure {
                device: self.device.clone(),
            }
            .into()),
        }
    }

    /// Release the device. Safe to call any number of times.
    pub fn close(&mut self) {
        if !matches!(self.backend, CameraBackend::Closed) {
            log::info!("CameraSource: released {}", self.device);
        }
        self.backend = CameraBackend::Closed;
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.backend, CameraBackend::Closed)
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn stats(&self) -> CameraStats {
        let frames_captured = match &self.backend {
            CameraBackend::Synthetic(camera) => camera.frame_count,
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(camera) => camera.frame_count(),
            CameraBackend::Closed => 0,
        };
        CameraStats {
            frames_captured,
            device: self.device.clone(),
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.close();
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://) for tests and the demo
// ----------------------------------------------------------------------------

const SOLID_LEVEL: [u8; 3] = [32, 32, 32];

struct SyntheticCamera {
    config: CameraConfig,
    frame_count: u64,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            frame_count: 0,
        }
    }

    fn read(&mut self) -> Result<Frame> {
        if self.config.device.starts_with("stub://failing") {
            return Err(AppError::ReadFailure {
                device: self.config.device.clone(),
            }
            .into());
        }
        self.frame_count += 1;
        if self.config.device.starts_with("stub://solid") {
            return Ok(Frame::solid(
                self.config.width,
                self.config.height,
                SOLID_LEVEL,
            ));
        }
        Ok(self.moving_pattern())
    }

    /// Deterministic pattern that shifts every frame, so downstream stages see
    /// changing pixel content.
    fn moving_pattern(&self) -> Frame {
        let width = self.config.width;
        let height = self.config.height;
        let mut pixels = vec![0u8; (width as usize) * (height as usize) * 3];
        for (i, value) in pixels.iter_mut().enumerate() {
            *value = ((i as u64 + self.frame_count * 7) % 256) as u8;
        }
        Frame::from_raw(width, height, pixels).expect("synthetic buffer length is exact")
    }
}
