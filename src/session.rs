//! Session state, commands, and the per-tick frame pipeline.
//!
//! Every UI control maps to one [`Command`] applied through
//! [`Session::apply`], and the timer callback is [`Session::tick`]. Both run
//! on the same thread: commands mutate state between ticks, ticks read it, so
//! no locking is needed anywhere in the session.
//!
//! A tick runs to completion: read one frame, optionally detect and draw,
//! optionally invert, optionally record, then hand the frame back to the
//! shell together with the instantaneous FPS and the detection count. The
//! shell re-arms the timer unless the session stopped.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::capture::{CameraConfig, CameraSource};
use crate::config::AppConfig;
use crate::detect::{self, DetectorBackend, LabelMap, ModelSpec};
use crate::frame::Frame;
use crate::overlay::Overlay;
use crate::record::{Recorder, SinkSettings};
use crate::AppError;

pub const MIN_CONFIDENCE: f32 = 0.1;
pub const MAX_CONFIDENCE: f32 = 1.0;
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Delay before the shell re-arms the next tick.
pub const TICK_DELAY: Duration = Duration::from_millis(10);

/// One discrete UI intent. Widget callbacks build these and nothing else.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Open the camera at the index typed into the UI field.
    StartCamera { index: String },
    StopCamera,
    ToggleDetection,
    ToggleNightMode,
    /// Clamped into `[MIN_CONFIDENCE, MAX_CONFIDENCE]`.
    SetConfidence(f32),
    TakeScreenshot { path: PathBuf },
    StartRecording { path: PathBuf },
    StopRecording,
}

/// User-visible outcome of a command.
#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    CameraStarted { device: String },
    CameraStopped,
    DetectionToggled { enabled: bool },
    NightModeToggled { enabled: bool },
    ScreenshotSaved { path: PathBuf },
    RecordingStarted { path: PathBuf },
    RecordingStopped { seconds: u64 },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::CameraStarted { device } => write!(f, "Camera started on {}.", device),
            Notice::CameraStopped => write!(f, "Camera stopped."),
            Notice::DetectionToggled { enabled: true } => write!(f, "Detection enabled."),
            Notice::DetectionToggled { enabled: false } => write!(f, "Detection disabled."),
            Notice::NightModeToggled { enabled: true } => write!(f, "Night mode on."),
            Notice::NightModeToggled { enabled: false } => write!(f, "Night mode off."),
            Notice::ScreenshotSaved { path } => {
                write!(f, "Screenshot saved as {}.", path.display())
            }
            Notice::RecordingStarted { path } => {
                write!(f, "Recording to {}.", path.display())
            }
            Notice::RecordingStopped { seconds } => {
                write!(f, "Video recorded successfully for {} seconds.", seconds)
            }
        }
    }
}

/// Snapshot of the session flags, taken with [`Session::state`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionState {
    pub running: bool,
    pub recording: bool,
    pub detection_enabled: bool,
    pub night_mode: bool,
    pub confidence_threshold: f32,
}

/// Result of one tick, handed to the shell for display.
#[derive(Clone, Debug)]
pub struct TickReport {
    pub frame: Frame,
    /// Reciprocal of this tick's wall-clock duration.
    pub fps: f32,
    pub objects_detected: usize,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("camera", &self.camera)
            .field("detection_enabled", &self.detection_enabled)
            .field("night_mode", &self.night_mode)
            .field("confidence_threshold", &self.confidence_threshold)
            .finish_non_exhaustive()
    }
}

pub struct Session {
    camera: CameraConfig,
    source: Option<CameraSource>,
    detector: Box<dyn DetectorBackend>,
    labels: LabelMap,
    overlay: Overlay,
    recorder: Recorder,
    detection_enabled: bool,
    night_mode: bool,
    confidence_threshold: f32,
}

impl Session {
    /// Load every startup asset and build the configured detector backend.
    ///
    /// Any absent or unreadable asset fails with [`AppError::MissingAsset`]
    /// before the shell opens a window; nothing here is recoverable at
    /// runtime.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let labels = LabelMap::load(&config.assets.labels_path())?;
        let spec = ModelSpec::load(&config.assets.model_params_path())?;

        let weights = config.assets.weights_path();
        require_file(&weights)?;
        validate_sample_image(&config.assets.sample_image_path())?;
        let overlay = Overlay::load(&config.assets.font_path())?;

        let mut detector = detect::build_backend(&config.detector.backend, &weights, &spec)?;
        detector.warm_up().context("detector warm-up failed")?;
        log::info!(
            "loaded {} labels, detector backend '{}'",
            labels.len(),
            detector.name()
        );

        let camera = CameraConfig {
            device: config.camera.device_prefix.clone(),
            width: config.camera.width,
            height: config.camera.height,
            target_fps: config.camera.target_fps,
        };
        let mut session = Self::with_components(camera, detector, labels, overlay);
        session.recorder = Recorder::new(config.recording);
        Ok(session)
    }

    /// Assemble a session from parts. The `camera.device` field is the device
    /// prefix; [`Command::StartCamera`] completes it with the index.
    pub fn with_components(
        camera: CameraConfig,
        detector: Box<dyn DetectorBackend>,
        labels: LabelMap,
        overlay: Overlay,
    ) -> Self {
        Self {
            camera,
            source: None,
            detector,
            labels,
            overlay,
            recorder: Recorder::new(SinkSettings::default()),
            detection_enabled: true,
            night_mode: false,
            confidence_threshold: DEFAULT_CONFIDENCE,
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState {
            running: self.source.is_some(),
            recording: self.recorder.is_active(),
            detection_enabled: self.detection_enabled,
            night_mode: self.night_mode,
            confidence_threshold: self.confidence_threshold,
        }
    }

    /// Elapsed time of the active recording, for the shell's timer label.
    pub fn recording_elapsed(&self) -> Option<Duration> {
        self.recorder.elapsed()
    }

    /// Apply one command to the session.
    pub fn apply(&mut self, command: Command) -> Result<Option<Notice>> {
        match command {
            Command::StartCamera { index } => self.start_camera(&index),
            Command::StopCamera => Ok(self.stop_camera()),
            Command::ToggleDetection => {
                self.detection_enabled = !self.detection_enabled;
                Ok(Some(Notice::DetectionToggled {
                    enabled: self.detection_enabled,
                }))
            }
            Command::ToggleNightMode => {
                self.night_mode = !self.night_mode;
                Ok(Some(Notice::NightModeToggled {
                    enabled: self.night_mode,
                }))
            }
            Command::SetConfidence(value) => {
                self.confidence_threshold = value.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE);
                Ok(None)
            }
            Command::TakeScreenshot { path } => self.take_screenshot(&path),
            Command::StartRecording { path } => self.start_recording(&path),
            Command::StopRecording => {
                Ok(self.recorder.stop()?.map(|elapsed| Notice::RecordingStopped {
                    seconds: elapsed.as_secs(),
                }))
            }
        }
    }

    /// Run one tick of the pipeline.
    ///
    /// A read failure stops the session (device released, recording
    /// finalized) and surfaces [`AppError::ReadFailure`]; a detector failure
    /// only costs this tick's overlays.
    pub fn tick(&mut self) -> Result<TickReport> {
        let started = Instant::now();
        let Some(source) = self.source.as_mut() else {
            return Err(anyhow!("tick called without a running camera"));
        };

        let mut frame = match source.read() {
            Ok(frame) => frame,
            Err(err) => {
                self.stop_camera();
                return Err(err);
            }
        };

        let mut objects_detected = 0;
        if self.detection_enabled {
            match self.detector.detect(&frame, self.confidence_threshold) {
                Ok(detections) => {
                    objects_detected = detections.len();
                    self.overlay.draw(&mut frame, &detections, &self.labels);
                }
                Err(err) => {
                    log::warn!("detector '{}' failed: {err:#}", self.detector.name());
                }
            }
        }

        if self.night_mode {
            frame.invert();
        }

        if self.recorder.is_active() {
            if let Err(err) = self.recorder.write(&frame) {
                log::warn!("recording write failed, closing sink: {err:#}");
                let _ = self.recorder.stop();
            }
        }

        let elapsed = started.elapsed().as_secs_f32();
        let fps = if elapsed > 0.0 { 1.0 / elapsed } else { 0.0 };

        Ok(TickReport {
            frame,
            fps,
            objects_detected,
        })
    }

    fn start_camera(&mut self, index_text: &str) -> Result<Option<Notice>> {
        if self.source.is_some() {
            return Ok(None);
        }

        let index: u32 = index_text
            .trim()
            .parse()
            .map_err(|_| AppError::InvalidInput {
                field: "camera index",
                value: index_text.to_string(),
            })?;

        let device = if self.camera.device.starts_with("stub://") {
            self.camera.device.clone()
        } else {
            format!("{}{}", self.camera.device, index)
        };
        let source = CameraSource::open(CameraConfig {
            device: device.clone(),
            ..self.camera.clone()
        })?;
        self.source = Some(source);
        Ok(Some(Notice::CameraStarted { device }))
    }

    fn stop_camera(&mut self) -> Option<Notice> {
        if let Some(mut source) = self.source.take() {
            source.close();
        }
        if self.recorder.is_active() {
            match self.recorder.stop() {
                Ok(Some(elapsed)) => {
                    log::info!("recording finalized after {}s", elapsed.as_secs())
                }
                Ok(None) => {}
                Err(err) => log::warn!("failed to finalize recording: {err:#}"),
            }
        }
        Some(Notice::CameraStopped)
    }

    /// Save one fresh raw camera frame (no overlays, no inversion) as PNG.
    /// No-op while the camera is stopped.
    fn take_screenshot(&mut self, path: &Path) -> Result<Option<Notice>> {
        let Some(source) = self.source.as_mut() else {
            return Ok(None);
        };
        let frame = source.read().context("screenshot capture failed")?;
        frame.save_png(path)?;
        Ok(Some(Notice::ScreenshotSaved {
            path: path.to_path_buf(),
        }))
    }

    fn start_recording(&mut self, path: &Path) -> Result<Option<Notice>> {
        if self.source.is_none() {
            return Ok(None);
        }
        if self.recorder.is_active() {
            return Ok(None);
        }
        self.recorder.start(path)?;
        Ok(Some(Notice::RecordingStarted {
            path: path.to_path_buf(),
        }))
    }
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(AppError::MissingAsset {
            path: path.to_path_buf(),
        }
        .into())
    }
}

/// The sample image asset is never used after startup; decoding it once
/// validates that the asset set is complete and readable.
fn validate_sample_image(path: &Path) -> Result<()> {
    image::open(path).map_err(|_| AppError::MissingAsset {
        path: path.to_path_buf(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Detection, StubBackend};

    fn solid_session(detector: StubBackend) -> Session {
        let camera = CameraConfig {
            device: "stub://solid".to_string(),
            width: 64,
            height: 48,
            target_fps: 20,
        };
        Session::with_components(
            camera,
            Box::new(detector),
            LabelMap::from_names(vec!["person", "car"]),
            Overlay::without_font(),
        )
    }

    fn person() -> Detection {
        Detection {
            class_id: 1,
            confidence: 0.9,
            bbox: BoundingBox {
                x: 8,
                y: 8,
                width: 20,
                height: 16,
            },
        }
    }

    #[test]
    fn confidence_is_clamped_into_range() {
        let mut session = solid_session(StubBackend::new());
        session.apply(Command::SetConfidence(0.01)).unwrap();
        assert_eq!(session.state().confidence_threshold, MIN_CONFIDENCE);
        session.apply(Command::SetConfidence(2.0)).unwrap();
        assert_eq!(session.state().confidence_threshold, MAX_CONFIDENCE);
    }

    #[test]
    fn start_is_a_no_op_while_running() {
        let mut session = solid_session(StubBackend::new());
        let first = session
            .apply(Command::StartCamera {
                index: "0".to_string(),
            })
            .unwrap();
        assert!(matches!(first, Some(Notice::CameraStarted { .. })));
        let second = session
            .apply(Command::StartCamera {
                index: "0".to_string(),
            })
            .unwrap();
        assert!(second.is_none());
        assert!(session.state().running);
    }

    #[test]
    fn tick_without_camera_is_an_error() {
        let mut session = solid_session(StubBackend::new());
        assert!(session.tick().is_err());
    }

    #[test]
    fn detector_results_drive_the_object_count() {
        let mut session = solid_session(StubBackend::scripted(vec![
            vec![person()],
            vec![person(), person()],
        ]));
        session
            .apply(Command::StartCamera {
                index: "0".to_string(),
            })
            .unwrap();
        assert_eq!(session.tick().unwrap().objects_detected, 1);
        assert_eq!(session.tick().unwrap().objects_detected, 2);
        assert_eq!(session.tick().unwrap().objects_detected, 0);
    }
}
