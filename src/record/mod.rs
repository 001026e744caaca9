//! Recording sessions.
//!
//! A [`Recorder`] owns at most one open sink at a time. `start` while a sink
//! is active and `stop`/`write` while idle are no-ops, so the session can
//! drive it unconditionally from commands and ticks.

mod avi;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::frame::Frame;

/// Fixed parameters of the recording sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SinkSettings {
    /// Nominal container frame rate.
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            fps: 20,
            width: 640,
            height: 480,
            jpeg_quality: 85,
        }
    }
}

pub struct Recorder {
    settings: SinkSettings,
    active: Option<ActiveRecording>,
}

struct ActiveRecording {
    writer: avi::AviWriter,
    path: PathBuf,
    started: Instant,
}

impl Recorder {
    pub fn new(settings: SinkSettings) -> Self {
        Self {
            settings,
            active: None,
        }
    }

    /// Open a new sink at `path`. A second `start` while one is active is a
    /// no-op; an unusable path fails with
    /// [`crate::AppError::CannotCreateSink`] and leaves the recorder idle.
    pub fn start(&mut self, path: &Path) -> Result<()> {
        if let Some(active) = &self.active {
            log::warn!(
                "recording already active at {}, ignoring start",
                active.path.display()
            );
            return Ok(());
        }
        let writer = avi::AviWriter::create(
            path,
            self.settings.width,
            self.settings.height,
            self.settings.fps,
        )?;
        log::info!("recording started: {}", path.display());
        self.active = Some(ActiveRecording {
            writer,
            path: path.to_path_buf(),
            started: Instant::now(),
        });
        Ok(())
    }

    /// Append one frame to the active sink. No-op while idle. Frames that do
    /// not match the configured sink dimensions are skipped.
    pub fn write(&mut self, frame: &Frame) -> Result<()> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        if frame.width() != self.settings.width || frame.height() != self.settings.height {
            log::warn!(
                "skipping {}x{} frame, sink is {}x{}",
                frame.width(),
                frame.height(),
                self.settings.width,
                self.settings.height
            );
            return Ok(());
        }
        let jpeg = frame.encode_jpeg(self.settings.jpeg_quality)?;
        active.writer.write_frame(&jpeg)
    }

    /// Finalize the active sink and report elapsed wall-clock time. `None`
    /// when no recording was active.
    pub fn stop(&mut self) -> Result<Option<Duration>> {
        let Some(mut active) = self.active.take() else {
            return Ok(None);
        };
        active.writer.finish()?;
        let elapsed = active.started.elapsed();
        log::info!(
            "recording stopped: {} ({} frames, {:.1}s)",
            active.path.display(),
            active.writer.frames_written(),
            elapsed.as_secs_f32()
        );
        Ok(Some(elapsed))
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Elapsed time of the active recording, if any.
    pub fn elapsed(&self) -> Option<Duration> {
        self.active.as_ref().map(|active| active.started.elapsed())
    }

    pub fn path(&self) -> Option<&Path> {
        self.active.as_ref().map(|active| active.path.as_path())
    }
}
