//! Minimal RIFF/AVI muxer for an MJPEG video stream.
//!
//! Layout written here:
//!
//! ```text
//! RIFF <size> "AVI "
//!   LIST <size> "hdrl"
//!     "avih" <56>                 main header (frame count patched on finish)
//!     LIST <size> "strl"
//!       "strh" <56>               stream header, fcc 'vids'/'MJPG'
//!       "strf" <40>               BITMAPINFOHEADER, biCompression 'MJPG'
//!   LIST <size> "movi"
//!     "00dc" <len> <jpeg> [pad]   one chunk per frame, even-padded
//!   "idx1" <16 * frames>          keyframe index
//! ```
//!
//! Chunk sizes that depend on the frame count are written as zero up front
//! and patched in `finish`.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::AppError;

const AVIF_HASINDEX: u32 = 0x0000_0010;
const AVIIF_KEYFRAME: u32 = 0x0000_0010;

#[derive(Debug)]
pub(crate) struct AviWriter {
    out: BufWriter<File>,
    fps: u32,
    width: u32,
    height: u32,
    frames: u32,
    /// (offset from the "movi" fourcc, payload size) per frame.
    index: Vec<(u32, u32)>,
    avih_frames_pos: u64,
    strh_length_pos: u64,
    movi_size_pos: u64,
    movi_fourcc_pos: u64,
    finished: bool,
}

impl AviWriter {
    /// Create the sink file and write the container headers. An unusable
    /// path is [`AppError::CannotCreateSink`].
    pub(crate) fn create(path: &Path, width: u32, height: u32, fps: u32) -> Result<Self> {
        let file = File::create(path).map_err(|err| AppError::CannotCreateSink {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
        let mut writer = Self {
            out: BufWriter::new(file),
            fps: fps.max(1),
            width,
            height,
            frames: 0,
            index: Vec::new(),
            avih_frames_pos: 0,
            strh_length_pos: 0,
            movi_size_pos: 0,
            movi_fourcc_pos: 0,
            finished: false,
        };
        writer
            .write_headers()
            .with_context(|| format!("failed to write AVI headers to {}", path.display()))?;
        Ok(writer)
    }

    fn write_headers(&mut self) -> Result<()> {
        let frame_bytes = self.width * self.height * 3;

        self.fourcc(b"RIFF")?;
        self.u32(0)?; // RIFF size, patched on finish
        self.fourcc(b"AVI ")?;

        // hdrl list: avih (64 bytes) + strl list (124 bytes) + type tag.
        self.fourcc(b"LIST")?;
        self.u32(4 + 64 + 124)?;
        self.fourcc(b"hdrl")?;

        self.fourcc(b"avih")?;
        self.u32(56)?;
        self.u32(1_000_000 / self.fps)?; // microseconds per frame
        self.u32(frame_bytes * self.fps)?; // max bytes per second
        self.u32(0)?; // padding granularity
        self.u32(AVIF_HASINDEX)?;
        self.avih_frames_pos = self.pos()?;
        self.u32(0)?; // total frames, patched on finish
        self.u32(0)?; // initial frames
        self.u32(1)?; // streams
        self.u32(frame_bytes)?; // suggested buffer size
        self.u32(self.width)?;
        self.u32(self.height)?;
        self.u32(0)?;
        self.u32(0)?;
        self.u32(0)?;
        self.u32(0)?;

        self.fourcc(b"LIST")?;
        self.u32(4 + 64 + 48)?;
        self.fourcc(b"strl")?;

        self.fourcc(b"strh")?;
        self.u32(56)?;
        self.fourcc(b"vids")?;
        self.fourcc(b"MJPG")?;
        self.u32(0)?; // flags
        self.u16(0)?; // priority
        self.u16(0)?; // language
        self.u32(0)?; // initial frames
        self.u32(1)?; // scale
        self.u32(self.fps)?; // rate: rate / scale = fps
        self.u32(0)?; // start
        self.strh_length_pos = self.pos()?;
        self.u32(0)?; // length in frames, patched on finish
        self.u32(frame_bytes)?; // suggested buffer size
        self.u32(u32::MAX)?; // quality: driver default
        self.u32(0)?; // sample size
        self.u16(0)?; // rcFrame
        self.u16(0)?;
        self.u16(self.width as u16)?;
        self.u16(self.height as u16)?;

        self.fourcc(b"strf")?;
        self.u32(40)?;
        self.u32(40)?; // BITMAPINFOHEADER size
        self.u32(self.width)?;
        self.u32(self.height)?;
        self.u16(1)?; // planes
        self.u16(24)?; // bit count
        self.fourcc(b"MJPG")?; // compression
        self.u32(frame_bytes)?; // image size
        self.u32(0)?;
        self.u32(0)?;
        self.u32(0)?;
        self.u32(0)?;

        self.fourcc(b"LIST")?;
        self.movi_size_pos = self.pos()?;
        self.u32(0)?; // movi size, patched on finish
        self.movi_fourcc_pos = self.pos()?;
        self.fourcc(b"movi")?;

        Ok(())
    }

    /// Append one JPEG-encoded frame.
    pub(crate) fn write_frame(&mut self, jpeg: &[u8]) -> Result<()> {
        let chunk_pos = self.pos()?;
        let offset = (chunk_pos - self.movi_fourcc_pos) as u32;

        self.fourcc(b"00dc")?;
        self.u32(jpeg.len() as u32)?;
        self.out.write_all(jpeg).context("write frame payload")?;
        if jpeg.len() % 2 == 1 {
            self.out.write_all(&[0]).context("write chunk padding")?;
        }

        self.index.push((offset, jpeg.len() as u32));
        self.frames += 1;
        Ok(())
    }

    pub(crate) fn frames_written(&self) -> u32 {
        self.frames
    }

    /// Write the index, patch all deferred sizes, and flush. Idempotent.
    pub(crate) fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }

        let idx1_pos = self.pos()?;
        self.fourcc(b"idx1")?;
        self.u32(self.index.len() as u32 * 16)?;
        let entries = std::mem::take(&mut self.index);
        for (offset, size) in entries {
            self.fourcc(b"00dc")?;
            self.u32(AVIIF_KEYFRAME)?;
            self.u32(offset)?;
            self.u32(size)?;
        }

        let end = self.pos()?;
        self.patch(4, (end - 8) as u32)?;
        self.patch(self.movi_size_pos, (idx1_pos - self.movi_fourcc_pos) as u32)?;
        self.patch(self.avih_frames_pos, self.frames)?;
        self.patch(self.strh_length_pos, self.frames)?;
        self.out.seek(SeekFrom::Start(end)).context("seek to end")?;
        self.out.flush().context("flush AVI sink")?;

        self.finished = true;
        Ok(())
    }

    fn patch(&mut self, pos: u64, value: u32) -> Result<()> {
        self.out
            .seek(SeekFrom::Start(pos))
            .context("seek to patch position")?;
        self.out
            .write_all(&value.to_le_bytes())
            .context("patch header field")?;
        Ok(())
    }

    fn pos(&mut self) -> Result<u64> {
        self.out.stream_position().context("query sink position")
    }

    fn fourcc(&mut self, tag: &[u8; 4]) -> Result<()> {
        self.out.write_all(tag).context("write fourcc")?;
        Ok(())
    }

    fn u32(&mut self, value: u32) -> Result<()> {
        self.out
            .write_all(&value.to_le_bytes())
            .context("write u32")?;
        Ok(())
    }

    fn u16(&mut self, value: u16) -> Result<()> {
        self.out
            .write_all(&value.to_le_bytes())
            .context("write u16")?;
        Ok(())
    }
}

impl Drop for AviWriter {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(err) = self.finish() {
                log::warn!("failed to finalize AVI sink on drop: {err:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    fn frame_count_field(bytes: &[u8]) -> u32 {
        u32::from_le_bytes(bytes[48..52].try_into().unwrap())
    }

    #[test]
    fn container_layout_is_patched_on_finish() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.avi");
        let jpeg = Frame::solid(16, 16, [80, 80, 80]).encode_jpeg(85)?;

        let mut writer = AviWriter::create(&path, 16, 16, 20)?;
        writer.write_frame(&jpeg)?;
        writer.write_frame(&jpeg)?;
        writer.write_frame(&jpeg)?;
        writer.finish()?;

        let bytes = std::fs::read(&path)?;
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"AVI ");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize, bytes.len() - 8);
        assert_eq!(frame_count_field(&bytes), 3);
        assert!(bytes.windows(4).any(|w| w == b"movi"));
        assert!(bytes.windows(4).any(|w| w == b"idx1"));
        Ok(())
    }

    #[test]
    fn odd_payloads_are_even_padded() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("odd.avi");

        let mut writer = AviWriter::create(&path, 4, 4, 20)?;
        writer.write_frame(&[0xFF, 0xD8, 0xFF])?;
        let after_first = writer.pos()?;
        assert_eq!(after_first % 2, 0);
        writer.finish()?;
        Ok(())
    }

    #[test]
    fn unusable_path_is_cannot_create_sink() {
        let err = AviWriter::create(Path::new("/nonexistent/dir/out.avi"), 4, 4, 20).unwrap_err();
        assert!(matches!(
            AppError::classify(&err),
            Some(AppError::CannotCreateSink { .. })
        ));
    }
}
