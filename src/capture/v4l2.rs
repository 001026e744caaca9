#![cfg(feature = "ingest-v4l2")]

//! V4L2 device backend.
//!
//! Captures frames from a local device node via memory-mapped streaming.
//! RGB3 output is requested first; devices that refuse it fall back to YUYV,
//! which is converted to RGB in-process.

use anyhow::{anyhow, Result};
use ouroboros::self_referencing;

use super::CameraConfig;
use crate::frame::Frame;
use crate::AppError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CaptureFormat {
    Rgb24,
    Yuyv,
}

pub(super) struct DeviceCamera {
    config: CameraConfig,
    state: Option<DeviceState>,
    format: CaptureFormat,
    active_width: u32,
    active_height: u32,
    frame_count: u64,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl DeviceCamera {
    pub(super) fn open(config: CameraConfig) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let unavailable = |reason: String| AppError::DeviceUnavailable {
            device: config.device.clone(),
            reason,
        };

        let mut device = v4l::Device::with_path(&config.device)
            .map_err(|err| unavailable(err.to_string()))?;

        let mut format = device
            .format()
            .map_err(|err| unavailable(format!("read format: {}", err)))?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "DeviceCamera: failed to set RGB3 on {}: {}",
                    config.device,
                    err
                );
                format.fourcc = v4l::FourCC::new(b"YUYV");
                device
                    .set_format(&format)
                    .map_err(|err| unavailable(format!("set format: {}", err)))?
            }
        };

        let capture_format = match &format.fourcc.repr {
            b"RGB3" => CaptureFormat::Rgb24,
            b"YUYV" => CaptureFormat::Yuyv,
            other => {
                return Err(unavailable(format!(
                    "unsupported pixel format {}",
                    String::from_utf8_lossy(other)
                ))
                .into());
            }
        };

        if config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "DeviceCamera: failed to set fps on {}: {}",
                    config.device,
                    err
                );
            }
        }

        let active_width = format.width;
        let active_height = format.height;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow!("create v4l2 buffer stream: {}", err))
            },
        }
        .try_build()
        .map_err(|err| unavailable(err.to_string()))?;

        log::info!(
            "DeviceCamera: negotiated {}x{} {:?} on {}",
            active_width,
            active_height,
            capture_format,
            config.device
        );

        Ok(Self {
            config,
            state: Some(state),
            format: capture_format,
            active_width,
            active_height,
            frame_count: 0,
        })
    }

    pub(super) fn read(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let device = self.config.device.clone();
        let Some(state) = self.state.as_mut() else {
            return Err(AppError::ReadFailure { device }.into());
        };
        let (buf, _meta) = state.with_mut(|fields| fields.stream.next()).map_err(|err| {
            log::warn!("DeviceCamera: capture failed on {}: {}", device, err);
            anyhow::Error::from(AppError::ReadFailure {
                device: device.clone(),
            })
        })?;

        let pixels = match self.format {
            CaptureFormat::Rgb24 => {
                validate_rgb_len(buf, self.active_width, self.active_height)?;
                buf.to_vec()
            }
            CaptureFormat::Yuyv => yuyv_to_rgb(buf, self.active_width, self.active_height)?,
        };

        self.frame_count += 1;
        Frame::from_raw(self.active_width, self.active_height, pixels)
    }

    pub(super) fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

fn validate_rgb_len(pixels: &[u8], width: u32, height: u32) -> Result<()> {
    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("RGB frame dimensions overflow"))?;
    if pixels.len() < expected {
        return Err(anyhow!(
            "RGB frame length mismatch: expected at least {}, got {}",
            expected,
            pixels.len()
        ));
    }
    Ok(())
}

/// Convert packed YUYV 4:2:2 (BT.601) to RGB24.
fn yuyv_to_rgb(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let w = width as usize;
    let h = height as usize;
    let expected = w
        .checked_mul(h)
        .and_then(|v| v.checked_mul(2))
        .ok_or_else(|| anyhow!("YUYV frame dimensions overflow"))?;
    if pixels.len() < expected {
        return Err(anyhow!(
            "YUYV frame length mismatch: expected {}, got {}",
            expected,
            pixels.len()
        ));
    }

    let mut rgb = vec![0u8; w * h * 3];
    for (pair_index, quad) in pixels[..expected].chunks_exact(4).enumerate() {
        let [y0, u, y1, v] = [quad[0], quad[1], quad[2], quad[3]];
        let u = u as f32 - 128.0;
        let v = v as f32 - 128.0;
        for (offset, y) in [(0usize, y0), (1usize, y1)] {
            let y = y as f32;
            let r = y + 1.402_f32 * v;
            let g = y - 0.344_136_f32 * u - 0.714_136_f32 * v;
            let b = y + 1.772_f32 * u;
            let out = (pair_index * 2 + offset) * 3;
            rgb[out] = clamp_to_u8(r);
            rgb[out + 1] = clamp_to_u8(g);
            rgb[out + 2] = clamp_to_u8(b);
        }
    }
    Ok(rgb)
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuyv_conversion_produces_gray() -> Result<()> {
        // Two pixels: Y=128, U=V=128 is mid-gray.
        let yuyv = vec![128u8, 128, 128, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1)?;
        assert_eq!(rgb, vec![128u8; 6]);
        Ok(())
    }

    #[test]
    fn yuyv_rejects_short_buffers() {
        assert!(yuyv_to_rgb(&[0u8; 3], 2, 1).is_err());
    }
}
