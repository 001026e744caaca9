#![cfg(feature = "backend-tract")]

//! Tract-based backend for SSD-style ONNX detection models.
//!
//! The backend loads a local model file once at startup and performs
//! inference on RGB frames. The network's `DetectionOutput` rows are
//! `(image_id, class_id, confidence, x1, y1, x2, y2)` with corners normalized
//! to [0, 1]; class ids are 1-based with 0 reserved for background.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};
use crate::detect::ModelSpec;
use crate::frame::Frame;
use crate::AppError;

pub struct TractBackend {
    model: TypedSimplePlan<TypedModel>,
    spec: ModelSpec,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference. An absent
    /// or unloadable weights file is [`AppError::MissingAsset`].
    pub fn new<P: AsRef<Path>>(model_path: P, spec: ModelSpec) -> Result<Self> {
        let model_path = model_path.as_ref();
        let missing = || AppError::MissingAsset {
            path: model_path.to_path_buf(),
        };
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .map_err(|err| {
                log::error!("failed to load ONNX model {}: {}", model_path.display(), err);
                anyhow::Error::from(missing())
            })?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(
                        1,
                        3,
                        spec.input_height as usize,
                        spec.input_width as usize
                    ),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self { model, spec })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let resized = image::imageops::resize(
            frame.as_image(),
            self.spec.input_width,
            self.spec.input_height,
            FilterType::Triangle,
        );
        let width = self.spec.input_width as usize;
        let swap_rb = self.spec.swap_rb;
        let scale = self.spec.scale;
        let mean = self.spec.mean;

        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.spec.input_height as usize, width),
            |(_, channel, y, x)| {
                let source_channel = if swap_rb { 2 - channel } else { channel };
                let value = resized.get_pixel(x as u32, y as u32).0[source_channel] as f32;
                (value - mean[channel]) * scale
            },
        );

        Ok(input.into_tensor())
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let flat: Vec<f32> = view.iter().copied().collect();
        if flat.len() % 7 != 0 {
            return Err(anyhow!(
                "unexpected detection output length {} (not rows of 7)",
                flat.len()
            ));
        }

        Ok(detections_from_rows(
            &flat,
            frame.width(),
            frame.height(),
            confidence_threshold,
        ))
    }

    fn warm_up(&mut self) -> Result<()> {
        let frame = Frame::solid(self.spec.input_width, self.spec.input_height, [0, 0, 0]);
        self.detect(&frame, 1.0).map(|_| ())
    }
}

/// Map raw `DetectionOutput` rows to pixel-space detections, dropping
/// background rows and everything below the threshold.
fn detections_from_rows(
    flat: &[f32],
    frame_width: u32,
    frame_height: u32,
    confidence_threshold: f32,
) -> Vec<Detection> {
    let fw = frame_width as f32;
    let fh = frame_height as f32;
    let mut detections = Vec::new();

    for row in flat.chunks_exact(7) {
        let class = row[1];
        let confidence = row[2];
        if !confidence.is_finite() || confidence < confidence_threshold {
            continue;
        }
        if class < 1.0 {
            // Background row.
            continue;
        }

        let x1 = row[3] * fw;
        let y1 = row[4] * fh;
        let x2 = row[5] * fw;
        let y2 = row[6] * fh;
        let width = (x2 - x1).round();
        let height = (y2 - y1).round();
        if width < 1.0 || height < 1.0 {
            continue;
        }

        detections.push(Detection {
            class_id: class as usize,
            confidence,
            bbox: BoundingBox {
                x: x1.round() as i32,
                y: y1.round() as i32,
                width: width as u32,
                height: height as u32,
            },
        });
    }

    detections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_filtered_and_scaled() {
        // Two rows: a background row and a person at 90%.
        let flat = [
            0.0, 0.0, 0.99, 0.0, 0.0, 1.0, 1.0, //
            0.0, 1.0, 0.9, 0.25, 0.25, 0.75, 0.75,
        ];
        let detections = detections_from_rows(&flat, 640, 480, 0.5);
        assert_eq!(detections.len(), 1);
        let det = &detections[0];
        assert_eq!(det.class_id, 1);
        assert_eq!(det.bbox, BoundingBox { x: 160, y: 120, width: 320, height: 240 });
    }

    #[test]
    fn threshold_filters_rows() {
        let flat = [0.0, 1.0, 0.4, 0.0, 0.0, 0.5, 0.5];
        assert!(detections_from_rows(&flat, 100, 100, 0.5).is_empty());
        assert_eq!(detections_from_rows(&flat, 100, 100, 0.4).len(), 1);
    }
}
