//! Detection overlays: boxes and class labels burned into the frame.
//!
//! Drawing happens before night-mode inversion and recording, so annotated
//! frames flow to both the display and the sink.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::Result;
use image::Rgb;
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::detect::{Detection, LabelMap};
use crate::frame::Frame;
use crate::AppError;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: i32 = 2;
/// Fixed label margin from the box's top-left corner.
const LABEL_OFFSET_X: i32 = 10;
const LABEL_OFFSET_Y: i32 = 8;
const LABEL_SCALE: f32 = 24.0;

pub struct Overlay {
    font: Option<FontVec>,
}

impl Overlay {
    /// Load the overlay font asset. An absent or unparseable font file is
    /// [`AppError::MissingAsset`].
    pub fn load(path: &Path) -> Result<Self> {
        let missing = || AppError::MissingAsset {
            path: path.to_path_buf(),
        };
        let bytes = std::fs::read(path).map_err(|_| missing())?;
        let font = FontVec::try_from_vec(bytes).map_err(|err| {
            log::error!("font asset {} is unreadable: {}", path.display(), err);
            missing()
        })?;
        Ok(Self { font: Some(font) })
    }

    /// Overlay that draws boxes but no label text. Used by the headless demo
    /// and tests, which run without font assets.
    pub fn without_font() -> Self {
        Self { font: None }
    }

    /// Draw every detection onto the frame: a hollow box plus the class label
    /// offset from the box's top-left corner.
    pub fn draw(&self, frame: &mut Frame, detections: &[Detection], labels: &LabelMap) {
        for detection in detections {
            let Some(bbox) = detection.bbox.clamped(frame.width(), frame.height()) else {
                continue;
            };

            for inset in 0..BOX_THICKNESS {
                let width = bbox.width as i32 - 2 * inset;
                let height = bbox.height as i32 - 2 * inset;
                if width < 1 || height < 1 {
                    break;
                }
                let rect =
                    Rect::at(bbox.x + inset, bbox.y + inset).of_size(width as u32, height as u32);
                draw_hollow_rect_mut(frame.as_image_mut(), rect, BOX_COLOR);
            }

            if let Some(font) = &self.font {
                draw_text_mut(
                    frame.as_image_mut(),
                    BOX_COLOR,
                    bbox.x + LABEL_OFFSET_X,
                    bbox.y + LABEL_OFFSET_Y,
                    PxScale::from(LABEL_SCALE),
                    font,
                    &label_text(labels, detection.class_id),
                );
            }
        }
    }
}

/// The drawn label: the class name in upper case, or the numeric id when the
/// id has no entry in the label list.
fn label_text(labels: &LabelMap, class_id: usize) -> String {
    labels
        .name(class_id)
        .map(str::to_uppercase)
        .unwrap_or_else(|| format!("#{}", class_id))
}
