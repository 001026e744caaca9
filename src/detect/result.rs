/// One predicted object instance.
///
/// `class_id` follows the pretrained model's convention: ids start at 1, with
/// 0 reserved for background. [`crate::detect::LabelMap`] resolves the name.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    /// Score in [0, 1].
    pub confidence: f32,
    /// Pixel-space box in the source frame.
    pub bbox: BoundingBox,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width as i32)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height as i32)
    }

    /// Intersect the box with a `frame_width` x `frame_height` frame.
    /// Returns `None` when nothing remains visible.
    pub fn clamped(&self, frame_width: u32, frame_height: u32) -> Option<BoundingBox> {
        let left = self.x.max(0);
        let top = self.y.max(0);
        let right = self.right().min(frame_width as i32);
        let bottom = self.bottom().min(frame_height as i32);
        if right - left < 1 || bottom - top < 1 {
            return None;
        }
        Some(BoundingBox {
            x: left,
            y: top,
            width: (right - left) as u32,
            height: (bottom - top) as u32,
        })
    }
}
