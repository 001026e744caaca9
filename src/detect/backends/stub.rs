//! Scripted backend for tests and the demo binary.

use std::collections::VecDeque;

use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Backend that replays prepared detections instead of running a model.
pub struct StubBackend {
    mode: Mode,
    calls: u64,
}

enum Mode {
    Empty,
    /// One prepared detection set per call; empty once drained.
    Script(VecDeque<Vec<Detection>>),
    /// The same detection set on every `period`-th call.
    Repeating {
        detections: Vec<Detection>,
        period: u64,
    },
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            mode: Mode::Empty,
            calls: 0,
        }
    }

    pub fn scripted(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            mode: Mode::Script(frames.into()),
            calls: 0,
        }
    }

    pub fn repeating(detections: Vec<Detection>, period: u64) -> Self {
        Self {
            mode: Mode::Repeating {
                detections,
                period: period.max(1),
            },
            calls: 0,
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>> {
        self.calls += 1;
        let raw = match &mut self.mode {
            Mode::Empty => Vec::new(),
            Mode::Script(frames) => frames.pop_front().unwrap_or_default(),
            Mode::Repeating { detections, period } => {
                if self.calls % *period == 0 {
                    detections.clone()
                } else {
                    Vec::new()
                }
            }
        };
        Ok(raw
            .into_iter()
            .filter(|det| det.confidence >= confidence_threshold)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BoundingBox;

    fn det(confidence: f32) -> Detection {
        Detection {
            class_id: 1,
            confidence,
            bbox: BoundingBox {
                x: 0,
                y: 0,
                width: 10,
                height: 10,
            },
        }
    }

    #[test]
    fn detections_below_threshold_are_never_returned() {
        let frame = Frame::solid(8, 8, [0, 0, 0]);
        let confidences = [0.15, 0.25, 0.35, 0.45, 0.55, 0.65, 0.75, 0.85, 0.95];
        for step in 1..=10u32 {
            let threshold = step as f32 / 10.0;
            let mut backend =
                StubBackend::scripted(vec![confidences.iter().copied().map(det).collect()]);
            let returned = backend.detect(&frame, threshold).unwrap();
            assert!(
                returned.iter().all(|d| d.confidence >= threshold),
                "threshold {} leaked a weaker detection",
                threshold
            );
        }
    }

    #[test]
    fn script_drains_then_stays_empty() {
        let frame = Frame::solid(8, 8, [0, 0, 0]);
        let mut backend = StubBackend::scripted(vec![vec![det(0.9)], vec![]]);
        assert_eq!(backend.detect(&frame, 0.5).unwrap().len(), 1);
        assert!(backend.detect(&frame, 0.5).unwrap().is_empty());
        assert!(backend.detect(&frame, 0.5).unwrap().is_empty());
    }

    #[test]
    fn repeating_fires_on_period() {
        let frame = Frame::solid(8, 8, [0, 0, 0]);
        let mut backend = StubBackend::repeating(vec![det(0.9)], 3);
        let hits: Vec<usize> = (0..6)
            .map(|_| backend.detect(&frame, 0.5).unwrap().len())
            .collect();
        assert_eq!(hits, vec![0, 0, 1, 0, 0, 1]);
    }
}
