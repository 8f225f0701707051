//! Shared fixtures for unit tests.

use crate::detector::{DetectorError, FaceDetector};
use crate::types::BoundingBox;
use image::{GrayImage, Luma};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Fresh, empty directory under the system temp dir, unique per test name.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("likeness-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

/// Write a uniform grayscale image.
pub fn write_gray(path: &Path, width: u32, height: u32, value: u8) {
    GrayImage::from_pixel(width, height, Luma([value]))
        .save(path)
        .expect("write fixture image");
}

/// Detector that replays canned results, one list per call.
pub struct ScriptedDetector {
    script: VecDeque<Vec<BoundingBox>>,
    fallback: Vec<BoundingBox>,
    pub calls: usize,
}

impl ScriptedDetector {
    /// Return `script[i]` on call `i`, nothing afterwards.
    pub fn new(script: Vec<Vec<BoundingBox>>) -> Self {
        Self {
            script: script.into(),
            fallback: Vec::new(),
            calls: 0,
        }
    }

    /// Return the same boxes on every call.
    pub fn repeating(boxes: Vec<BoundingBox>) -> Self {
        Self {
            script: VecDeque::new(),
            fallback: boxes,
            calls: 0,
        }
    }
}

impl FaceDetector for ScriptedDetector {
    fn detect(&mut self, _gray: &GrayImage) -> Result<Vec<BoundingBox>, DetectorError> {
        self.calls += 1;
        Ok(self
            .script
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}
