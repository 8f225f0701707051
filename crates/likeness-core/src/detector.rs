//! Face detection capability and the SeetaFace backend.
//!
//! The orchestration code only needs "image in, boxes out"; detector tuning
//! lives in [`DetectorParams`] and is passed through to the backend unchanged.

use crate::types::BoundingBox;
use image::GrayImage;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

// SeetaFace defaults, matching rustface's own recommended settings.
const SEETA_MIN_FACE_SIZE: u32 = 20;
const SEETA_SCORE_THRESHOLD: f64 = 2.0;
const SEETA_PYRAMID_SCALE: f32 = 0.8;
const SEETA_WINDOW_STEP: u32 = 4;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("failed to load detector model {path}: {reason}")]
    ModelLoad { path: String, reason: String },
    #[error("detection failed: {0}")]
    DetectionFailed(String),
}

/// Something that finds face rectangles in a grayscale image.
pub trait FaceDetector {
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<BoundingBox>, DetectorError>;
}

impl<D: FaceDetector + ?Sized> FaceDetector for Box<D> {
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<BoundingBox>, DetectorError> {
        (**self).detect(gray)
    }
}

/// Tuning knobs for the SeetaFace cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorParams {
    /// Smallest face, in pixels, the detector will report.
    pub min_face_size: u32,
    /// Minimum classifier score for a window to count as a face.
    pub score_threshold: f64,
    /// Image pyramid down-scaling factor between levels (0, 1).
    pub pyramid_scale_factor: f32,
    /// Sliding-window step in pixels, both axes.
    pub window_step: u32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            min_face_size: SEETA_MIN_FACE_SIZE,
            score_threshold: SEETA_SCORE_THRESHOLD,
            pyramid_scale_factor: SEETA_PYRAMID_SCALE,
            window_step: SEETA_WINDOW_STEP,
        }
    }
}

/// Face detector backed by the `rustface` crate (SeetaFace engine).
pub struct RustfaceDetector {
    detector: Box<dyn rustface::Detector>,
}

impl RustfaceDetector {
    /// Load a SeetaFace model file (e.g. `seeta_fd_frontal_v1.0.bin`).
    pub fn load(model_path: &Path, params: DetectorParams) -> Result<Self, DetectorError> {
        let path = model_path.display().to_string();
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(path));
        }

        let file = File::open(model_path).map_err(|e| DetectorError::ModelLoad {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let model = rustface::read_model(BufReader::new(file)).map_err(|e| {
            DetectorError::ModelLoad {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;

        let mut detector = rustface::create_detector_with_model(model);
        detector.set_min_face_size(params.min_face_size);
        detector.set_score_thresh(params.score_threshold);
        detector.set_pyramid_scale_factor(params.pyramid_scale_factor);
        detector.set_slide_window_step(params.window_step, params.window_step);

        tracing::info!(
            path = %path,
            min_face_size = params.min_face_size,
            score_threshold = params.score_threshold,
            pyramid_scale = params.pyramid_scale_factor,
            window_step = params.window_step,
            "loaded SeetaFace detector"
        );

        Ok(Self { detector })
    }
}

impl FaceDetector for RustfaceDetector {
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<BoundingBox>, DetectorError> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Err(DetectorError::DetectionFailed(format!(
                "empty image {width}x{height}"
            )));
        }

        let faces = self
            .detector
            .detect(&rustface::ImageData::new(gray.as_raw(), width, height));

        let boxes: Vec<BoundingBox> = faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                BoundingBox::new(bbox.x(), bbox.y(), bbox.width(), bbox.height())
            })
            .collect();

        tracing::debug!(width, height, faces = boxes.len(), "SeetaFace detection");
        Ok(boxes)
    }
}
