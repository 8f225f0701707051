//! Per-image recognition: detect, reconcile, predict, label, annotate.

use crate::annotate::Annotator;
use crate::detector::{DetectorError, FaceDetector};
use crate::geometry;
use crate::imaging;
use crate::labels::{self, LabelMap, DEFAULT_THRESHOLD};
use crate::recognizer::{FaceModel, ModelError};
use crate::types::{BoundingBox, Prediction, DEFAULT_FACE_SIZE};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Model(#[from] ModelError),
}

/// A face whose prediction passed the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedFace {
    pub bounds: BoundingBox,
    pub prediction: Prediction,
    /// `"{name} - {distance:.2}"`, as drawn on the image.
    pub text: String,
}

/// Result of one [`RecognitionPipeline::recognize`] call.
pub struct Recognition {
    /// Copy of the input with accepted faces drawn on it.
    pub image: RgbImage,
    pub faces: Vec<RecognizedFace>,
    /// Faces left unlabeled because their distance reached the threshold.
    pub rejected: usize,
}

/// Recognition session: a detector, a loaded model and the label map,
/// all fixed for the session's lifetime.
pub struct RecognitionPipeline<D, M> {
    detector: D,
    model: M,
    labels: LabelMap,
    threshold: f64,
    face_size: u32,
    annotator: Annotator,
}

impl<D: FaceDetector, M: FaceModel> RecognitionPipeline<D, M> {
    pub fn new(detector: D, model: M, labels: LabelMap) -> Self {
        Self {
            detector,
            model,
            labels,
            threshold: DEFAULT_THRESHOLD,
            face_size: DEFAULT_FACE_SIZE,
            annotator: Annotator::new(),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Must match the crop size the model was trained on.
    pub fn with_face_size(mut self, face_size: u32) -> Self {
        self.face_size = face_size;
        self
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Recognize every face in `image`. The input is left untouched.
    pub fn recognize(&mut self, image: &RgbImage) -> Result<Recognition, PipelineError> {
        let gray = image::imageops::grayscale(image);
        let candidates = self.detector.detect(&gray)?;
        let faces = geometry::filter_contained(&candidates);
        tracing::debug!(
            candidates = candidates.len(),
            kept = faces.len(),
            "filtered nested detections"
        );

        let mut annotated = image.clone();
        let mut recognized = Vec::new();
        let mut rejected = 0;

        for face in faces {
            let Some(crop) = imaging::normalize_face(&gray, &face, self.face_size) else {
                continue;
            };
            let prediction = self.model.predict(&crop)?;

            let Some(label) = labels::resolve(&prediction, &self.labels, self.threshold) else {
                tracing::debug!(
                    %face,
                    label = prediction.label,
                    distance = prediction.distance,
                    threshold = self.threshold,
                    "prediction rejected"
                );
                rejected += 1;
                continue;
            };

            self.annotator.draw(&mut annotated, &face, &label.text);
            tracing::info!(%face, text = %label.text, "face recognized");
            recognized.push(RecognizedFace {
                bounds: face,
                prediction,
                text: label.text,
            });
        }

        Ok(Recognition {
            image: annotated,
            faces: recognized,
            rejected,
        })
    }
}
