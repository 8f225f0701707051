//! Face recognition capability.
//!
//! Training, prediction and persistence are backend concerns; the
//! orchestration code only sees these traits. [`crate::lbph`] is the bundled
//! backend.

use crate::types::Prediction;
use image::GrayImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed model file {path}: {source}")]
    Format {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid model: {0}")]
    Invalid(String),
    #[error("training set is empty")]
    EmptyTrainingSet,
    #[error("{images} training images but {labels} labels")]
    LengthMismatch { images: usize, labels: usize },
    #[error("model has no training samples")]
    Untrained,
    #[error("face crop is {width}x{height}, model expects {expected_width}x{expected_height}")]
    CropSize {
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },
}

/// A trained model that can score a normalized face crop.
pub trait FaceModel {
    /// Closest known subject for `crop`.
    fn predict(&self, crop: &GrayImage) -> Result<Prediction, ModelError>;

    /// Persist the model in the backend's own format.
    fn save(&self, path: &Path) -> Result<(), ModelError>;
}

impl<M: FaceModel + ?Sized> FaceModel for Box<M> {
    fn predict(&self, crop: &GrayImage) -> Result<Prediction, ModelError> {
        (**self).predict(crop)
    }

    fn save(&self, path: &Path) -> Result<(), ModelError> {
        (**self).save(path)
    }
}

/// Fits a [`FaceModel`] from a labeled batch held entirely in memory.
pub trait Trainer {
    type Model: FaceModel;

    /// `crops[i]` is labeled `labels[i]`.
    fn train(&self, crops: &[GrayImage], labels: &[i32]) -> Result<Self::Model, ModelError>;
}
