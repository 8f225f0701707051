//! Training: labeled face crops → persisted recognition model.
//!
//! Labeled crops are named `{subject_id}_{anything}.{ext}`. The whole corpus
//! is loaded into memory and trained in one batch; nothing is written unless
//! every file loads and training succeeds.

use crate::dataset::{self, DatasetError};
use crate::imaging;
use crate::recognizer::{FaceModel, ModelError, Trainer};
use image::GrayImage;
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainingError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("{path}: file name has no integer subject id before '_'")]
    BadLabel { path: String },
    #[error("cannot load image {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("{path} is {width}x{height}, expected a {expected}x{expected} face crop")]
    CropSize {
        path: String,
        width: u32,
        height: u32,
        expected: u32,
    },
    #[error("no training images in {0}")]
    Empty(String),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Outcome of a [`train`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainReport {
    pub samples: usize,
    /// Distinct subject ids, ascending.
    pub subjects: Vec<i32>,
}

/// Subject id encoded in a labeled file name: the stem up to the first `_`.
///
/// `"3_12.jpg"` → 3, `"3.jpg"` → 3, `"lauren_1.jpg"` → error.
pub fn parse_subject_id(path: &Path) -> Result<i32, TrainingError> {
    let bad = || TrainingError::BadLabel {
        path: path.display().to_string(),
    };

    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(bad)?;
    let prefix = stem.split('_').next().unwrap_or_default();
    prefix.parse().map_err(|_| bad())
}

/// Load every labeled crop in `dir`.
///
/// All file names are checked before any image is decoded. Each crop must
/// already be `face_size`×`face_size`.
pub fn load_corpus(
    dir: &Path,
    face_size: u32,
) -> Result<(Vec<GrayImage>, Vec<i32>), TrainingError> {
    let files = dataset::list_files(dir)?;
    if files.is_empty() {
        return Err(TrainingError::Empty(dir.display().to_string()));
    }

    let labels = files
        .iter()
        .map(|f| parse_subject_id(f))
        .collect::<Result<Vec<_>, _>>()?;

    let crops = files
        .iter()
        .map(|f| load_crop(f, face_size))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((crops, labels))
}

fn load_crop(path: &Path, face_size: u32) -> Result<GrayImage, TrainingError> {
    let crop = imaging::load_gray(path).map_err(|source| TrainingError::Load {
        path: path.display().to_string(),
        source,
    })?;

    let (width, height) = crop.dimensions();
    if width != face_size || height != face_size {
        return Err(TrainingError::CropSize {
            path: path.display().to_string(),
            width,
            height,
            expected: face_size,
        });
    }

    tracing::debug!(path = %path.display(), "loaded training crop");
    Ok(crop)
}

/// Train a model from the labeled crops in `labeled_dir` and save it to
/// `output_model_path`.
pub fn train<T: Trainer>(
    trainer: &T,
    labeled_dir: &Path,
    output_model_path: &Path,
    face_size: u32,
) -> Result<TrainReport, TrainingError> {
    tracing::info!(input = %labeled_dir.display(), "loading training data");
    let (crops, labels) = load_corpus(labeled_dir, face_size)?;
    let subjects: Vec<i32> = labels
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    tracing::info!(samples = crops.len(), subjects = subjects.len(), "loading complete");

    tracing::info!("training");
    let model = trainer.train(&crops, &labels)?;

    tracing::info!(path = %output_model_path.display(), "training done, saving model");
    model.save(output_model_path)?;

    Ok(TrainReport {
        samples: crops.len(),
        subjects,
    })
}
