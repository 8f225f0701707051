//! likeness-core — offline face recognition toolkit.
//!
//! Three batch stages turn raw photos into a trained model: [`dataset::prepare`]
//! crops every detected face, the crops are renamed by hand to
//! `{subject_id}_{n}.jpg`, and [`training::train`] fits a model on them.
//! [`pipeline::RecognitionPipeline`] then labels faces in new images.
//!
//! Detection runs through rustface (SeetaFace frontal cascade); recognition
//! uses a pure-Rust LBPH model. Both sit behind traits so either can be
//! swapped out.

pub mod annotate;
pub mod dataset;
pub mod detector;
pub mod geometry;
pub mod grid;
pub mod imaging;
pub mod labels;
pub mod lbph;
pub mod pipeline;
pub mod recognizer;
pub mod training;
pub mod types;

#[cfg(test)]
mod testing;

pub use detector::{DetectorParams, FaceDetector, RustfaceDetector};
pub use labels::LabelMap;
pub use lbph::{LbphModel, LbphTrainer};
pub use pipeline::RecognitionPipeline;
pub use recognizer::{FaceModel, Trainer};
pub use types::{BoundingBox, Prediction};
