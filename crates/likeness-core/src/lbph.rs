//! Local Binary Pattern Histogram (LBPH) recognizer.
//!
//! Each crop is turned into a circular LBP code image, split into a grid of
//! cells, and described by the concatenation of per-cell code histograms
//! (each normalized by the cell's pixel count). Prediction is nearest
//! neighbour over all training histograms using the alternative chi-square
//! distance `Σ 2(a−b)²/(a+b)`, which yields the same units as the classic
//! OpenCV LBPH recognizer (a 90.0 threshold keeps its usual meaning).

use crate::recognizer::{FaceModel, ModelError, Trainer};
use crate::types::Prediction;
use chrono::{DateTime, Utc};
use image::GrayImage;
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

const LBPH_RADIUS: u32 = 1;
const LBPH_NEIGHBORS: u32 = 8;
const LBPH_GRID: u32 = 8;
const LBPH_MAX_NEIGHBORS: u32 = 16;
const LBPH_FORMAT_VERSION: u32 = 2;
// Interpolated neighbours within this many grey levels of the centre count as equal.
const LBPH_TOLERANCE: f32 = 1e-3;

/// LBP operator and grid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LbphParams {
    pub radius: u32,
    pub neighbors: u32,
    pub grid_x: u32,
    pub grid_y: u32,
}

impl Default for LbphParams {
    fn default() -> Self {
        Self {
            radius: LBPH_RADIUS,
            neighbors: LBPH_NEIGHBORS,
            grid_x: LBPH_GRID,
            grid_y: LBPH_GRID,
        }
    }
}

impl LbphParams {
    /// Histogram bins per grid cell.
    pub fn bins(&self) -> usize {
        1usize << self.neighbors
    }

    /// Length of a full spatial histogram.
    pub fn histogram_len(&self) -> usize {
        self.bins() * (self.grid_x * self.grid_y) as usize
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.radius == 0 {
            return Err(ModelError::Invalid("LBP radius must be > 0".into()));
        }
        if self.neighbors == 0 || self.neighbors > LBPH_MAX_NEIGHBORS {
            return Err(ModelError::Invalid(format!(
                "LBP neighbors must be in 1..={LBPH_MAX_NEIGHBORS}, got {}",
                self.neighbors
            )));
        }
        if self.grid_x == 0 || self.grid_y == 0 {
            return Err(ModelError::Invalid("LBPH grid must be at least 1x1".into()));
        }
        Ok(())
    }
}

/// Trains [`LbphModel`]s.
#[derive(Debug, Clone, Default)]
pub struct LbphTrainer {
    params: LbphParams,
}

impl LbphTrainer {
    pub fn new(params: LbphParams) -> Self {
        Self { params }
    }
}

impl Trainer for LbphTrainer {
    type Model = LbphModel;

    fn train(&self, crops: &[GrayImage], labels: &[i32]) -> Result<LbphModel, ModelError> {
        self.params.validate()?;
        if crops.len() != labels.len() {
            return Err(ModelError::LengthMismatch {
                images: crops.len(),
                labels: labels.len(),
            });
        }
        let Some(first) = crops.first() else {
            return Err(ModelError::EmptyTrainingSet);
        };
        let crop_size = first.dimensions();
        if let Some(odd) = crops.iter().find(|c| c.dimensions() != crop_size) {
            return Err(crop_size_error(odd, crop_size));
        }

        let histograms = crops
            .iter()
            .map(|crop| describe(crop, &self.params))
            .collect();

        Ok(LbphModel {
            version: LBPH_FORMAT_VERSION,
            params: self.params,
            trained_at: Utc::now(),
            crop_size,
            labels: labels.to_vec(),
            histograms,
        })
    }
}

/// A trained LBPH model. Serialized as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LbphModel {
    version: u32,
    params: LbphParams,
    trained_at: DateTime<Utc>,
    /// Width and height of every training crop; queries must match.
    crop_size: (u32, u32),
    labels: Vec<i32>,
    histograms: Vec<Vec<f32>>,
}

impl LbphModel {
    /// Load a model written by [`FaceModel::save`].
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let display = path.display().to_string();
        if !path.exists() {
            return Err(ModelError::ModelNotFound(display));
        }

        let file = File::open(path).map_err(|source| ModelError::Io {
            path: display.clone(),
            source,
        })?;
        let model: LbphModel =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| ModelError::Format {
                path: display.clone(),
                source,
            })?;
        model.check()?;

        tracing::info!(
            path = %path.display(),
            samples = model.labels.len(),
            trained_at = %model.trained_at,
            crop_width = model.crop_size.0,
            crop_height = model.crop_size.1,
            "loaded LBPH model"
        );
        Ok(model)
    }

    pub fn params(&self) -> &LbphParams {
        &self.params
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn crop_size(&self) -> (u32, u32) {
        self.crop_size
    }

    pub fn sample_count(&self) -> usize {
        self.labels.len()
    }

    fn check(&self) -> Result<(), ModelError> {
        if self.version != LBPH_FORMAT_VERSION {
            return Err(ModelError::Invalid(format!(
                "unsupported LBPH format version {}",
                self.version
            )));
        }
        self.params.validate()?;
        if self.crop_size.0 == 0 || self.crop_size.1 == 0 {
            return Err(ModelError::Invalid(format!(
                "crop size {}x{} is empty",
                self.crop_size.0, self.crop_size.1
            )));
        }
        if self.labels.len() != self.histograms.len() {
            return Err(ModelError::Invalid(format!(
                "{} labels but {} histograms",
                self.labels.len(),
                self.histograms.len()
            )));
        }
        let expected = self.params.histogram_len();
        if let Some(bad) = self.histograms.iter().position(|h| h.len() != expected) {
            return Err(ModelError::Invalid(format!(
                "histogram {bad} has {} bins, expected {expected}",
                self.histograms[bad].len()
            )));
        }
        Ok(())
    }

    fn write_json(&self, tmp: &Path, display: &str) -> Result<(), ModelError> {
        let io_err = |source: std::io::Error| ModelError::Io {
            path: display.to_string(),
            source,
        };

        let mut writer = BufWriter::new(File::create(tmp).map_err(io_err)?);
        serde_json::to_writer(&mut writer, self).map_err(|source| ModelError::Format {
            path: display.to_string(),
            source,
        })?;
        writer.flush().map_err(io_err)
    }
}

impl FaceModel for LbphModel {
    fn predict(&self, crop: &GrayImage) -> Result<Prediction, ModelError> {
        if crop.dimensions() != self.crop_size {
            return Err(crop_size_error(crop, self.crop_size));
        }
        let query = describe(crop, &self.params);

        let mut best: Option<Prediction> = None;
        for (label, hist) in self.labels.iter().zip(&self.histograms) {
            let distance = chi_square(hist, &query);
            if best.map_or(true, |b| distance < b.distance) {
                best = Some(Prediction {
                    label: *label,
                    distance,
                });
            }
        }

        best.ok_or(ModelError::Untrained)
    }

    /// Writes to a sibling `.tmp` file, then renames it over `path`.
    fn save(&self, path: &Path) -> Result<(), ModelError> {
        let display = path.display().to_string();
        let tmp = path.with_extension("tmp");

        let written = self
            .write_json(&tmp, &display)
            .and_then(|()| {
                std::fs::rename(&tmp, path).map_err(|source| ModelError::Io {
                    path: display.clone(),
                    source,
                })
            });
        if written.is_err() {
            let _ = std::fs::remove_file(&tmp);
        }
        written?;

        tracing::info!(path = %path.display(), samples = self.labels.len(), "saved LBPH model");
        Ok(())
    }
}

fn crop_size_error(crop: &GrayImage, expected: (u32, u32)) -> ModelError {
    let (expected_width, expected_height) = expected;
    ModelError::CropSize {
        width: crop.width(),
        height: crop.height(),
        expected_width,
        expected_height,
    }
}

/// Spatial LBP histogram of one crop.
fn describe(crop: &GrayImage, params: &LbphParams) -> Vec<f32> {
    let codes = lbp_codes(crop, params.radius, params.neighbors);
    spatial_histogram(&codes, params)
}

/// Circular (extended) LBP with bilinear sampling of the neighbour ring.
///
/// The output is `2 * radius` smaller than the input on each axis.
fn lbp_codes(gray: &GrayImage, radius: u32, neighbors: u32) -> Array2<u32> {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let r = radius as usize;
    if w <= 2 * r || h <= 2 * r {
        return Array2::zeros((0, 0));
    }

    let px = |y: isize, x: isize| gray.get_pixel(x as u32, y as u32)[0] as f32;
    let mut codes = Array2::<u32>::zeros((h - 2 * r, w - 2 * r));

    for n in 0..neighbors {
        let angle = 2.0 * PI * n as f32 / neighbors as f32;
        let sx = radius as f32 * angle.cos();
        let sy = -(radius as f32) * angle.sin();

        let (fx, fy) = (sx.floor(), sy.floor());
        let (cx, cy) = (sx.ceil(), sy.ceil());
        let (tx, ty) = (sx - fx, sy - fy);
        let w1 = (1.0 - tx) * (1.0 - ty);
        let w2 = tx * (1.0 - ty);
        let w3 = (1.0 - tx) * ty;
        let w4 = tx * ty;
        let (fx, fy, cx, cy) = (fx as isize, fy as isize, cx as isize, cy as isize);

        for i in r..h - r {
            for j in r..w - r {
                let (yi, xj) = (i as isize, j as isize);
                let t = w1 * px(yi + fy, xj + fx)
                    + w2 * px(yi + fy, xj + cx)
                    + w3 * px(yi + cy, xj + fx)
                    + w4 * px(yi + cy, xj + cx);
                let center = px(yi, xj);
                if t >= center - LBPH_TOLERANCE {
                    codes[[i - r, j - r]] |= 1u32 << n;
                }
            }
        }
    }

    codes
}

/// Concatenated per-cell histograms, each normalized by the cell's pixel count.
///
/// Trailing rows/columns that don't fill a whole cell are ignored.
fn spatial_histogram(codes: &Array2<u32>, params: &LbphParams) -> Vec<f32> {
    let bins = params.bins();
    let (grid_x, grid_y) = (params.grid_x as usize, params.grid_y as usize);
    let mut hist = vec![0.0f32; params.histogram_len()];

    let (rows, cols) = codes.dim();
    let (cell_w, cell_h) = (cols / grid_x, rows / grid_y);
    if cell_w == 0 || cell_h == 0 {
        return hist;
    }
    let total = (cell_w * cell_h) as f32;

    for gy in 0..grid_y {
        for gx in 0..grid_x {
            let cell = codes.slice(s![
                gy * cell_h..(gy + 1) * cell_h,
                gx * cell_w..(gx + 1) * cell_w
            ]);
            let offset = (gy * grid_x + gx) * bins;
            for &code in cell.iter() {
                hist[offset + code as usize] += 1.0;
            }
            for v in &mut hist[offset..offset + bins] {
                *v /= total;
            }
        }
    }

    hist
}

/// Alternative chi-square distance between two histograms.
fn chi_square(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&a, &b)| {
            let (a, b) = (a as f64, b as f64);
            let sum = a + b;
            if sum > f64::EPSILON {
                2.0 * (a - b).powi(2) / sum
            } else {
                0.0
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn ramp(horizontal: bool, offset: u8) -> GrayImage {
        GrayImage::from_fn(64, 64, |x, y| {
            let t = if horizontal { x } else { y };
            Luma([offset.saturating_add((t * 2) as u8)])
        })
    }

    fn scratch_path(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("likeness-lbph-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn test_histogram_len_defaults() {
        let p = LbphParams::default();
        assert_eq!(p.bins(), 256);
        assert_eq!(p.histogram_len(), 256 * 64);
    }

    #[test]
    fn test_lbp_flat_image_sets_every_bit() {
        let flat = GrayImage::from_pixel(10, 10, Luma([77]));
        let codes = lbp_codes(&flat, 1, 8);
        assert_eq!(codes.dim(), (8, 8));
        assert!(codes.iter().all(|&c| c == 0xFF));
    }

    #[test]
    fn test_cell_histograms_normalized() {
        let img = ramp(true, 10);
        let hist = describe(&img, &LbphParams::default());
        for cell in hist.chunks(256) {
            let sum: f32 = cell.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4, "cell sums to {sum}");
        }
    }

    #[test]
    fn test_chi_square_identity_and_disjoint() {
        let a = vec![0.5, 0.5, 0.0];
        let b = vec![0.0, 0.0, 1.0];
        assert_eq!(chi_square(&a, &a), 0.0);
        // 2*0.25/0.5 + 2*0.25/0.5 + 2*1/1
        assert!((chi_square(&a, &b) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_predict_nearest_subject() {
        let crops = vec![ramp(true, 0), ramp(false, 0)];
        let model = LbphTrainer::default().train(&crops, &[3, 9]).unwrap();

        let p = model.predict(&ramp(true, 20)).unwrap();
        assert_eq!(p.label, 3);
        let p = model.predict(&ramp(false, 20)).unwrap();
        assert_eq!(p.label, 9);

        let exact = model.predict(&crops[0]).unwrap();
        assert_eq!(exact.distance, 0.0);
    }

    #[test]
    fn test_train_rejects_empty_and_mismatched() {
        let trainer = LbphTrainer::default();
        assert!(matches!(
            trainer.train(&[], &[]),
            Err(ModelError::EmptyTrainingSet)
        ));
        assert!(matches!(
            trainer.train(&[ramp(true, 0)], &[1, 2]),
            Err(ModelError::LengthMismatch { images: 1, labels: 2 })
        ));
    }

    #[test]
    fn test_train_rejects_mixed_crop_sizes() {
        let small = GrayImage::from_pixel(32, 64, Luma([0]));
        assert!(matches!(
            LbphTrainer::default().train(&[ramp(true, 0), small], &[1, 2]),
            Err(ModelError::CropSize {
                width: 32,
                height: 64,
                expected_width: 64,
                expected_height: 64
            })
        ));
    }

    #[test]
    fn test_predict_rejects_other_crop_size() {
        let model = LbphTrainer::default().train(&[ramp(true, 0)], &[1]).unwrap();
        assert_eq!(model.crop_size(), (64, 64));

        let larger = GrayImage::from_pixel(100, 100, Luma([50]));
        assert!(matches!(
            model.predict(&larger),
            Err(ModelError::CropSize { width: 100, expected_width: 64, .. })
        ));
    }

    #[test]
    fn test_train_rejects_bad_params() {
        let trainer = LbphTrainer::new(LbphParams {
            neighbors: 0,
            ..LbphParams::default()
        });
        assert!(matches!(
            trainer.train(&[ramp(true, 0)], &[1]),
            Err(ModelError::Invalid(_))
        ));
    }

    #[test]
    fn test_save_then_load_predicts_identically() {
        let crops = vec![ramp(true, 0), ramp(false, 0)];
        let model = LbphTrainer::default().train(&crops, &[0, 1]).unwrap();
        let path = scratch_path("roundtrip.json");
        model.save(&path).unwrap();

        let loaded = LbphModel::load(&path).unwrap();
        assert_eq!(loaded.sample_count(), 2);
        assert_eq!(loaded.params(), model.params());
        assert_eq!(loaded.crop_size(), (64, 64));
        let query = ramp(false, 40);
        assert_eq!(
            loaded.predict(&query).unwrap(),
            model.predict(&query).unwrap()
        );
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_load_rejects_truncated_histograms() {
        let mut model = LbphTrainer::default()
            .train(&[ramp(true, 0)], &[0])
            .unwrap();
        model.histograms[0].truncate(10);
        let path = scratch_path("truncated.json");
        std::fs::write(&path, serde_json::to_string(&model).unwrap()).unwrap();

        assert!(matches!(LbphModel::load(&path), Err(ModelError::Invalid(_))));
    }

    #[test]
    fn test_load_missing_and_garbage() {
        assert!(matches!(
            LbphModel::load(Path::new("/nonexistent/model.json")),
            Err(ModelError::ModelNotFound(_))
        ));

        let path = scratch_path("garbage.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(LbphModel::load(&path), Err(ModelError::Format { .. })));
    }
}
