//! Dataset preparation: raw photos → numbered, normalized face crops.

use crate::detector::{DetectorError, FaceDetector};
use crate::imaging;
use crate::types::DEFAULT_FACE_SIZE;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("cannot read directory {path}: {source}")]
    ReadDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot create directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot load image {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("cannot write face crop {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("face detection failed on {path}: {source}")]
    Detector {
        path: String,
        #[source]
        source: DetectorError,
    },
}

/// What to do with an input file that cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the whole run on the first unreadable file.
    #[default]
    Abort,
    /// Log it, record it in the report and continue.
    Skip,
}

#[derive(Debug, Clone)]
pub struct PrepareOptions {
    /// Side length of the written crops.
    pub face_size: u32,
    pub failure_policy: FailurePolicy,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            face_size: DEFAULT_FACE_SIZE,
            failure_policy: FailurePolicy::Abort,
        }
    }
}

/// Outcome of a [`prepare`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareReport {
    /// Input images that were decoded and scanned.
    pub images: usize,
    /// Crops written; they are named `0.jpg` .. `{faces - 1}.jpg`.
    pub faces: usize,
    /// Detections lying entirely outside their image. These get no crop and
    /// no index, so `faces + outside` is the total number of detections.
    pub outside: usize,
    /// Unreadable inputs passed over under [`FailurePolicy::Skip`].
    pub skipped: Vec<PathBuf>,
}

/// Regular files directly inside `dir`, sorted by file name.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let read_err = |source: std::io::Error| DatasetError::ReadDir {
        path: dir.display().to_string(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Detect every face in every image of `input_dir` and write each one, cropped
/// and resized to `face_size`×`face_size`, to `output_dir/{index}.jpg`.
///
/// Indices run from 0 across the whole run. Candidates are written as the
/// detector returned them: overlapping boxes are left for manual curation.
/// A box with no pixel inside its image cannot be cropped; it is counted in
/// [`PrepareReport::outside`] instead.
pub fn prepare<D: FaceDetector + ?Sized>(
    detector: &mut D,
    input_dir: &Path,
    output_dir: &Path,
    options: &PrepareOptions,
) -> Result<PrepareReport, DatasetError> {
    let files = list_files(input_dir)?;
    std::fs::create_dir_all(output_dir).map_err(|source| DatasetError::CreateDir {
        path: output_dir.display().to_string(),
        source,
    })?;

    tracing::info!(
        input = %input_dir.display(),
        output = %output_dir.display(),
        files = files.len(),
        face_size = options.face_size,
        "preparing training data"
    );

    let mut report = PrepareReport::default();

    for file in files {
        let gray = match imaging::load_gray(&file) {
            Ok(gray) => gray,
            Err(source) if options.failure_policy == FailurePolicy::Skip => {
                tracing::warn!(
                    path = %file.display(),
                    error = %source,
                    "skipping unreadable image"
                );
                report.skipped.push(file);
                continue;
            }
            Err(source) => {
                return Err(DatasetError::Load {
                    path: file.display().to_string(),
                    source,
                })
            }
        };
        report.images += 1;

        let faces = detector
            .detect(&gray)
            .map_err(|source| DatasetError::Detector {
                path: file.display().to_string(),
                source,
            })?;
        tracing::debug!(path = %file.display(), faces = faces.len(), "detected faces");

        for face in &faces {
            let Some(crop) = imaging::normalize_face(&gray, face, options.face_size) else {
                tracing::warn!(path = %file.display(), %face, "face box lies outside the image");
                report.outside += 1;
                continue;
            };

            let out = output_dir.join(format!("{}.jpg", report.faces));
            crop.save(&out).map_err(|source| DatasetError::Write {
                path: out.display().to_string(),
                source,
            })?;
            tracing::info!(path = %out.display(), "wrote face crop");
            report.faces += 1;
        }
    }

    tracing::info!(
        images = report.images,
        faces = report.faces,
        outside = report.outside,
        skipped = report.skipped.len(),
        "preparation done"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scratch_dir, write_gray, ScriptedDetector};
    use crate::types::BoundingBox;

    #[test]
    fn test_list_files_sorted_and_skips_dirs() {
        let dir = scratch_dir("dataset-list");
        std::fs::write(dir.join("b.txt"), "b").unwrap();
        std::fs::write(dir.join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.join("sub")).unwrap();

        let files = list_files(&dir).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_list_files_missing_dir() {
        let err = list_files(Path::new("/nonexistent/raw")).unwrap_err();
        assert!(matches!(err, DatasetError::ReadDir { .. }));
    }

    #[test]
    fn test_prepare_writes_every_detection() {
        let root = scratch_dir("dataset-prepare");
        let input = root.join("raw");
        let output = root.join("detected");
        std::fs::create_dir_all(&input).unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            write_gray(&input.join(name), 200, 160, 90);
        }

        // Per-image detection counts: 2, 0, 3 (overlaps are not filtered here).
        let mut detector = ScriptedDetector::new(vec![
            vec![BoundingBox::new(0, 0, 50, 50), BoundingBox::new(10, 10, 20, 20)],
            vec![],
            vec![
                BoundingBox::new(100, 50, 80, 80),
                BoundingBox::new(0, 0, 30, 30),
                BoundingBox::new(0, 0, 30, 30),
            ],
        ]);

        let report = prepare(&mut detector, &input, &output, &PrepareOptions::default()).unwrap();
        assert_eq!(detector.calls, 3);
        assert_eq!(report.images, 3);
        assert_eq!(report.faces, 5);
        assert_eq!(report.outside, 0);
        assert!(report.skipped.is_empty());

        let mut written = list_files(&output).unwrap();
        assert_eq!(written.len(), 5);
        written.sort_by_key(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap()
        });
        for (i, path) in written.iter().enumerate() {
            assert_eq!(path.file_name().unwrap().to_str().unwrap(), format!("{i}.jpg"));
            let crop = image::open(path).unwrap();
            assert_eq!((crop.width(), crop.height()), (100, 100));
        }
    }

    #[test]
    fn test_prepare_counts_boxes_outside_image() {
        let root = scratch_dir("dataset-outside");
        let input = root.join("raw");
        let output = root.join("detected");
        std::fs::create_dir_all(&input).unwrap();
        write_gray(&input.join("a.png"), 100, 100, 60);

        let mut detector = ScriptedDetector::new(vec![vec![
            BoundingBox::new(0, 0, 40, 40),
            BoundingBox::new(300, 300, 40, 40),
            BoundingBox::new(60, 60, 40, 40),
        ]]);
        let report = prepare(&mut detector, &input, &output, &PrepareOptions::default()).unwrap();

        assert_eq!(report.faces, 2);
        assert_eq!(report.outside, 1);
        assert_eq!(report.faces + report.outside, 3);
        // The unusable box does not leave a gap in the numbering.
        assert!(output.join("0.jpg").exists());
        assert!(output.join("1.jpg").exists());
        assert!(!output.join("2.jpg").exists());
    }

    #[test]
    fn test_prepare_aborts_on_unreadable_file() {
        let root = scratch_dir("dataset-abort");
        let input = root.join("raw");
        std::fs::create_dir_all(&input).unwrap();
        write_gray(&input.join("a.png"), 64, 64, 10);
        std::fs::write(input.join("b.jpg"), b"definitely not a jpeg").unwrap();

        let mut detector = ScriptedDetector::repeating(vec![BoundingBox::new(0, 0, 32, 32)]);
        let err = prepare(&mut detector, &input, &root.join("out"), &PrepareOptions::default())
            .unwrap_err();
        assert!(matches!(err, DatasetError::Load { .. }), "{err}");
    }

    #[test]
    fn test_prepare_skip_policy_reports_unreadable_file() {
        let root = scratch_dir("dataset-skip");
        let input = root.join("raw");
        std::fs::create_dir_all(&input).unwrap();
        write_gray(&input.join("a.png"), 64, 64, 10);
        std::fs::write(input.join("b.jpg"), b"definitely not a jpeg").unwrap();
        write_gray(&input.join("c.png"), 64, 64, 200);

        let mut detector = ScriptedDetector::repeating(vec![BoundingBox::new(0, 0, 32, 32)]);
        let options = PrepareOptions {
            face_size: 24,
            failure_policy: FailurePolicy::Skip,
        };
        let report = prepare(&mut detector, &input, &root.join("out"), &options).unwrap();
        assert_eq!(detector.calls, 2);
        assert_eq!(report.images, 2);
        assert_eq!(report.faces, 2);
        assert_eq!(report.skipped, vec![input.join("b.jpg")]);

        let crop = image::open(root.join("out").join("1.jpg")).unwrap();
        assert_eq!((crop.width(), crop.height()), (24, 24));
    }
}
