//! Contact-sheet compositing for inspecting a prepared dataset.

use crate::dataset::{self, DatasetError};
use crate::imaging;
use image::GrayImage;
use std::path::Path;
use thiserror::Error;

/// Images per row when no column count is given.
pub const DEFAULT_COLUMNS: usize = 6;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("column count must be at least 1")]
    ZeroColumns,
    #[error("image {index} is {actual_width}x{actual_height}, expected {width}x{height}")]
    DimensionMismatch {
        index: usize,
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error(
        "{path} is {actual_width}x{actual_height}, expected {width}x{height} like the first image"
    )]
    FileDimensionMismatch {
        path: String,
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("cannot load image {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("cannot write grid {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Summary of a written grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridReport {
    pub images: usize,
    pub rows: usize,
    pub width: u32,
    pub height: u32,
}

/// Lay `images` out `columns` to a row, rows stacked top to bottom.
///
/// Every image must match the first one's size. A short last row is padded
/// with black on the right. Returns `None` for an empty input.
pub fn compose(images: &[GrayImage], columns: usize) -> Result<Option<GrayImage>, GridError> {
    if columns == 0 {
        return Err(GridError::ZeroColumns);
    }
    let Some(first) = images.first() else {
        return Ok(None);
    };

    let (width, height) = first.dimensions();
    if let Some((index, img)) = images
        .iter()
        .enumerate()
        .find(|(_, img)| img.dimensions() != (width, height))
    {
        return Err(GridError::DimensionMismatch {
            index,
            width,
            height,
            actual_width: img.width(),
            actual_height: img.height(),
        });
    }

    let rows: Vec<GrayImage> = images.chunks(columns).map(concat_horizontal).collect();
    Ok(Some(concat_vertical(&rows)))
}

fn concat_horizontal(images: &[GrayImage]) -> GrayImage {
    let width = images.iter().map(GrayImage::width).sum();
    let height = images.iter().map(GrayImage::height).max().unwrap_or(0);

    let mut row = GrayImage::new(width, height);
    let mut x = 0i64;
    for img in images {
        image::imageops::replace(&mut row, img, x, 0);
        x += img.width() as i64;
    }
    row
}

fn concat_vertical(rows: &[GrayImage]) -> GrayImage {
    let width = rows.iter().map(GrayImage::width).max().unwrap_or(0);
    let height = rows.iter().map(GrayImage::height).sum();

    let mut grid = GrayImage::new(width, height);
    let mut y = 0i64;
    for row in rows {
        image::imageops::replace(&mut grid, row, 0, y);
        y += row.height() as i64;
    }
    grid
}

/// Compose every image in `input_dir` (sorted by name) into a grid and write
/// it to `output_path`.
///
/// An empty directory writes nothing and returns `Ok(None)`.
pub fn stitch(
    input_dir: &Path,
    output_path: &Path,
    columns: usize,
) -> Result<Option<GridReport>, GridError> {
    if columns == 0 {
        return Err(GridError::ZeroColumns);
    }

    let files = dataset::list_files(input_dir)?;
    tracing::info!(images = files.len(), columns, "stitching images");

    let mut images: Vec<GrayImage> = Vec::with_capacity(files.len());
    for file in &files {
        let img = imaging::load_gray(file).map_err(|source| GridError::Load {
            path: file.display().to_string(),
            source,
        })?;

        if let Some(first) = images.first() {
            if img.dimensions() != first.dimensions() {
                return Err(GridError::FileDimensionMismatch {
                    path: file.display().to_string(),
                    width: first.width(),
                    height: first.height(),
                    actual_width: img.width(),
                    actual_height: img.height(),
                });
            }
        }
        images.push(img);
    }

    let Some(grid) = compose(&images, columns)? else {
        tracing::info!(input = %input_dir.display(), "no images to stitch, nothing written");
        return Ok(None);
    };

    let rows = images.len().div_ceil(columns);
    tracing::info!(rows, path = %output_path.display(), "writing grid");
    grid.save(output_path).map_err(|source| GridError::Write {
        path: output_path.display().to_string(),
        source,
    })?;

    Ok(Some(GridReport {
        images: images.len(),
        rows,
        width: grid.width(),
        height: grid.height(),
    }))
}
