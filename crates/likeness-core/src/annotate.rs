//! Drawing recognized faces onto the output image.

use crate::types::BoundingBox;
use ab_glyph::FontArc;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::Path;
use thiserror::Error;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const BOX_THICKNESS: u32 = 2;
const TEXT_SCALE: f32 = 18.0;
/// Gap between the label's top edge and the face box.
const TEXT_OFFSET: i32 = 10;

/// DejaVu Sans, see `assets/DejaVuSans-LICENSE`.
static BUNDLED_FONT: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/DejaVuSans.ttf"
));

#[derive(Error, Debug)]
pub enum FontError {
    #[error("cannot read font {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid font {path}: {reason}")]
    Invalid { path: String, reason: String },
}

/// Draws face boxes and their labels.
pub struct Annotator {
    font: Option<FontArc>,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new()
    }
}

impl Annotator {
    /// Annotator using the bundled DejaVu Sans font.
    pub fn new() -> Self {
        let font = FontArc::try_from_slice(BUNDLED_FONT)
            .map_err(|e| tracing::warn!(error = %e, "bundled font unusable, drawing boxes only"))
            .ok();
        Self { font }
    }

    /// Annotator that draws boxes only.
    pub fn without_text() -> Self {
        Self { font: None }
    }

    /// Load a TrueType/OpenType font for label text.
    pub fn with_font_file(path: &Path) -> Result<Self, FontError> {
        let bytes = std::fs::read(path).map_err(|source| FontError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let font = FontArc::try_from_vec(bytes).map_err(|e| FontError::Invalid {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        tracing::info!(path = %path.display(), "loaded annotation font");
        Ok(Self { font: Some(font) })
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw a green box around `face` and `text` in yellow just above it.
    pub fn draw(&self, image: &mut RgbImage, face: &BoundingBox, text: &str) {
        for t in 0..BOX_THICKNESS {
            let (Some(w), Some(h)) = (
                face.width.checked_sub(2 * t),
                face.height.checked_sub(2 * t),
            ) else {
                break;
            };
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at(face.x + t as i32, face.y + t as i32).of_size(w, h);
            draw_hollow_rect_mut(image, rect, BOX_COLOR);
        }

        if let Some(font) = &self.font {
            let (x, y) = text_origin(face);
            draw_text_mut(image, TEXT_COLOR, x, y, TEXT_SCALE, font, text);
        }
    }
}

/// Top-left corner of a face's label, kept inside the top edge of the image.
pub fn text_origin(face: &BoundingBox) -> (i32, i32) {
    (face.x, (face.y - TEXT_OFFSET).max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Text blended onto black: equal red and green, no blue.
    fn is_text(p: &Rgb<u8>) -> bool {
        p[0] > 0 && p[0] == p[1] && p[2] == 0
    }

    #[test]
    fn test_text_origin_clamped_to_top() {
        assert_eq!(text_origin(&BoundingBox::new(40, 50, 10, 10)), (40, 40));
        assert_eq!(text_origin(&BoundingBox::new(40, 4, 10, 10)), (40, 0));
    }

    #[test]
    fn test_draw_box_outline() {
        let mut image = RgbImage::new(100, 100);
        let face = BoundingBox::new(10, 20, 30, 30);
        Annotator::without_text().draw(&mut image, &face, "Lauren - 10.00");

        assert_eq!(*image.get_pixel(10, 20), BOX_COLOR);
        assert_eq!(*image.get_pixel(11, 35), BOX_COLOR);
        assert_eq!(*image.get_pixel(39, 49), BOX_COLOR);
        assert_eq!(*image.get_pixel(25, 35), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(9, 20), Rgb([0, 0, 0]));
        // Boxes only: no text pixels anywhere.
        assert!(!image.pixels().any(is_text));
    }

    #[test]
    fn test_draw_tiny_and_overhanging_boxes() {
        let mut image = RgbImage::new(20, 20);
        let annotator = Annotator::without_text();
        annotator.draw(&mut image, &BoundingBox::new(5, 5, 2, 2), "x");
        assert_eq!(*image.get_pixel(5, 5), BOX_COLOR);
        assert_eq!(*image.get_pixel(6, 6), BOX_COLOR);

        annotator.draw(&mut image, &BoundingBox::new(-5, -5, 20, 20), "x");
        assert_eq!(*image.get_pixel(14, 10), BOX_COLOR);
        assert_eq!(*image.get_pixel(10, 10), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_default_annotator_draws_label_text() {
        let annotator = Annotator::new();
        assert!(annotator.has_font());

        let mut image = RgbImage::new(200, 120);
        let face = BoundingBox::new(20, 40, 60, 60);
        annotator.draw(&mut image, &face, "Lauren - 45.50");

        // Text starts at text_origin and extends right and down from it.
        let (x0, y0) = text_origin(&face);
        let yellow = image
            .enumerate_pixels()
            .filter(|(_, _, p)| is_text(p))
            .map(|(x, y, _)| (x as i32, y as i32))
            .collect::<Vec<_>>();
        assert!(!yellow.is_empty());
        assert!(yellow.iter().all(|&(x, y)| x >= x0 - 1 && y >= y0 - 1));
        assert!(yellow.iter().any(|&(_, y)| y < face.y));
    }

    #[test]
    fn test_font_file_override() {
        let path = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/DejaVuSans.ttf"));
        let annotator = Annotator::with_font_file(path).unwrap();

        let mut image = RgbImage::new(200, 60);
        annotator.draw(&mut image, &BoundingBox::new(0, 30, 100, 20), "Frank - 12.00");
        assert!(image.pixels().any(is_text));
    }

    #[test]
    fn test_invalid_font_file() {
        let path = std::env::temp_dir().join(format!("likeness-{}-bad.ttf", std::process::id()));
        std::fs::write(&path, b"not a font").unwrap();
        let err = Annotator::with_font_file(&path).err().unwrap();
        assert!(matches!(err, FontError::Invalid { .. }));
    }

    #[test]
    fn test_missing_font_file() {
        let err = Annotator::with_font_file(Path::new("/nonexistent/font.ttf"))
            .err()
            .unwrap();
        assert!(matches!(err, FontError::Io { .. }));
    }
}
