use crate::{
    config::AnnotationConfig,
    detection::{BoundingBox, Detection},
    error::DetectionError,
    glyphs::{self, GLYPH_ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH},
    labels::ClassLabels,
};
use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_hollow_rect_mut, draw_text_mut},
    rect::Rect,
};
use std::path::Path;

pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
/// Gap between the top edge of a box and the bottom of its label.
pub const LABEL_OFFSET: i32 = 10;

const BOX_THICKNESS: i32 = 2;
const BITMAP_SCALE: u32 = 2;
const FONT_SCALE: f32 = 22.;

enum LabelFont {
    Bitmap,
    Vector(FontVec),
}

pub struct Annotator {
    font: LabelFont,
    palette: ClassLabels,
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new()
    }
}

impl Annotator {
    /// Labels are drawn with the built-in 5x7 bitmap font.
    pub fn new() -> Self {
        Self {
            font: LabelFont::Bitmap,
            palette: ClassLabels::default(),
        }
    }

    pub fn from_config(config: &AnnotationConfig) -> Result<Self, DetectionError> {
        match &config.font_path {
            Some(path) => Self::with_font_file(path),
            None => Ok(Self::new()),
        }
    }

    pub fn with_font_file(path: &Path) -> Result<Self, DetectionError> {
        if !path.exists() {
            return Err(DetectionError::FileNotFound(path.to_path_buf()));
        }
        let data = std::fs::read(path)?;
        let font = FontVec::try_from_vec(data).map_err(|e| DetectionError::Font(e.to_string()))?;
        tracing::debug!("Using label font {:?}", path);
        Ok(Self {
            font: LabelFont::Vector(font),
            palette: ClassLabels::default(),
        })
    }

    /// Box colours come from the label mapping; labels it does not know are drawn green.
    pub fn with_palette(mut self, palette: ClassLabels) -> Self {
        self.palette = palette;
        self
    }

    /// Draws every detection in order and hands the buffer back.
    ///
    /// Coordinates are not checked: anything outside the image is clipped, inverted
    /// boxes are drawn between their corners. See [`Annotator::annotate_checked`].
    pub fn annotate(&self, mut image: RgbImage, detections: &[Detection]) -> RgbImage {
        for detection in detections {
            let color = self.palette.color_of(&detection.label);
            draw_box(&mut image, &detection.bounding_box, color);

            let (x, bottom) = label_anchor(&detection.bounding_box);
            let text = label_text(detection);
            match &self.font {
                LabelFont::Bitmap => draw_bitmap_text(&mut image, x, bottom, &text, TEXT_COLOR),
                LabelFont::Vector(font) => {
                    let scale = PxScale::from(FONT_SCALE);
                    // Glyphs hang from the ascent line and never reach below the descent.
                    let line_height = font.as_scaled(scale).height().ceil() as i32;
                    let top = bottom.saturating_sub(line_height);
                    draw_text_mut(&mut image, TEXT_COLOR, x, top, scale, font, &text);
                }
            }
        }
        image
    }

    pub fn annotate_checked(
        &self,
        image: RgbImage,
        detections: &[Detection],
    ) -> Result<RgbImage, DetectionError> {
        validate_geometry(detections, image.width(), image.height())?;
        Ok(self.annotate(image, detections))
    }
}

pub fn label_text(detection: &Detection) -> String {
    format!("{}: {:.2}", detection.label, detection.confidence)
}

/// Left end of the label baseline: aligned with `x1`, [`LABEL_OFFSET`] above `y1`.
pub fn label_anchor(bounding_box: &BoundingBox) -> (i32, i32) {
    (bounding_box.x1, bounding_box.y1.saturating_sub(LABEL_OFFSET))
}

pub fn validate_geometry(
    detections: &[Detection],
    width: u32,
    height: u32,
) -> Result<(), DetectionError> {
    match detections
        .iter()
        .find(|d| !d.bounding_box.fits_in(width, height))
    {
        Some(detection) => Err(DetectionError::InvalidGeometry {
            bounding_box: detection.bounding_box,
            width,
            height,
        }),
        None => Ok(()),
    }
}

fn draw_box(image: &mut RgbImage, bounding_box: &BoundingBox, color: Rgb<u8>) {
    // Anything further out than the stroke never reaches the canvas.
    let clamp_x = |v: i32| v.clamp(-BOX_THICKNESS, image.width() as i32 + BOX_THICKNESS);
    let clamp_y = |v: i32| v.clamp(-BOX_THICKNESS, image.height() as i32 + BOX_THICKNESS);
    let left = clamp_x(bounding_box.x1.min(bounding_box.x2));
    let right = clamp_x(bounding_box.x1.max(bounding_box.x2));
    let top = clamp_y(bounding_box.y1.min(bounding_box.y2));
    let bottom = clamp_y(bounding_box.y1.max(bounding_box.y2));

    for inset in 0..BOX_THICKNESS {
        let width = right - left - 2 * inset + 1;
        let height = bottom - top - 2 * inset + 1;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at(left + inset, top + inset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}

fn draw_bitmap_text(image: &mut RgbImage, x: i32, bottom: i32, text: &str, color: Rgb<u8>) {
    let (width, height) = (image.width() as i32, image.height() as i32);
    let top = bottom.saturating_sub((GLYPH_HEIGHT * BITMAP_SCALE) as i32);

    for (index, ch) in text.chars().enumerate() {
        let origin_x = x.saturating_add((index as u32 * GLYPH_ADVANCE * BITMAP_SCALE) as i32);
        if origin_x >= width {
            break;
        }
        let rows = glyphs::glyph(ch);
        for row in 0..GLYPH_HEIGHT {
            for col in 0..GLYPH_WIDTH {
                if !glyphs::is_set(&rows, col, row) {
                    continue;
                }
                for dy in 0..BITMAP_SCALE {
                    for dx in 0..BITMAP_SCALE {
                        let px = origin_x + (col * BITMAP_SCALE + dx) as i32;
                        let py = top + (row * BITMAP_SCALE + dy) as i32;
                        if px >= 0 && px < width && py >= 0 && py < height {
                            image.put_pixel(px as u32, py as u32, color);
                        }
                    }
                }
            }
        }
    }
}
