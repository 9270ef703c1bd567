//! Box-to-pixel geometry and plate cropping

use image::{imageops, RgbaImage};

use super::detection::BoundingBox;
use crate::error::{PipelineError, PipelineResult};

/// Pixel-space rectangle derived from a normalized box
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl PixelRect {
    /// Project a normalized box onto an image of the given size.
    ///
    /// Returns `None` when the rounded width or height is not positive.
    pub fn from_box(bbox: &BoundingBox, image_width: u32, image_height: u32) -> Option<Self> {
        let w = image_width as f64;
        let h = image_height as f64;

        let rect = Self {
            x: (bbox.x1 as f64 * w).round() as i64,
            y: (bbox.y1 as f64 * h).round() as i64,
            width: (bbox.width() as f64 * w).round() as i64,
            height: (bbox.height() as f64 * h).round() as i64,
        };

        if rect.width <= 0 || rect.height <= 0 {
            return None;
        }

        Some(rect)
    }

    /// Whether the rectangle lies entirely inside the image
    pub fn fits_within(&self, image_width: u32, image_height: u32) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.x + self.width <= image_width as i64
            && self.y + self.height <= image_height as i64
    }
}

/// Crop the region covered by `bbox`.
///
/// Degenerate geometry yields `EmptyCrop`; a region reaching outside the
/// image yields `CropOutOfBounds`.
pub fn crop_box(image: &RgbaImage, bbox: &BoundingBox) -> PipelineResult<RgbaImage> {
    let (image_width, image_height) = image.dimensions();
    let rect = PixelRect::from_box(bbox, image_width, image_height).ok_or(PipelineError::EmptyCrop)?;

    if !rect.fits_within(image_width, image_height) {
        return Err(PipelineError::CropOutOfBounds {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            image_width,
            image_height,
        });
    }

    Ok(imageops::crop_imm(
        image,
        rect.x as u32,
        rect.y as u32,
        rect.width as u32,
        rect.height as u32,
    )
    .to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_pixel_rect_rounding() {
        let bbox = BoundingBox::new(0.1, 0.25, 0.5, 0.75);
        let rect = PixelRect::from_box(&bbox, 101, 40).unwrap();
        assert_eq!(rect, PixelRect { x: 10, y: 10, width: 40, height: 20 });
    }

    #[test]
    fn test_inverted_box_is_skipped() {
        let bbox = BoundingBox::new(0.5, 0.1, 0.4, 0.3);
        assert!(PixelRect::from_box(&bbox, 640, 480).is_none());

        let image = RgbaImage::new(640, 480);
        assert!(matches!(crop_box(&image, &bbox), Err(PipelineError::EmptyCrop)));
    }

    #[test]
    fn test_sub_pixel_box_is_skipped() {
        let bbox = BoundingBox::new(0.5, 0.5, 0.5001, 0.6);
        assert!(PixelRect::from_box(&bbox, 100, 100).is_none());
    }

    #[test]
    fn test_crop_out_of_bounds() {
        let image = RgbaImage::new(100, 100);
        let bbox = BoundingBox::new(0.8, 0.1, 1.2, 0.3);
        assert!(matches!(
            crop_box(&image, &bbox),
            Err(PipelineError::CropOutOfBounds { x: 80, width: 40, .. })
        ));
    }

    #[test]
    fn test_crop_contents() {
        let mut image = RgbaImage::new(10, 10);
        image.put_pixel(5, 5, Rgba([1, 2, 3, 255]));

        let bbox = BoundingBox::new(0.5, 0.5, 0.7, 0.8);
        let crop = crop_box(&image, &bbox).unwrap();

        assert_eq!(crop.dimensions(), (2, 3));
        assert_eq!(*crop.get_pixel(0, 0), Rgba([1, 2, 3, 255]));
    }
}
