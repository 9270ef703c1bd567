//! Annotated frame snapshots
//!
//! Draws the overlay onto a copy of the analyzed frame and saves it as PNG.
//! Used by offline replays to inspect what the overlay would show. Box text
//! is only drawn when a font is configured.

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::layout::{layout_overlay, DisplayRect};
use super::state::OverlayState;
use crate::config::OverlaySettings;

const BOX_COLOR: Rgba<u8> = Rgba([0, 200, 83, 255]);
const LABEL_BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);
const LABEL_TEXT: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Writes annotated frames into a directory
pub struct SnapshotWriter {
    dir: PathBuf,
    settings: OverlaySettings,
    font: Option<FontVec>,
}

impl SnapshotWriter {
    pub fn new(dir: &Path, settings: OverlaySettings) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create snapshot directory {:?}", dir))?;

        let font = match &settings.font_path {
            Some(path) => {
                let data = std::fs::read(path)
                    .with_context(|| format!("Failed to read font {:?}", path))?;
                let font = FontVec::try_from_vec(data)
                    .map_err(|_| anyhow!("Failed to parse font {:?}", path))?;
                info!("Loaded snapshot font {:?}", path);
                Some(font)
            }
            None => {
                debug!("No snapshot font configured, box text will be skipped");
                None
            }
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            settings,
            font,
        })
    }

    /// Render `overlay` over `image`
    pub fn render(&self, image: &RgbaImage, overlay: &OverlayState) -> RgbaImage {
        let mut canvas = image.clone();
        let display_size = (canvas.width() as f32, canvas.height() as f32);
        let scale = PxScale::from(self.settings.label_text_height);

        let measure = |text: &str| match &self.font {
            Some(font) => {
                let (width, height) = text_size(scale, font, text);
                (width as f32, height as f32)
            }
            None => (0.0, scale.y),
        };

        for entry in layout_overlay(overlay, display_size, &self.settings, measure) {
            for inset in 0..self.settings.box_thickness.max(1) {
                if let Some(rect) = to_rect(&entry.rect, inset as f32) {
                    draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
                }
            }

            let (Some(font), Some(label)) = (&self.font, &entry.label) else {
                continue;
            };
            if let Some(rect) = to_rect(&label.background, 0.0) {
                draw_filled_rect_mut(&mut canvas, rect, LABEL_BACKGROUND);
            }
            // Layout origin is the baseline; imageproc positions text by its top
            let (x, baseline) = label.origin;
            draw_text_mut(
                &mut canvas,
                LABEL_TEXT,
                x.round() as i32,
                (baseline - scale.y).round() as i32,
                scale,
                font,
                &label.text,
            );
        }

        canvas
    }

    /// Render and save as `frame_<sequence>.png`
    pub fn write(&self, sequence: u64, image: &RgbaImage, overlay: &OverlayState) -> Result<PathBuf> {
        let path = self.dir.join(format!("frame_{:06}.png", sequence));
        self.render(image, overlay)
            .save(&path)
            .with_context(|| format!("Failed to write snapshot {:?}", path))?;
        debug!("Wrote snapshot {:?}", path);
        Ok(path)
    }
}

/// Convert a display rectangle shrunk by `inset` into an imageproc rect
fn to_rect(rect: &DisplayRect, inset: f32) -> Option<Rect> {
    let width = (rect.width() - inset * 2.0).round();
    let height = (rect.height() - inset * 2.0).round();
    if width < 1.0 || height < 1.0 {
        return None;
    }
    Some(
        Rect::at((rect.left + inset).round() as i32, (rect.top + inset).round() as i32)
            .of_size(width as u32, height as u32),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::BoundingBox;
    use tempfile::tempdir;

    #[test]
    fn test_render_draws_box_outline() {
        let dir = tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path(), OverlaySettings::default()).unwrap();

        let mut overlay = OverlayState::default();
        overlay.reconcile(&[BoundingBox::new(0.2, 0.2, 0.8, 0.8)]);

        let image = RgbaImage::new(100, 100);
        let canvas = writer.render(&image, &overlay);

        assert_eq!(*canvas.get_pixel(20, 50), BOX_COLOR);
        assert_eq!(*canvas.get_pixel(50, 50), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn test_labels_skipped_without_font() {
        let dir = tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path(), OverlaySettings::default()).unwrap();

        let bbox = BoundingBox::new(0.2, 0.6, 0.8, 0.9);
        let mut overlay = OverlayState::default();
        overlay.reconcile(&[bbox.clone()]);
        overlay.attach_text(&bbox, "A123BC");

        let canvas = writer.render(&RgbaImage::new(100, 100), &overlay);

        // Background would span y = -14..48 above the box
        assert_eq!(*canvas.get_pixel(30, 30), Rgba([0, 0, 0, 0]));
        assert_eq!(*canvas.get_pixel(20, 70), BOX_COLOR);
    }

    #[test]
    fn test_missing_font_is_an_error() {
        let dir = tempdir().unwrap();
        let settings = OverlaySettings {
            font_path: Some(dir.path().join("missing.ttf")),
            ..OverlaySettings::default()
        };
        assert!(SnapshotWriter::new(dir.path(), settings).is_err());
    }

    #[test]
    fn test_write_creates_png() {
        let dir = tempdir().unwrap();
        let writer = SnapshotWriter::new(dir.path(), OverlaySettings::default()).unwrap();

        let path = writer.write(3, &RgbaImage::new(8, 8), &OverlayState::default()).unwrap();
        assert!(path.ends_with("frame_000003.png"));
        assert!(path.exists());
    }

    #[test]
    fn test_to_rect_rejects_degenerate() {
        let rect = DisplayRect { left: 0.0, top: 0.0, right: 0.4, bottom: 10.0 };
        assert!(to_rect(&rect, 0.0).is_none());
    }
}
