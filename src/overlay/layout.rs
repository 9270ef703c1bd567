//! Detector-space to display-space geometry

use crate::config::OverlaySettings;
use crate::vision::BoundingBox;

use super::state::OverlayState;

/// Axis-aligned rectangle in display pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl DisplayRect {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// Scale a normalized box to a display of `display_size` (width, height)
pub fn normalized_to_display(bbox: &BoundingBox, display_size: (f32, f32)) -> DisplayRect {
    DisplayRect {
        left: bbox.x1 * display_size.0,
        top: bbox.y1 * display_size.1,
        right: bbox.x2 * display_size.0,
        bottom: bbox.y2 * display_size.1,
    }
}

/// Where a label is drawn relative to its box
#[derive(Debug, Clone, PartialEq)]
pub struct LabelPlacement {
    pub text: String,
    /// Filled background behind the text
    pub background: DisplayRect,
    /// Text baseline origin (x, y)
    pub origin: (f32, f32),
}

/// Label anchored above the box's top-left corner
pub fn place_label(rect: &DisplayRect, text: &str, text_size: (f32, f32), padding: f32) -> LabelPlacement {
    let (text_width, text_height) = text_size;
    let background_top = rect.top - (text_height + padding * 2.0);

    LabelPlacement {
        text: text.to_string(),
        background: DisplayRect {
            left: rect.left,
            top: background_top,
            right: rect.left + text_width + padding,
            bottom: rect.top - padding,
        },
        origin: (rect.left + padding / 2.0, background_top + text_height + padding),
    }
}

/// One box ready to draw
#[derive(Debug, Clone, PartialEq)]
pub struct BoxOverlay {
    pub rect: DisplayRect,
    pub label: Option<LabelPlacement>,
}

/// Lay out every overlay entry for a display.
///
/// `measure` returns the (width, height) of a label string in display pixels.
pub fn layout_overlay<F>(
    state: &OverlayState,
    display_size: (f32, f32),
    settings: &OverlaySettings,
    measure: F,
) -> Vec<BoxOverlay>
where
    F: Fn(&str) -> (f32, f32),
{
    state
        .entries()
        .map(|(bbox, label)| {
            let rect = normalized_to_display(bbox, display_size);
            let label = label.map(|text| place_label(&rect, text, measure(text), settings.label_padding));
            BoxOverlay { rect, label }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_to_display() {
        let bbox = BoundingBox::new(0.1, 0.2, 0.3, 0.4);
        let rect = normalized_to_display(&bbox, (1000.0, 500.0));

        assert!((rect.left - 100.0).abs() < 0.001);
        assert!((rect.top - 100.0).abs() < 0.001);
        assert!((rect.width() - 200.0).abs() < 0.001);
        assert!((rect.height() - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_label_sits_above_box() {
        let rect = DisplayRect { left: 100.0, top: 200.0, right: 300.0, bottom: 260.0 };
        let label = place_label(&rect, "A123BC", (90.0, 40.0), 12.0);

        assert!((label.background.top - 136.0).abs() < 0.001);
        assert!((label.background.bottom - 188.0).abs() < 0.001);
        assert!((label.background.right - 202.0).abs() < 0.001);
        assert_eq!(label.origin, (106.0, 188.0));
    }

    #[test]
    fn test_layout_only_labels_attached_boxes() {
        let mut state = OverlayState::default();
        let a = BoundingBox::new(0.1, 0.5, 0.2, 0.6);
        let b = BoundingBox::new(0.5, 0.5, 0.7, 0.6);
        state.reconcile(&[a.clone(), b]);
        state.attach_text(&a, "A123BC");

        let overlays = layout_overlay(&state, (100.0, 100.0), &OverlaySettings::default(), |t| {
            (t.chars().count() as f32 * 6.0, 10.0)
        });

        assert_eq!(overlays.len(), 2);
        assert_eq!(overlays[0].label.as_ref().map(|l| l.text.as_str()), Some("A123BC"));
        assert!(overlays[1].label.is_none());
    }
}
