//! Overlay reconciliation
//!
//! Keeps the boxes on screen in step with the latest detection pass and
//! holds the text attached to each of them. Keys are compared by value, so a
//! box that reappears with identical coordinates keeps its label.

use std::collections::{HashMap, HashSet};

use crate::vision::BoundingBox;

/// Current boxes and the text attached to them.
///
/// Every labelled box is always one of `boxes`.
#[derive(Debug, Clone, Default)]
pub struct OverlayState {
    boxes: Vec<BoundingBox>,
    labels: HashMap<BoundingBox, String>,
}

impl OverlayState {
    /// Replace the box set with `boxes`, dropping labels of boxes that left.
    ///
    /// Returns `false` when the new set equals the current one.
    pub fn reconcile(&mut self, boxes: &[BoundingBox]) -> bool {
        if self.boxes.as_slice() == boxes {
            return false;
        }

        let current: HashSet<&BoundingBox> = boxes.iter().collect();
        self.labels.retain(|bbox, _| current.contains(bbox));
        self.boxes = boxes.to_vec();
        true
    }

    /// Remove every box and label. Returns `false` if already empty.
    pub fn clear(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }
        self.boxes.clear();
        self.labels.clear();
        true
    }

    /// Whether `bbox` is part of the current box set
    pub fn is_current(&self, bbox: &BoundingBox) -> bool {
        self.boxes.contains(bbox)
    }

    /// Attach text to a current box. Text for boxes no longer on screen is
    /// discarded and `false` is returned.
    pub fn attach_text(&mut self, bbox: &BoundingBox, text: impl Into<String>) -> bool {
        if !self.is_current(bbox) {
            return false;
        }
        self.labels.insert(bbox.clone(), text.into());
        true
    }

    pub fn label(&self, bbox: &BoundingBox) -> Option<&str> {
        self.labels.get(bbox).map(String::as_str)
    }

    /// Boxes paired with their labels, in detector order
    pub fn entries(&self) -> impl Iterator<Item = (&BoundingBox, Option<&str>)> {
        self.boxes.iter().map(|bbox| (bbox, self.label(bbox)))
    }

    pub fn labelled_count(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}
