//! OCR engine boundary
//!
//! Text recognition is an external collaborator that completes
//! asynchronously. Implementations report a reason string on failure.

use async_trait::async_trait;
use image::RgbaImage;

/// Asynchronous text recognizer for cropped plate images
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize the text in `image`, returning the engine's failure reason on error
    async fn recognize(&self, image: RgbaImage) -> Result<String, String>;
}

/// Flatten engine output to a single line.
///
/// Line breaks become spaces and the ends are trimmed. Returns `None` when
/// nothing is left.
pub fn clean_recognized_text(text: &str) -> Option<String> {
    let flattened = text.replace("\r\n", " ").replace('\n', " ");
    let trimmed = flattened.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
