//! Offline Replay
//!
//! Drives the pipeline from a JSON scenario instead of a live camera. A
//! scenario lists the frames to feed, the boxes a scripted detector reports
//! for each of them and the OCR response for each box.
//!
//! ```json
//! {
//!   "frames": [
//!     { "width": 640, "height": 480, "boxes": [{ "x1": 0.1, "y1": 0.4, "x2": 0.5, "y2": 0.6 }] },
//!     { "image": "street.png", "rotation": 90, "boxes": [] }
//!   ],
//!   "ocr": [
//!     { "bbox": { "x1": 0.1, "y1": 0.4, "x2": 0.5, "y2": 0.6 }, "text": "A123BC", "latency_ms": 40 }
//!   ]
//! }
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::capture::{FrameSource, RawFrame, Rotation};
use crate::vision::{BoundingBox, DetectionOutcome, Detector, NormalizedFrame, OcrEngine, PixelRect};

/// Fill value for frames without an image file
const SYNTHETIC_GRAY: u8 = 0x80;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub frames: Vec<ScenarioFrame>,
    #[serde(default)]
    pub ocr: Vec<ScriptedResponse>,
}

/// One camera frame of a scenario
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioFrame {
    /// Image file, relative to the scenario file
    #[serde(default)]
    pub image: Option<PathBuf>,
    /// Buffer size for a synthetic frame
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub rotation: Rotation,
    /// Overrides `camera.front_facing`
    #[serde(default)]
    pub front_facing: Option<bool>,
    /// What the detector reports for this frame
    #[serde(default)]
    pub boxes: Vec<BoundingBox>,
}

/// OCR answer for a box
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedResponse {
    pub bbox: BoundingBox,
    #[serde(default)]
    pub text: Option<String>,
    /// Failure reason; takes precedence over `text`
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub latency_ms: u64,
}

impl Scenario {
    /// Load a scenario file, resolving image paths against its directory
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario: {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_json(&content, base)
            .with_context(|| format!("Failed to parse scenario: {}", path.display()))
    }

    pub fn from_json(content: &str, base: &Path) -> Result<Self> {
        let mut scenario: Scenario = serde_json::from_str(content)?;
        for frame in &mut scenario.frames {
            if let Some(image) = &frame.image {
                if image.is_relative() {
                    frame.image = Some(base.join(image));
                }
            }
        }
        Ok(scenario)
    }

    /// Per-frame box lists for [`ScriptedDetector`]
    pub fn detections(&self) -> Vec<Vec<BoundingBox>> {
        self.frames.iter().map(|f| f.boxes.clone()).collect()
    }
}

impl ScenarioFrame {
    fn to_raw(&self, default_front_facing: bool) -> Result<RawFrame> {
        let front_facing = self.front_facing.unwrap_or(default_front_facing);

        let (data, width, height) = match &self.image {
            Some(path) => {
                let image = image::open(path)
                    .with_context(|| format!("Failed to open frame image: {}", path.display()))?
                    .to_rgba8();
                let (width, height) = image.dimensions();
                (image.into_raw(), width, height)
            }
            None => {
                let (Some(width), Some(height)) = (self.width, self.height) else {
                    bail!("Synthetic frame needs both width and height");
                };
                let mut data = vec![SYNTHETIC_GRAY; width as usize * height as usize * 4];
                for pixel in data.chunks_exact_mut(4) {
                    pixel[3] = 255;
                }
                (data, width, height)
            }
        };

        Ok(RawFrame::new(data, width, height, self.rotation, front_facing))
    }
}

/// Frame source backed by a scenario, all frames decoded up front
pub struct ScenarioSource {
    frames: VecDeque<RawFrame>,
    sizes: Vec<(u32, u32)>,
}

impl ScenarioSource {
    pub fn new(scenario: &Scenario, default_front_facing: bool) -> Result<Self> {
        let frames = scenario
            .frames
            .iter()
            .enumerate()
            .map(|(index, frame)| {
                frame
                    .to_raw(default_front_facing)
                    .with_context(|| format!("Scenario frame {}", index))
            })
            .collect::<Result<VecDeque<_>>>()?;

        let mut sizes = Vec::new();
        for frame in &frames {
            let size = if frame.rotation.swaps_axes() {
                (frame.height, frame.width)
            } else {
                (frame.width, frame.height)
            };
            if !sizes.contains(&size) {
                sizes.push(size);
            }
        }

        info!("Loaded scenario with {} frames", frames.len());
        Ok(Self { frames, sizes })
    }

    /// Distinct upright frame sizes, as the detector will see them
    pub fn upright_sizes(&self) -> &[(u32, u32)] {
        &self.sizes
    }

}

impl FrameSource for ScenarioSource {
    fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        Ok(self.frames.pop_front())
    }
}

/// Detector that reports the scenario's boxes for each frame sequence.
///
/// Frames past the end of the script report nothing.
pub struct ScriptedDetector {
    script: Vec<Vec<BoundingBox>>,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Vec<BoundingBox>>) -> Self {
        Self { script }
    }
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, frame: &NormalizedFrame) -> Result<DetectionOutcome> {
        let start = Instant::now();
        let boxes = usize::try_from(frame.sequence)
            .ok()
            .and_then(|index| self.script.get(index))
            .cloned()
            .unwrap_or_default();
        Ok(DetectionOutcome::from_boxes(frame.sequence, boxes, start.elapsed()))
    }
}

/// OCR engine answering from the scenario.
///
/// The engine only sees the crop, so a crop is matched to a scripted box by
/// its pixel size on any of the scenario's upright frame sizes. Boxes that
/// produce identical crop sizes must share a response.
pub struct ScriptedOcr {
    responses: Vec<((i64, i64), ScriptedResponse)>,
}

impl ScriptedOcr {
    pub fn new(responses: &[ScriptedResponse], frame_sizes: &[(u32, u32)]) -> Self {
        let mut keyed = Vec::new();
        for response in responses {
            for &(width, height) in frame_sizes {
                if let Some(rect) = PixelRect::from_box(&response.bbox, width, height) {
                    keyed.push(((rect.width, rect.height), response.clone()));
                }
            }
        }
        Self { responses: keyed }
    }
}

#[async_trait]
impl OcrEngine for ScriptedOcr {
    async fn recognize(&self, image: RgbaImage) -> Result<String, String> {
        let (width, height) = image.dimensions();
        let key = (width as i64, height as i64);

        let Some((_, response)) = self.responses.iter().find(|(size, _)| *size == key) else {
            return Err(format!("no scripted response for {}x{} crop", width, height));
        };

        if response.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(response.latency_ms)).await;
        }
        debug!("Scripted OCR answering {}x{} crop", width, height);

        match (&response.error, &response.text) {
            (Some(error), _) => Err(error.clone()),
            (None, Some(text)) => Ok(text.clone()),
            (None, None) => Ok(String::new()),
        }
    }
}
