use anyhow::{Context, Result};
use image::{imageops, RgbImage};

use crate::composite::{self, MaskMode};
use crate::segmentation::FaceSegmenter;
use crate::style::StyleTransfer;
use crate::zoom::Zoom;

/// Per-frame effect switches, owned by whoever drives the pipeline.
#[derive(Debug, Clone, Default)]
pub struct Effects {
    pub mirror: bool,
    pub zoom: Zoom,
    pub stylize: bool,
    pub mask_mode: MaskMode,
}

/// mirror → zoom → style transfer (optionally masked to the face)
pub struct FramePipeline {
    pub style: StyleTransfer,
    pub segmenter: Option<FaceSegmenter>,
}

impl FramePipeline {
    pub fn new(style: StyleTransfer, segmenter: Option<FaceSegmenter>) -> Self {
        Self { style, segmenter }
    }

    pub fn process(&mut self, frame: &RgbImage, effects: &Effects) -> Result<RgbImage> {
        let mut img = if effects.mirror {
            imageops::flip_horizontal(frame)
        } else {
            frame.clone()
        };
        if !effects.zoom.is_identity() {
            img = effects.zoom.apply(&img);
        }
        if effects.stylize {
            img = self.stylize(&img, effects.mask_mode)?;
        }
        Ok(img)
    }

    /// Style transfer composited through the face mask; without a segmenter
    /// the whole frame is stylized.
    pub fn stylize(&mut self, img: &RgbImage, mode: MaskMode) -> Result<RgbImage> {
        let stylized = self.style.predict(img).context("style transfer")?;
        let Some(segmenter) = self.segmenter.as_mut() else {
            return Ok(stylized);
        };
        let mask = segmenter.predict(img).context("face segmentation")?;
        Ok(composite::composite(img, &stylized, &mask, mode)?)
    }
}
