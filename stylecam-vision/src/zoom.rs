//! Digital zoom: crop a region of the frame and scale it back up.
//!
//! The zoom level is kept in tenths so repeated in/out steps land exactly on
//! 1.0 again.

use image::{imageops, RgbImage};

const MIN_LEVEL: u32 = 2;
const MAX_LEVEL: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Zoom {
    level: u32,
    center: Option<(u32, u32)>,
}

impl Default for Zoom {
    fn default() -> Self {
        Self {
            level: MAX_LEVEL,
            center: None,
        }
    }
}

impl Zoom {
    pub fn scale(&self) -> f32 {
        self.level as f32 / 10.0
    }

    pub fn center(&self) -> Option<(u32, u32)> {
        self.center
    }

    pub fn is_identity(&self) -> bool {
        self.level == MAX_LEVEL
    }

    pub fn zoom_in(&mut self) {
        if self.level > MIN_LEVEL {
            self.level -= 1;
        }
    }

    pub fn zoom_out(&mut self) {
        if self.level < MAX_LEVEL {
            self.level += 1;
        }
        if self.level == MAX_LEVEL {
            self.center = None;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Pick a new zoom centre from a point on the displayed (already zoomed)
    /// frame of size `width` x `height`.
    pub fn focus(&mut self, x: u32, y: u32, width: u32, height: u32) {
        let crop = self.crop_rect(width, height);
        let sx = crop.x + (x.min(width) as u64 * crop.width as u64 / width.max(1) as u64) as u32;
        let sy = crop.y + (y.min(height) as u64 * crop.height as u64 / height.max(1) as u64) as u32;
        self.center = Some((sx.min(width), sy.min(height)));
    }

    pub fn crop_rect(&self, width: u32, height: u32) -> CropRect {
        let crop_w = ((width * self.level + 5) / 10).clamp(1, width.max(1));
        let crop_h = ((height * self.level + 5) / 10).clamp(1, height.max(1));
        let (cx, cy) = self.center.unwrap_or((width / 2, height / 2));
        let x = cx.saturating_sub(crop_w / 2).min(width.saturating_sub(crop_w));
        let y = cy.saturating_sub(crop_h / 2).min(height.saturating_sub(crop_h));
        CropRect {
            x,
            y,
            width: crop_w,
            height: crop_h,
        }
    }

    pub fn apply(&self, frame: &RgbImage) -> RgbImage {
        if self.is_identity() {
            return frame.clone();
        }
        let (width, height) = frame.dimensions();
        let r = self.crop_rect(width, height);
        let cropped = imageops::crop_imm(frame, r.x, r.y, r.width, r.height).to_image();
        imageops::resize(&cropped, width, height, imageops::FilterType::Triangle)
    }
}
