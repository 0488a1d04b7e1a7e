//! Face segmentation with a 256x256 U-Net.
//!
//! Frames are letterboxed into the square model input, the predicted mask is
//! cut back out of the letterbox and scaled to the frame size.

use anyhow::{Context, Result};
use image::{imageops, GrayImage, Luma, Rgb, RgbImage};
use imageproc::filter::Kernel;
use ort::{session::Session, value::Value};

use crate::error::VisionError;
use crate::tensor;
use crate::zoom::CropRect;

pub const INPUT_SIZE: u32 = 256;

#[rustfmt::skip]
const SHARPEN: [f32; 25] = [
    -1.0, -1.0, -1.0, -1.0, -1.0,
    -1.0,  2.0,  2.0,  2.0, -1.0,
    -1.0,  2.0,  9.0,  2.0, -1.0,
    -1.0,  2.0,  2.0,  2.0, -1.0,
    -1.0, -1.0, -1.0, -1.0, -1.0,
];

pub struct FaceSegmenter {
    session: Session,
    threshold: f32,
}

impl FaceSegmenter {
    pub fn new(session: Session, threshold: f32) -> Self {
        Self { session, threshold }
    }

    /// Binary face mask (0 / 255) with the frame's dimensions.
    pub fn predict(&mut self, frame: &RgbImage) -> Result<GrayImage> {
        let (canvas, placement) = letterbox(frame, INPUT_SIZE);
        let input = tensor::rgb_to_nhwc(&sharpen(&canvas))?;
        let input = Value::from_array(input)?;

        let outputs = self
            .session
            .run(ort::inputs![input])
            .context("running segmentation")?;
        let (_name, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("segmentation model produced no outputs"))?;
        let (shape, data) = output.try_extract_tensor::<f32>()?;
        let shape: Vec<i64> = shape.iter().copied().collect();

        let square = threshold_mask(&shape, data, self.threshold)?;
        let (w, h) = frame.dimensions();
        Ok(unletterbox(&square, placement, w, h))
    }
}

/// Resize `img` to fit a `size` x `size` black canvas, keeping aspect ratio,
/// centred. Returns the canvas and where the image landed on it.
pub fn letterbox(img: &RgbImage, size: u32) -> (RgbImage, CropRect) {
    let (w, h) = img.dimensions();
    let (new_w, new_h) = if h >= w {
        (((w as u64 * size as u64) / h.max(1) as u64).max(1) as u32, size)
    } else {
        (size, ((h as u64 * size as u64) / w.max(1) as u64).max(1) as u32)
    };
    let resized = imageops::resize(img, new_w, new_h, imageops::FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([0, 0, 0]));
    let x = (size - new_w) / 2;
    let y = (size - new_h) / 2;
    imageops::replace(&mut canvas, &resized, x as i64, y as i64);
    (
        canvas,
        CropRect {
            x,
            y,
            width: new_w,
            height: new_h,
        },
    )
}

/// 5x5 sharpening filter (kernel / 9), edges clamped.
pub fn sharpen(img: &RgbImage) -> RgbImage {
    Kernel::new(&SHARPEN, 5, 5).filter::<Rgb<u8>, _, Rgb<u8>>(img, |out, acc| {
        *out = (acc / 9.0).round().clamp(0.0, 255.0) as u8;
    })
}

/// Turn `[1, H, W, C]` class probabilities into a 0/255 mask. The face class
/// is channel 1, or channel 0 for single-channel models.
pub fn threshold_mask(shape: &[i64], data: &[f32], threshold: f32) -> Result<GrayImage> {
    let (h, w, c) = match shape {
        [1, h, w, c] if *h > 0 && *w > 0 && *c > 0 => (*h as u32, *w as u32, *c as usize),
        _ => return Err(VisionError::OutputShape(shape.to_vec()).into()),
    };
    if data.len() < (h * w) as usize * c {
        return Err(VisionError::OutputShape(shape.to_vec()).into());
    }
    let channel = if c > 1 { 1 } else { 0 };
    Ok(GrayImage::from_fn(w, h, |x, y| {
        let p = data[(y * w + x) as usize * c + channel];
        Luma([if p > threshold { 255 } else { 0 }])
    }))
}

/// Cut the letterboxed region back out of a square mask and scale it to
/// `width` x `height`.
pub fn unletterbox(mask: &GrayImage, placement: CropRect, width: u32, height: u32) -> GrayImage {
    let (mw, mh) = mask.dimensions();
    let sx = mw as f32 / INPUT_SIZE as f32;
    let sy = mh as f32 / INPUT_SIZE as f32;
    let x = ((placement.x as f32 * sx) as u32).min(mw.saturating_sub(1));
    let y = ((placement.y as f32 * sy) as u32).min(mh.saturating_sub(1));
    let cw = ((placement.width as f32 * sx) as u32).clamp(1, mw - x);
    let ch = ((placement.height as f32 * sy) as u32).clamp(1, mh - y);
    let region = imageops::crop_imm(mask, x, y, cw, ch).to_image();
    imageops::resize(&region, width, height, imageops::FilterType::Nearest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letterbox_wide_frame_pads_vertically() {
        let img = RgbImage::from_pixel(640, 480, Rgb([200, 10, 10]));
        let (canvas, p) = letterbox(&img, 256);
        assert_eq!(canvas.dimensions(), (256, 256));
        assert_eq!(
            p,
            CropRect {
                x: 0,
                y: 32,
                width: 256,
                height: 192
            }
        );
        assert_eq!(canvas.get_pixel(10, 0), &Rgb([0, 0, 0]));
        assert_eq!(canvas.get_pixel(10, 128), &Rgb([200, 10, 10]));
    }

    #[test]
    fn letterbox_tall_frame_pads_horizontally() {
        let img = RgbImage::new(100, 200);
        let (_, p) = letterbox(&img, 256);
        assert_eq!((p.x, p.width, p.y, p.height), (64, 128, 0, 256));
    }

    #[test]
    fn sharpen_keeps_flat_regions() {
        // kernel sums to 9, so a flat image is unchanged
        let img = RgbImage::from_pixel(8, 8, Rgb([40, 80, 120]));
        assert_eq!(sharpen(&img), img);
    }

    #[test]
    fn sharpen_boosts_an_isolated_dot() {
        let mut img = RgbImage::from_pixel(9, 9, Rgb([100, 100, 100]));
        img.put_pixel(4, 4, Rgb([130, 130, 130]));
        let out = sharpen(&img);
        // centre: 100 + 30 * 9 / 9
        assert_eq!(out.get_pixel(4, 4).0[0], 130);
        // inner ring: 100 + 30 * 2 / 9
        assert_eq!(out.get_pixel(3, 4).0[0], 107);
        // outer ring: 100 - 30 / 9
        assert_eq!(out.get_pixel(2, 4).0[0], 97);
        assert_eq!(out.get_pixel(0, 0).0[0], 100);
    }

    #[test]
    fn threshold_uses_face_channel() {
        // 1x2 image, two channels: (bg, face)
        let data = [0.9, 0.1, 0.2, 0.8];
        let mask = threshold_mask(&[1, 1, 2, 2], &data, 0.5).unwrap();
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
        assert_eq!(mask.get_pixel(1, 0).0[0], 255);
    }

    #[test]
    fn unletterbox_restores_frame_size() {
        let mut mask = GrayImage::new(256, 256);
        // mark the band that holds the image for a 640x480 frame
        for y in 32..224 {
            for x in 0..128 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let placement = CropRect {
            x: 0,
            y: 32,
            width: 256,
            height: 192,
        };
        let out = unletterbox(&mask, placement, 640, 480);
        assert_eq!(out.dimensions(), (640, 480));
        assert_eq!(out.get_pixel(10, 0).0[0], 255);
        assert_eq!(out.get_pixel(630, 479).0[0], 0);
    }
}
