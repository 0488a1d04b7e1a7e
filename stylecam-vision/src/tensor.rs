//! Conversions between `image` buffers and NHWC float tensors in [0, 1].

use anyhow::Result;
use image::{Rgb, RgbImage};
use ndarray::Array4;

use crate::error::VisionError;

/// RGB image to a `[1, H, W, 3]` tensor scaled to [0, 1].
pub fn rgb_to_nhwc(img: &RgbImage) -> Result<Array4<f32>> {
    let (w, h) = img.dimensions();
    let data: Vec<f32> = img.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
    Ok(Array4::from_shape_vec((1, h as usize, w as usize, 3), data)?)
}

/// `[1, H, W, 3]` tensor data in [0, 1] back to an RGB image.
pub fn nhwc_to_rgb(shape: &[i64], data: &[f32]) -> Result<RgbImage> {
    let (h, w) = match shape {
        [1, h, w, 3] if *h > 0 && *w > 0 => (*h as u32, *w as u32),
        _ => return Err(VisionError::OutputShape(shape.to_vec()).into()),
    };
    let expected = (h * w * 3) as usize;
    if data.len() < expected {
        return Err(VisionError::OutputShape(shape.to_vec()).into());
    }
    Ok(RgbImage::from_fn(w, h, |x, y| {
        let i = ((y * w + x) * 3) as usize;
        Rgb([to_u8(data[i]), to_u8(data[i + 1]), to_u8(data[i + 2])])
    }))
}

fn to_u8(v: f32) -> u8 {
    (v * 255.0).clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nhwc_layout_is_row_major_interleaved() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(1, 0, Rgb([255, 0, 51]));
        let t = rgb_to_nhwc(&img).unwrap();
        assert_eq!(t.shape(), &[1, 1, 2, 3]);
        assert_eq!(t[[0, 0, 1, 0]], 1.0);
        assert!((t[[0, 0, 1, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn output_values_are_clamped() {
        let img = nhwc_to_rgb(&[1, 1, 1, 3], &[1.5, -0.2, 0.5]).unwrap();
        assert_eq!(img.get_pixel(0, 0), &Rgb([255, 0, 127]));
    }

    #[test]
    fn bad_shape_is_rejected() {
        assert!(nhwc_to_rgb(&[1, 3, 4, 4], &[0.0; 48]).is_err());
    }
}
