use image::{GrayImage, RgbImage};

use crate::error::VisionError;

/// Which side of the face mask receives the stylized pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskMode {
    /// Style inside the mask, original outside.
    StyleFace,
    /// Original inside the mask, style outside.
    #[default]
    StyleBackground,
}

impl MaskMode {
    pub fn toggle(self) -> Self {
        match self {
            MaskMode::StyleFace => MaskMode::StyleBackground,
            MaskMode::StyleBackground => MaskMode::StyleFace,
        }
    }
}

/// Blend `stylized` into `original` through a binary `mask` (non-zero = face).
pub fn composite(
    original: &RgbImage,
    stylized: &RgbImage,
    mask: &GrayImage,
    mode: MaskMode,
) -> Result<RgbImage, VisionError> {
    let expected = original.dimensions();
    for actual in [stylized.dimensions(), mask.dimensions()] {
        if actual != expected {
            return Err(VisionError::DimensionMismatch { expected, actual });
        }
    }

    let mut out = original.clone();
    for ((px, styled), m) in out
        .pixels_mut()
        .zip(stylized.pixels())
        .zip(mask.pixels())
    {
        let inside = m.0[0] != 0;
        let take_style = match mode {
            MaskMode::StyleFace => inside,
            MaskMode::StyleBackground => !inside,
        };
        if take_style {
            *px = *styled;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    fn inputs() -> (RgbImage, RgbImage, GrayImage) {
        let original = RgbImage::from_pixel(2, 1, Rgb([1, 1, 1]));
        let stylized = RgbImage::from_pixel(2, 1, Rgb([9, 9, 9]));
        let mut mask = GrayImage::new(2, 1);
        mask.put_pixel(0, 0, Luma([255]));
        (original, stylized, mask)
    }

    #[test]
    fn style_face_paints_inside_mask() {
        let (o, s, m) = inputs();
        let out = composite(&o, &s, &m, MaskMode::StyleFace).unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgb([9, 9, 9]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([1, 1, 1]));
    }

    #[test]
    fn style_background_paints_outside_mask() {
        let (o, s, m) = inputs();
        let out = composite(&o, &s, &m, MaskMode::StyleBackground).unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgb([1, 1, 1]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([9, 9, 9]));
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let (o, s, _) = inputs();
        let m = GrayImage::new(3, 1);
        assert!(matches!(
            composite(&o, &s, &m, MaskMode::StyleFace),
            Err(VisionError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn toggle_flips() {
        assert_eq!(MaskMode::StyleFace.toggle(), MaskMode::StyleBackground);
        assert_eq!(MaskMode::default().toggle(), MaskMode::StyleFace);
    }
}
