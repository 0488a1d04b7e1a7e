use std::path::Path;

use anyhow::{Context, Result};
use image::{imageops, RgbImage};
use ndarray::Array4;
use ort::{session::Session, value::Value};

use crate::error::VisionError;
use crate::tensor;

/// A named reference painting.
#[derive(Debug, Clone)]
pub struct StyleImage {
    pub name: String,
    pub image: RgbImage,
}

impl StyleImage {
    pub fn open(name: impl Into<String>, path: &Path) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("reading style image {}", path.display()))?
            .to_rgb8();
        Ok(Self {
            name: name.into(),
            image,
        })
    }
}

/// Style tensors, one slot per style, each keyed by the content size it was
/// resized for.
#[derive(Debug, Default)]
pub struct StyleTensors {
    slots: Vec<Option<((u32, u32), Array4<f32>)>>,
}

impl StyleTensors {
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![None; count],
        }
    }

    /// Tensor for `style` at `size`, built on first use.
    pub fn get(&mut self, index: usize, style: &RgbImage, size: (u32, u32)) -> Result<&Array4<f32>> {
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        let fresh = matches!(&self.slots[index], Some((built, _)) if *built == size);
        if !fresh {
            log::debug!("preparing style {} at {:?}", index, size);
            let resized = imageops::resize(style, size.0, size.1, imageops::FilterType::Triangle);
            self.slots[index] = Some((size, tensor::rgb_to_nhwc(&resized)?));
        }
        self.slots[index]
            .as_ref()
            .map(|(_, t)| t)
            .ok_or_else(|| anyhow::anyhow!("style {} has no tensor", index))
    }
}

/// Arbitrary style transfer: one network, many reference images.
pub struct StyleTransfer {
    session: Session,
    styles: Vec<StyleImage>,
    current: usize,
    tensors: StyleTensors,
}

impl StyleTransfer {
    pub fn new(session: Session, styles: Vec<StyleImage>) -> Result<Self, VisionError> {
        if styles.is_empty() {
            return Err(VisionError::NoStyles);
        }
        let tensors = StyleTensors::new(styles.len());
        Ok(Self {
            session,
            styles,
            current: 0,
            tensors,
        })
    }

    pub fn change_style(&mut self, index: usize) -> Result<(), VisionError> {
        if index >= self.styles.len() {
            return Err(VisionError::StyleOutOfRange {
                index,
                count: self.styles.len(),
            });
        }
        if index != self.current {
            log::info!("style changed to {}", self.styles[index].name);
            self.current = index;
        }
        Ok(())
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn name(&self) -> &str {
        &self.styles[self.current].name
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.styles.iter().map(|s| s.name.as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.styles
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Render `frame` in the current style. The result has the frame's size.
    pub fn predict(&mut self, frame: &RgbImage) -> Result<RgbImage> {
        let size = frame.dimensions();
        let style = self
            .tensors
            .get(self.current, &self.styles[self.current].image, size)?
            .clone();
        let content = tensor::rgb_to_nhwc(frame)?;

        let content = Value::from_array(content)?;
        let style = Value::from_array(style)?;
        let outputs = self
            .session
            .run(ort::inputs![content, style])
            .context("running style transfer")?;

        let (_name, output) = outputs
            .iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("style model produced no outputs"))?;
        let (shape, data) = output.try_extract_tensor::<f32>()?;
        let shape: Vec<i64> = shape.iter().copied().collect();
        let stylized = tensor::nhwc_to_rgb(&shape, data)?;

        if stylized.dimensions() == size {
            Ok(stylized)
        } else {
            log::trace!(
                "style output {:?} resized to {:?}",
                stylized.dimensions(),
                size
            );
            Ok(imageops::resize(
                &stylized,
                size.0,
                size.1,
                imageops::FilterType::Triangle,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn tensors_are_kept_per_style() {
        let a = RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]));
        let b = RgbImage::from_pixel(4, 4, Rgb([0, 0, 255]));
        let mut tensors = StyleTensors::new(2);

        let first = tensors.get(0, &a, (8, 6)).unwrap().as_ptr();
        assert_eq!(tensors.get(0, &a, (8, 6)).unwrap().shape(), &[1, 6, 8, 3]);
        let other = tensors.get(1, &b, (8, 6)).unwrap();
        assert_eq!(other[[0, 0, 0, 2]], 1.0);
        // switching back reuses the first tensor
        assert_eq!(tensors.get(0, &a, (8, 6)).unwrap().as_ptr(), first);
        assert_eq!(tensors.get(0, &a, (8, 6)).unwrap()[[0, 0, 0, 0]], 1.0);

        let resized = tensors.get(0, &a, (4, 4)).unwrap();
        assert_eq!(resized.shape(), &[1, 4, 4, 3]);
    }
}
