use std::path::{Path, PathBuf};

use anyhow::Result;
use image::{Rgb, RgbImage};
use stylecam_vision::{model, Effects, FaceSegmenter, FramePipeline, StyleImage, StyleTransfer};

fn model_path(var: &str, default: &str) -> PathBuf {
    std::env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

fn test_frame() -> RgbImage {
    RgbImage::from_fn(160, 120, |x, y| Rgb([(x * 2) as u8, (y * 2) as u8, 128]))
}

#[test]
fn test_stylize_keeps_frame_size() -> Result<()> {
    env_logger::try_init().ok();
    let style_model = model_path("STYLECAM_STYLE_MODEL", "../models/arbitrary-image-stylization.onnx");
    if !Path::new(&style_model).exists() {
        eprintln!("Skipping: {} not found", style_model.display());
        return Ok(());
    }

    let styles = vec![
        StyleImage {
            name: "stripes".into(),
            image: RgbImage::from_fn(64, 64, |x, _| Rgb(if x % 8 < 4 { [255, 0, 0] } else { [0, 0, 255] })),
        },
        StyleImage {
            name: "flat".into(),
            image: RgbImage::from_pixel(64, 64, Rgb([20, 200, 20])),
        },
    ];
    let style = StyleTransfer::new(model::style_session(&style_model)?, styles)?;

    let seg_model = model_path("STYLECAM_SEGMENTATION_MODEL", "../models/face_unet.onnx");
    let segmenter = if seg_model.exists() {
        Some(FaceSegmenter::new(model::segmentation_session(&seg_model)?, 0.5))
    } else {
        None
    };

    let mut pipeline = FramePipeline::new(style, segmenter);
    let effects = Effects {
        stylize: true,
        ..Effects::default()
    };
    let frame = test_frame();
    let out = pipeline.process(&frame, &effects)?;
    assert_eq!(out.dimensions(), frame.dimensions());

    pipeline.style.change_style(1)?;
    assert_eq!(pipeline.style.name(), "flat");
    let out = pipeline.process(&frame, &effects)?;
    assert_eq!(out.dimensions(), frame.dimensions());
    println!("✓ Style transfer ran on {:?}", frame.dimensions());
    Ok(())
}

#[test]
fn test_segmentation_mask_is_binary() -> Result<()> {
    let seg_model = model_path("STYLECAM_SEGMENTATION_MODEL", "../models/face_unet.onnx");
    if !seg_model.exists() {
        eprintln!("Skipping: {} not found", seg_model.display());
        return Ok(());
    }
    let mut segmenter = FaceSegmenter::new(model::segmentation_session(&seg_model)?, 0.5);
    let mask = segmenter.predict(&test_frame())?;
    assert_eq!(mask.dimensions(), (160, 120));
    assert!(mask.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    Ok(())
}
