//! Offline stylization of stills and recorded clips.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use stylecam_vision::{FramePipeline, MaskMode};

use crate::recorder::{ClipFormat, ClipWriter, MjpegReader};

/// Frames between progress lines while stylizing a clip.
const PROGRESS_EVERY: usize = 100;

type Frames = Box<dyn Iterator<Item = Result<RgbImage>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Image,
    /// Motion-JPEG stream as written by the recorder.
    Mjpeg,
    /// Anything else OpenCV can decode.
    #[cfg(feature = "opencv")]
    Video,
}

impl InputKind {
    pub fn of(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "mjpeg" | "mjpg" => InputKind::Mjpeg,
            #[cfg(feature = "opencv")]
            "avi" | "mp4" | "mov" | "mkv" | "webm" => InputKind::Video,
            _ => InputKind::Image,
        }
    }
}

/// `{stem}_result.png` for stills, `{stem}_result.{ext}` for clips, inside
/// `out_dir`.
pub fn output_path(input: &Path, out_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let ext = match InputKind::of(input) {
        InputKind::Image => "png".to_string(),
        _ => input
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    out_dir.join(format!("{stem}_result.{ext}"))
}

/// Stylize every input through `pipeline` and write the results. Files that
/// fail are logged and skipped; the count of written files is returned.
pub fn stylize_files(
    pipeline: &mut FramePipeline,
    inputs: &[PathBuf],
    out_dir: &Path,
    mode: MaskMode,
    fps: f64,
) -> Result<usize> {
    stylize_with(|img| pipeline.stylize(img, mode), inputs, out_dir, fps)
}

/// [`stylize_files`] with any per-frame transform. `fps` is used for clips
/// whose container carries no rate.
pub fn stylize_with<F>(mut stylize: F, inputs: &[PathBuf], out_dir: &Path, fps: f64) -> Result<usize>
where
    F: FnMut(&RgbImage) -> Result<RgbImage>,
{
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    let mut written = 0;
    for (i, input) in inputs.iter().enumerate() {
        log::info!("[{}/{}] {}", i + 1, inputs.len(), input.display());
        let output = output_path(input, out_dir);
        let res = match InputKind::of(input) {
            InputKind::Image => stylize_image(&mut stylize, input, &output),
            kind => stylize_clip(&mut stylize, kind, input, &output, fps),
        };
        match res {
            Ok(()) => {
                log::info!("  -> {}", output.display());
                written += 1;
            }
            Err(e) => log::warn!("  skipped: {:#}", e),
        }
    }
    Ok(written)
}

fn stylize_image<F>(stylize: &mut F, input: &Path, output: &Path) -> Result<()>
where
    F: FnMut(&RgbImage) -> Result<RgbImage>,
{
    let img = image::open(input)
        .with_context(|| format!("reading {}", input.display()))?
        .to_rgb8();
    stylize(&img)?
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

fn stylize_clip<F>(
    stylize: &mut F,
    kind: InputKind,
    input: &Path,
    output: &Path,
    fps: f64,
) -> Result<()>
where
    F: FnMut(&RgbImage) -> Result<RgbImage>,
{
    let (frames, format, fps): (Frames, ClipFormat, f64) = match kind {
        InputKind::Mjpeg => (
            Box::new(MjpegReader::open(input)?) as Frames,
            ClipFormat::Mjpeg,
            fps,
        ),
        #[cfg(feature = "opencv")]
        InputKind::Video => {
            let reader = crate::recorder::VideoReader::open(input)?;
            let fps = reader.fps().unwrap_or(fps);
            (Box::new(reader) as Frames, ClipFormat::Avi, fps)
        }
        InputKind::Image => anyhow::bail!("{} is not a clip", input.display()),
    };

    let mut writer: Option<Box<dyn ClipWriter>> = None;
    let mut count = 0;
    for frame in frames {
        let frame = frame.with_context(|| format!("reading {}", input.display()))?;
        let result = stylize(&frame)?;
        if writer.is_none() {
            writer = Some(format.open(output, result.dimensions(), fps)?);
        }
        if let Some(w) = writer.as_mut() {
            w.write_frame(&result)?;
        }
        count += 1;
        if count % PROGRESS_EVERY == 0 {
            log::info!("  {} frames", count);
        }
    }
    match writer {
        Some(w) => w
            .finish()
            .with_context(|| format!("closing {}", output.display()))?,
        None => anyhow::bail!("{} has no frames", input.display()),
    }
    log::debug!("{} frames from {}", count, input.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invert(img: &RgbImage) -> Result<RgbImage> {
        let mut out = img.clone();
        image::imageops::invert(&mut out);
        Ok(out)
    }

    #[test]
    fn result_name_uses_stem() {
        assert_eq!(
            output_path(Path::new("samples/clip.frame.jpg"), Path::new("results")),
            PathBuf::from("results/clip.frame_result.png")
        );
        assert_eq!(
            output_path(Path::new("videos/cvui_20200324_15_1.mjpeg"), Path::new("out")),
            PathBuf::from("out/cvui_20200324_15_1_result.mjpeg")
        );
    }

    #[test]
    fn recorded_clip_is_stylized_frame_by_frame() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("cvui_t_1.mjpeg");
        let mut w = ClipFormat::Mjpeg.open(&clip, (16, 8), 20.0).unwrap();
        for _ in 0..4 {
            w.write_frame(&RgbImage::from_pixel(16, 8, image::Rgb([10, 10, 10])))
                .unwrap();
        }
        w.finish().unwrap();

        let out = dir.path().join("results");
        let written = stylize_with(invert, &[clip], &out, 20.0).unwrap();
        assert_eq!(written, 1);

        let result = out.join("cvui_t_1_result.mjpeg");
        let frames: Vec<RgbImage> = MjpegReader::open(&result)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(frames.len(), 4);
        assert!(frames[0].get_pixel(8, 4).0[0] > 240);
    }

    #[test]
    fn bad_inputs_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let still = dir.path().join("face.png");
        RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 0]))
            .save(&still)
            .unwrap();
        let empty = dir.path().join("empty.mjpeg");
        std::fs::write(&empty, b"").unwrap();
        let missing = dir.path().join("missing.jpg");

        let out = dir.path().join("results");
        let written = stylize_with(invert, &[still, empty, missing], &out, 20.0).unwrap();
        assert_eq!(written, 1);
        let img = image::open(out.join("face_result.png")).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255]);
        assert!(!out.join("empty_result.mjpeg").exists());
    }
}
