//! Rolling clip recorder.
//!
//! Frames go to `cvui_{date}_{hour}_{n}` clip files. A new clip starts every
//! `clip_len`, and once more than `max_clips` clip files sit in the directory
//! the oldest tracked clips are deleted.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};

use crate::config::Config;

const CLIP_PREFIX: &str = "cvui_";
const JPEG_QUALITY: u8 = 85;

pub trait ClipWriter: Send {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;
    fn finish(self: Box<Self>) -> Result<()>;
}

/// Motion-JPEG elementary stream: JPEG frames back to back.
pub struct MjpegWriter {
    out: BufWriter<File>,
    size: (u32, u32),
}

impl MjpegWriter {
    pub fn create(path: &Path, size: (u32, u32)) -> Result<Self> {
        let file = File::create(path).with_context(|| format!("creating clip {}", path.display()))?;
        Ok(Self {
            out: BufWriter::new(file),
            size,
        })
    }
}

impl ClipWriter for MjpegWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if frame.dimensions() != self.size {
            anyhow::bail!(
                "clip is {:?}, frame is {:?}",
                self.size,
                frame.dimensions()
            );
        }
        JpegEncoder::new_with_quality(&mut self.out, JPEG_QUALITY)
            .encode_image(frame)
            .context("encoding clip frame")?;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<()> {
        self.out.flush().context("flushing clip")?;
        Ok(())
    }
}

/// Reads the frames of a Motion-JPEG stream back, one JPEG at a time.
pub struct MjpegReader<R> {
    input: R,
    done: bool,
}

impl MjpegReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("opening clip {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> MjpegReader<R> {
    pub fn new(input: R) -> Self {
        Self { input, done: false }
    }

    /// Bytes up to and including the next end-of-image marker.
    fn next_jpeg(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        loop {
            self.input.read_until(0xFF, &mut buf)?;
            if buf.last() != Some(&0xFF) {
                if buf.is_empty() {
                    return Ok(None);
                }
                anyhow::bail!("clip ends inside a frame");
            }
            // marker byte, skipping 0xFF fill
            let marker = loop {
                let mut b = [0u8; 1];
                self.input
                    .read_exact(&mut b)
                    .context("clip ends inside a frame")?;
                buf.push(b[0]);
                if b[0] != 0xFF {
                    break b[0];
                }
            };
            if marker == 0xD9 {
                return Ok(Some(buf));
            }
        }
    }
}

impl<R: BufRead> Iterator for MjpegReader<R> {
    type Item = Result<RgbImage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_jpeg() {
            Ok(Some(data)) => Some(
                image::load_from_memory_with_format(&data, ImageFormat::Jpeg)
                    .map(|img| img.to_rgb8())
                    .context("decoding clip frame"),
            ),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(feature = "opencv")]
pub use avi::VideoReader;

#[cfg(feature = "opencv")]
mod avi {
    use super::*;
    use opencv::{core, prelude::*, videoio};

    /// DIVX in AVI through OpenCV's video writer.
    pub struct AviWriter {
        writer: videoio::VideoWriter,
        size: (u32, u32),
    }

    impl AviWriter {
        pub fn create(path: &Path, size: (u32, u32), fps: f64) -> Result<Self> {
            let fourcc = videoio::VideoWriter::fourcc('D', 'I', 'V', 'X')?;
            let frame_size = core::Size::new(size.0 as i32, size.1 as i32);
            let name = path.to_string_lossy();
            let writer = videoio::VideoWriter::new(&name, fourcc, fps, frame_size, true)?;
            if !writer.is_opened()? {
                anyhow::bail!("opencv could not open {}", path.display());
            }
            Ok(Self { writer, size })
        }
    }

    impl ClipWriter for AviWriter {
        fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
            if frame.dimensions() != self.size {
                anyhow::bail!("clip is {:?}, frame is {:?}", self.size, frame.dimensions());
            }
            // OpenCV wants BGR rows
            let bgr: Vec<u8> = frame
                .as_raw()
                .chunks_exact(3)
                .flat_map(|p| [p[2], p[1], p[0]])
                .collect();
            let flat = core::Mat::from_slice(&bgr)?;
            let mat = flat.reshape(3, self.size.1 as i32)?.try_clone()?;
            self.writer.write(&mat)?;
            Ok(())
        }

        fn finish(mut self: Box<Self>) -> Result<()> {
            self.writer.release()?;
            Ok(())
        }
    }

    /// Any video OpenCV can decode, as RGB frames.
    pub struct VideoReader {
        capture: videoio::VideoCapture,
        fps: f64,
    }

    impl VideoReader {
        pub fn open(path: &Path) -> Result<Self> {
            let name = path.to_string_lossy();
            let capture = videoio::VideoCapture::from_file(&name, videoio::CAP_ANY)?;
            if !capture.is_opened()? {
                anyhow::bail!("opencv could not open {}", path.display());
            }
            let fps = capture.get(videoio::CAP_PROP_FPS)?;
            Ok(Self { capture, fps })
        }

        /// Frame rate from the container, when it has one.
        pub fn fps(&self) -> Option<f64> {
            (self.fps > 0.0).then_some(self.fps)
        }

        fn read(&mut self) -> Result<Option<RgbImage>> {
            let mut mat = core::Mat::default();
            if !self.capture.read(&mut mat)? || mat.empty() {
                return Ok(None);
            }
            if mat.typ() != core::CV_8UC3 {
                anyhow::bail!("unsupported frame type {}", mat.typ());
            }
            let size = mat.size()?;
            let rgb: Vec<u8> = mat
                .data_bytes()?
                .chunks_exact(3)
                .flat_map(|p| [p[2], p[1], p[0]])
                .collect();
            RgbImage::from_raw(size.width as u32, size.height as u32, rgb)
                .map(Some)
                .ok_or_else(|| anyhow::anyhow!("short frame from {:?}", size))
        }
    }

    impl Iterator for VideoReader {
        type Item = Result<RgbImage>;

        fn next(&mut self) -> Option<Self::Item> {
            self.read().transpose()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClipFormat {
    #[default]
    Mjpeg,
    #[cfg(feature = "opencv")]
    Avi,
}

impl ClipFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ClipFormat::Mjpeg => "mjpeg",
            #[cfg(feature = "opencv")]
            ClipFormat::Avi => "avi",
        }
    }

    /// AVI when built with OpenCV, Motion-JPEG otherwise.
    pub fn preferred() -> Self {
        #[cfg(feature = "opencv")]
        {
            ClipFormat::Avi
        }
        #[cfg(not(feature = "opencv"))]
        {
            ClipFormat::Mjpeg
        }
    }

    #[allow(unused_variables)]
    pub fn open(self, path: &Path, size: (u32, u32), fps: f64) -> Result<Box<dyn ClipWriter>> {
        Ok(match self {
            ClipFormat::Mjpeg => Box::new(MjpegWriter::create(path, size)?),
            #[cfg(feature = "opencv")]
            ClipFormat::Avi => Box::new(avi::AviWriter::create(path, size, fps)?),
        })
    }
}

/// First free `cvui_{YYYYMMDD}_{HH}_{n}.{ext}` in `dir`, counting from 1.
pub fn clip_path(dir: &Path, now: DateTime<Local>, ext: &str) -> PathBuf {
    let stem = format!("{}{}", CLIP_PREFIX, now.format("%Y%m%d_%H"));
    (1u32..)
        .map(|n| dir.join(format!("{stem}_{n}.{ext}")))
        .find(|p| !p.exists())
        .unwrap_or_else(|| dir.join(format!("{stem}.{ext}")))
}

fn is_clip(path: &Path, ext: &str) -> bool {
    let name_ok = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(CLIP_PREFIX));
    let ext_ok = path.extension().and_then(|e| e.to_str()) == Some(ext);
    name_ok && ext_ok && path.is_file()
}

/// FIFO of clip files with an on-disk cap.
#[derive(Debug)]
pub struct ClipRing {
    dir: PathBuf,
    ext: String,
    cap: usize,
    queue: VecDeque<PathBuf>,
}

impl ClipRing {
    pub fn new(dir: impl Into<PathBuf>, ext: impl Into<String>, cap: usize) -> Self {
        Self {
            dir: dir.into(),
            ext: ext.into(),
            cap,
            queue: VecDeque::new(),
        }
    }

    fn clips_on_disk(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("listing {}", self.dir.display()))?;
        let mut clips = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if is_clip(&path, &self.ext) {
                clips.push(path);
            }
        }
        Ok(clips)
    }

    /// Adopt clips left by earlier runs, oldest first.
    pub fn seed(&mut self) -> Result<()> {
        let mut clips: Vec<(SystemTime, PathBuf)> = self
            .clips_on_disk()?
            .into_iter()
            .map(|p| {
                let mtime = p
                    .metadata()
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (mtime, p)
            })
            .collect();
        clips.sort();
        for (_, path) in clips {
            if !self.queue.contains(&path) {
                self.queue.push_back(path);
            }
        }
        log::debug!("adopted {} existing clip(s)", self.queue.len());
        Ok(())
    }

    pub fn track(&mut self, path: PathBuf) {
        self.queue.push_back(path);
    }

    pub fn tracked(&self) -> impl Iterator<Item = &Path> {
        self.queue.iter().map(PathBuf::as_path)
    }

    /// Delete oldest tracked clips while the directory holds more than `cap`
    /// clips. The newest tracked clip is never removed.
    pub fn enforce(&mut self) -> Result<Vec<PathBuf>> {
        let mut count = self.clips_on_disk()?.len();
        let mut evicted = Vec::new();
        while count > self.cap && self.queue.len() > 1 {
            let Some(oldest) = self.queue.pop_front() else {
                break;
            };
            if !oldest.exists() {
                continue;
            }
            std::fs::remove_file(&oldest)
                .with_context(|| format!("removing clip {}", oldest.display()))?;
            log::info!("evicted clip {}", oldest.display());
            count -= 1;
            evicted.push(oldest);
        }
        Ok(evicted)
    }
}

#[derive(Debug, Clone)]
pub struct RecordSettings {
    pub dir: PathBuf,
    pub clip_len: Duration,
    pub max_clips: usize,
    pub fps: f64,
    pub format: ClipFormat,
}

impl RecordSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            dir: cfg.video_dir.clone(),
            clip_len: Duration::from_secs(cfg.clip_seconds),
            max_clips: cfg.max_clips,
            fps: cfg.fps,
            format: ClipFormat::preferred(),
        }
    }
}

struct OpenClip {
    writer: Box<dyn ClipWriter>,
    path: PathBuf,
    started: Instant,
}

pub struct Recorder {
    settings: RecordSettings,
    size: (u32, u32),
    ring: ClipRing,
    current: Option<OpenClip>,
}

impl Recorder {
    pub fn start(settings: RecordSettings, size: (u32, u32), now: Instant) -> Result<Self> {
        std::fs::create_dir_all(&settings.dir)
            .with_context(|| format!("creating {}", settings.dir.display()))?;
        let mut ring = ClipRing::new(
            &settings.dir,
            settings.format.extension(),
            settings.max_clips,
        );
        ring.seed()?;
        let mut recorder = Self {
            settings,
            size,
            ring,
            current: None,
        };
        recorder.open_clip(now)?;
        Ok(recorder)
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|c| c.path.as_path())
    }

    pub fn ring(&self) -> &ClipRing {
        &self.ring
    }

    fn open_clip(&mut self, now: Instant) -> Result<()> {
        let ext = self.settings.format.extension();
        let path = clip_path(&self.settings.dir, Local::now(), ext);
        let writer = self
            .settings
            .format
            .open(&path, self.size, self.settings.fps)?;
        log::info!("recording to {}", path.display());
        self.ring.track(path.clone());
        self.current = Some(OpenClip {
            writer,
            path,
            started: now,
        });
        self.ring.enforce()?;
        Ok(())
    }

    fn close_clip(&mut self) -> Result<()> {
        if let Some(clip) = self.current.take() {
            clip.writer
                .finish()
                .with_context(|| format!("closing clip {}", clip.path.display()))?;
        }
        Ok(())
    }

    /// Append a frame, rolling over to a new clip when the current one is
    /// `clip_len` old.
    pub fn push(&mut self, frame: &RgbImage, now: Instant) -> Result<()> {
        let expired = self
            .current
            .as_ref()
            .map_or(true, |c| now.duration_since(c.started) >= self.settings.clip_len);
        if expired {
            self.close_clip()?;
            self.open_clip(now)?;
        }
        if let Some(clip) = self.current.as_mut() {
            clip.writer.write_frame(frame)?;
        }
        Ok(())
    }

    pub fn stop(mut self) -> Result<()> {
        self.close_clip()?;
        log::info!("recording stopped");
        Ok(())
    }
}
