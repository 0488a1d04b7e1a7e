use anyhow::{Context, Result};
use image::RgbImage;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

pub struct Camera {
    stream: Stream<'static>,
    width: u32,
    height: u32,
    fourcc: FourCC,
}

impl Camera {
    /// Open a capture device and ask for `width` x `height`.
    ///
    /// The driver may pick another size; [`Camera::width`] and
    /// [`Camera::height`] report what was negotiated.
    pub fn open(device: &str, width: u32, height: u32) -> Result<Self> {
        let dev = Device::with_path(device).with_context(|| format!("open camera {}", device))?;
        let mut fmt = dev.format().context("get format")?;
        // Prefer RGB, fallback to YUYV, else accept existing format
        let desired = Format::new(width, height, FourCC::new(b"RGB3"));
        fmt = dev.set_format(&desired).unwrap_or(fmt);
        if fmt.fourcc != FourCC::new(b"RGB3") {
            let yuyv = Format::new(width, height, FourCC::new(b"YUYV"));
            fmt = dev.set_format(&yuyv).unwrap_or(fmt);
        }
        if fmt.width != width || fmt.height != height {
            log::warn!(
                "camera negotiated {}x{} instead of requested {}x{}",
                fmt.width,
                fmt.height,
                width,
                height
            );
        }
        let stream = Stream::with_buffers(&dev, Type::VideoCapture, 4).context("stream")?;
        log::info!(
            "camera {} streaming {}x{} {:?}",
            device,
            fmt.width,
            fmt.height,
            fmt.fourcc
        );
        Ok(Self {
            stream,
            width: fmt.width,
            height: fmt.height,
            fourcc: fmt.fourcc,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn frame(&mut self) -> Result<RgbImage> {
        let (data, meta) = self.stream.next().context("capture frame")?;
        log::trace!("captured frame seq={} len={}", meta.sequence, data.len());
        let mut buf = match self.fourcc {
            f if f == FourCC::new(b"RGB3") => data.to_vec(),
            f if f == FourCC::new(b"YUYV") => yuyv_to_rgb(self.width, self.height, data)?,
            f if f == FourCC::new(b"GREY") => grey_to_rgb(self.width, self.height, data)?,
            other => {
                log::warn!(
                    "unexpected pixel format {:?}, passing through raw len={}",
                    other,
                    data.len()
                );
                data.to_vec()
            }
        };
        let expected = (self.width * self.height * 3) as usize;
        if buf.len() < expected {
            anyhow::bail!(
                "buffer too small: got {}, expected {} (fourcc {:?})",
                buf.len(),
                expected,
                self.fourcc
            );
        }
        buf.truncate(expected);
        RgbImage::from_raw(self.width, self.height, buf)
            .ok_or_else(|| anyhow::anyhow!("failed to build image buffer"))
    }
}

pub fn yuyv_to_rgb(width: u32, height: u32, data: &[u8]) -> Result<Vec<u8>> {
    let expected = (width * height * 2) as usize;
    if data.len() < expected {
        anyhow::bail!("short YUYV buffer");
    }
    let mut out = Vec::with_capacity((width * height * 3) as usize);
    for chunk in data[..expected].chunks_exact(4) {
        let y0 = chunk[0] as f32;
        let u = chunk[1] as f32 - 128.0;
        let y1 = chunk[2] as f32;
        let v = chunk[3] as f32 - 128.0;
        for y in [y0, y1] {
            out.push(clamp(y + 1.402 * v));
            out.push(clamp(y - 0.344136 * u - 0.714136 * v));
            out.push(clamp(y + 1.772 * u));
        }
    }
    Ok(out)
}

fn clamp(v: f32) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

pub fn grey_to_rgb(width: u32, height: u32, data: &[u8]) -> Result<Vec<u8>> {
    let expected = (width * height) as usize;
    if data.len() < expected {
        anyhow::bail!("short GREY buffer");
    }
    Ok(data[..expected].iter().flat_map(|&y| [y, y, y]).collect())
}
