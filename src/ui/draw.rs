use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::RgbImage;
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use super::button::ButtonBar;
use super::theme;

pub fn load_font(path: &Path) -> Result<FontVec> {
    let data = std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    FontVec::try_from_vec(data).map_err(|_| anyhow::anyhow!("invalid font {}", path.display()))
}

pub const DEFAULT_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

/// Load the configured font, or [`DEFAULT_FONT`] when none is set. Missing
/// fonts only cost the button labels.
pub fn load_optional_font(path: Option<&Path>) -> Option<FontVec> {
    let path = path.unwrap_or(Path::new(DEFAULT_FONT));
    match load_font(path) {
        Ok(font) => Some(font),
        Err(e) => {
            log::warn!("{:#}; button labels disabled", e);
            None
        }
    }
}

/// Paint the button bar onto `frame`, re-laying it out if the frame size
/// changed.
pub fn render_buttons(frame: &mut RgbImage, bar: &mut ButtonBar, font: Option<&FontVec>) {
    let (w, h) = frame.dimensions();
    if bar.frame_size() != (w, h) {
        bar.layout(w, h);
    }
    for button in bar.buttons() {
        let b = button.bounds;
        if b.w == 0 || b.h == 0 {
            continue;
        }
        let color = if button.toggled {
            theme::BUTTON_ON
        } else {
            theme::BUTTON_OFF
        };
        draw_filled_rect_mut(frame, Rect::at(b.x as i32, b.y as i32).of_size(b.w, b.h), color);

        let Some(font) = font else { continue };
        let scale = PxScale::from(b.h as f32 * theme::TEXT_HEIGHT_RATE);
        let (tw, th) = text_size(scale, font, &button.text);
        let tx = b.x as i32 + (b.w as i32 - tw as i32) / 2;
        let ty = b.y as i32 + (b.h as i32 - th as i32) / 2;
        draw_text_mut(frame, theme::BUTTON_TEXT, tx, ty, scale, font, &button.text);
    }
}

/// Red dot plus "REC" in the top-right corner.
pub fn render_recording(frame: &mut RgbImage, font: Option<&FontVec>) {
    let (w, h) = frame.dimensions();
    let r = ((h as f32 * 0.015) as i32).max(3);
    let cx = w as i32 - 4 * r;
    let cy = theme::BAR_TOP as i32 + r;
    draw_filled_circle_mut(frame, (cx, cy), r, theme::RECORDING);
    if let Some(font) = font {
        let scale = PxScale::from(r as f32 * 3.0);
        let (tw, th) = text_size(scale, font, "REC");
        draw_text_mut(
            frame,
            theme::STATUS_TEXT,
            cx - 2 * r - tw as i32,
            cy - th as i32 / 2,
            scale,
            font,
            "REC",
        );
    }
}
