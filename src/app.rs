use std::time::{Duration, Instant};

use ab_glyph::FontVec;
use anyhow::{Context, Result};
use image::RgbImage;
use minifb::{KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};

use crate::capture::{CaptureWorker, Command};
use crate::input::{self, KeyAction, MouseEvent, MouseTracker};
use crate::ui::{draw, ButtonBar, Selection};

pub const WINDOW_TITLE: &str = "stylecam";

/// Preview window: shows the worker's frames under the button bar and turns
/// input into worker commands.
pub struct App {
    worker: CaptureWorker,
    bar: ButtonBar,
    font: Option<FontVec>,
    mouse: MouseTracker,
    last: Option<RgbImage>,
    buffer: Vec<u32>,
}

impl App {
    pub fn new(worker: CaptureWorker, bar: ButtonBar, font: Option<FontVec>) -> Self {
        Self {
            worker,
            bar,
            font,
            mouse: MouseTracker::default(),
            last: None,
            buffer: Vec::new(),
        }
    }

    pub fn run(mut self, width: usize, height: usize) -> Result<()> {
        let mut window = Window::new(WINDOW_TITLE, width, height, WindowOptions::default())
            .context("creating window")?;
        window.set_target_fps(60);
        log::info!("keys: q quit, z/x zoom, v reset, p snapshot, r record, f face mode, m mirror");

        while window.is_open() {
            if !self.worker.status().running {
                log::error!("capture stopped, closing window");
                break;
            }
            if self.handle_keys(&window) {
                break;
            }
            self.handle_mouse(&window);

            if let Some(frame) = self.worker.take_frame() {
                self.last = Some(frame);
            }
            match self.compose() {
                Some((w, h)) => window
                    .update_with_buffer(&self.buffer, w, h)
                    .context("presenting frame")?,
                None => {
                    window.update();
                    std::thread::sleep(Duration::from_millis(5));
                }
            }
        }

        self.worker.join();
        Ok(())
    }

    fn handle_keys(&mut self, window: &Window) -> bool {
        for key in window.get_keys_pressed(KeyRepeat::No) {
            let Some(action) = input::key_action(key) else {
                continue;
            };
            let cmd = match action {
                KeyAction::Quit => return true,
                KeyAction::ZoomIn => Command::ZoomIn,
                KeyAction::ZoomOut => Command::ZoomOut,
                KeyAction::ZoomReset => Command::ZoomReset,
                KeyAction::Snapshot => Command::Snapshot,
                KeyAction::EnableStyle => {
                    let style = self.worker.status().style;
                    self.bar.select(Some(style));
                    Command::SelectStyle(style)
                }
                KeyAction::ToggleRecording => Command::ToggleRecording,
                KeyAction::ToggleMask => Command::ToggleMask,
                KeyAction::ToggleMirror => Command::ToggleMirror,
            };
            self.worker.send(cmd);
        }
        false
    }

    fn handle_mouse(&mut self, window: &Window) {
        // window may be stretched relative to the frame
        let (ww, wh) = window.get_size();
        let (fw, fh) = self
            .last
            .as_ref()
            .map_or((ww, wh), |f| (f.width() as usize, f.height() as usize));
        let pos = window.get_mouse_pos(MouseMode::Discard).map(|(x, y)| {
            (
                x * fw as f32 / ww.max(1) as f32,
                y * fh as f32 / wh.max(1) as f32,
            )
        });
        let events = self.mouse.update(
            pos,
            window.get_mouse_down(MouseButton::Left),
            window.get_mouse_down(MouseButton::Right),
            Instant::now(),
        );
        for event in events {
            if let Some(cmd) = pointer_command(&mut self.bar, event) {
                self.worker.send(cmd);
            }
        }
    }

    /// Draw the overlay on the newest frame into the window buffer.
    fn compose(&mut self) -> Option<(usize, usize)> {
        let mut frame = self.last.clone()?;
        draw::render_buttons(&mut frame, &mut self.bar, self.font.as_ref());
        if self.worker.status().recording {
            draw::render_recording(&mut frame, self.font.as_ref());
        }
        to_argb(&frame, &mut self.buffer);
        Some((frame.width() as usize, frame.height() as usize))
    }
}

/// Map a pointer event to a worker command, updating the button bar.
pub fn pointer_command(bar: &mut ButtonBar, event: MouseEvent) -> Option<Command> {
    match event {
        MouseEvent::LeftDown { x, y } => match bar.click(x as u32, y as u32)? {
            Selection::Selected(i) => Some(Command::SelectStyle(i)),
            Selection::Cleared => Some(Command::DisableStyle),
        },
        MouseEvent::DoubleClick { x, y } => {
            if bar.buttons().iter().any(|b| b.contains(x as u32, y as u32)) {
                // second press on a button toggles it like a normal click
                return pointer_command(bar, MouseEvent::LeftDown { x, y });
            }
            Some(Command::Focus {
                x: x as u32,
                y: y as u32,
            })
        }
        MouseEvent::RightDown { .. } => Some(Command::ZoomOut),
    }
}

/// Pack RGB pixels into minifb's `0RGB` words.
pub fn to_argb(frame: &RgbImage, buffer: &mut Vec<u32>) {
    buffer.clear();
    buffer.extend(
        frame
            .pixels()
            .map(|p| (p.0[0] as u32) << 16 | (p.0[1] as u32) << 8 | p.0[2] as u32),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argb_packing() {
        let frame = RgbImage::from_pixel(2, 1, image::Rgb([0x12, 0x34, 0x56]));
        let mut buf = vec![7; 10];
        to_argb(&frame, &mut buf);
        assert_eq!(buf, vec![0x123456, 0x123456]);
    }

    #[test]
    fn clicks_on_bar_select_and_clear_styles() {
        let mut bar = ButtonBar::with_labels(640, 480, ["A", "B"]);
        let down = MouseEvent::LeftDown { x: 20.0, y: 20.0 };
        assert_eq!(pointer_command(&mut bar, down), Some(Command::SelectStyle(0)));
        assert_eq!(pointer_command(&mut bar, down), Some(Command::DisableStyle));
        let miss = MouseEvent::LeftDown { x: 300.0, y: 300.0 };
        assert_eq!(pointer_command(&mut bar, miss), None);
    }

    #[test]
    fn double_click_focuses_and_right_click_zooms_out() {
        let mut bar = ButtonBar::with_labels(640, 480, ["A"]);
        assert_eq!(
            pointer_command(&mut bar, MouseEvent::DoubleClick { x: 300.0, y: 200.0 }),
            Some(Command::Focus { x: 300, y: 200 })
        );
        assert_eq!(
            pointer_command(&mut bar, MouseEvent::RightDown { x: 1.0, y: 1.0 }),
            Some(Command::ZoomOut)
        );
    }
}
