//! Colours and proportions of the on-screen controls. Sizes are fractions of
//! the frame so the bar scales with the camera resolution.

use image::Rgb;

pub const BUTTON_OFF: Rgb<u8> = Rgb([169, 169, 169]);
pub const BUTTON_ON: Rgb<u8> = Rgb([96, 178, 255]);
pub const BUTTON_TEXT: Rgb<u8> = Rgb([50, 50, 50]);
pub const RECORDING: Rgb<u8> = Rgb([255, 0, 0]);
pub const STATUS_TEXT: Rgb<u8> = Rgb([255, 255, 255]);

pub const BUTTON_WIDTH_RATE: f32 = 0.1;
pub const BUTTON_HEIGHT_RATE: f32 = 0.06;
pub const BUTTON_GAP_RATE: f32 = 0.0325;
pub const BAR_LEFT_RATE: f32 = 0.02;
pub const BAR_TOP: u32 = 10;

/// Label height relative to the button height.
pub const TEXT_HEIGHT_RATE: f32 = 0.55;
