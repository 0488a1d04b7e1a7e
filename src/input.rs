//! Keyboard and mouse decoding for the preview window.
//!
//! minifb only exposes polled state, so clicks and double clicks are derived
//! from press edges here.

use std::time::{Duration, Instant};

use minifb::Key;

pub const DOUBLE_CLICK_INTERVAL: Duration = Duration::from_millis(400);
pub const DOUBLE_CLICK_DISTANCE: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MouseEvent {
    LeftDown { x: f32, y: f32 },
    DoubleClick { x: f32, y: f32 },
    RightDown { x: f32, y: f32 },
}

#[derive(Debug, Default)]
pub struct MouseTracker {
    left_was_down: bool,
    right_was_down: bool,
    last_click: Option<(Instant, f32, f32)>,
}

impl MouseTracker {
    /// Feed one poll of mouse state. Returns at most one event per button
    /// edge; the second press of a double click yields only `DoubleClick`.
    pub fn update(
        &mut self,
        pos: Option<(f32, f32)>,
        left: bool,
        right: bool,
        now: Instant,
    ) -> Vec<MouseEvent> {
        let mut events = Vec::new();
        let left_edge = left && !self.left_was_down;
        let right_edge = right && !self.right_was_down;
        self.left_was_down = left;
        self.right_was_down = right;

        let Some((x, y)) = pos else {
            return events;
        };

        if left_edge {
            let double = self.last_click.is_some_and(|(t, px, py)| {
                now.duration_since(t) <= DOUBLE_CLICK_INTERVAL
                    && (x - px).hypot(y - py) <= DOUBLE_CLICK_DISTANCE
            });
            if double {
                self.last_click = None;
                events.push(MouseEvent::DoubleClick { x, y });
            } else {
                self.last_click = Some((now, x, y));
                events.push(MouseEvent::LeftDown { x, y });
            }
        }
        if right_edge {
            events.push(MouseEvent::RightDown { x, y });
        }
        events
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    ZoomIn,
    ZoomOut,
    ZoomReset,
    Snapshot,
    EnableStyle,
    ToggleRecording,
    ToggleMask,
    ToggleMirror,
}

pub fn key_action(key: Key) -> Option<KeyAction> {
    let action = match key {
        Key::Q | Key::Escape => KeyAction::Quit,
        Key::Z => KeyAction::ZoomIn,
        Key::X => KeyAction::ZoomOut,
        Key::V => KeyAction::ZoomReset,
        Key::P => KeyAction::Snapshot,
        Key::S => KeyAction::EnableStyle,
        Key::R => KeyAction::ToggleRecording,
        Key::F => KeyAction::ToggleMask,
        Key::M => KeyAction::ToggleMirror,
        _ => return None,
    };
    Some(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_edge_emits_single_click() {
        let mut m = MouseTracker::default();
        let t = Instant::now();
        let pos = Some((10.0, 10.0));
        assert_eq!(
            m.update(pos, true, false, t),
            vec![MouseEvent::LeftDown { x: 10.0, y: 10.0 }]
        );
        // held down: no repeat
        assert!(m.update(pos, true, false, t + Duration::from_millis(16)).is_empty());
    }

    #[test]
    fn quick_second_press_is_double_click() {
        let mut m = MouseTracker::default();
        let t = Instant::now();
        let pos = Some((10.0, 10.0));
        m.update(pos, true, false, t);
        m.update(pos, false, false, t + Duration::from_millis(80));
        let ev = m.update(Some((11.0, 10.0)), true, false, t + Duration::from_millis(160));
        assert_eq!(ev, vec![MouseEvent::DoubleClick { x: 11.0, y: 10.0 }]);
        // a third press starts over
        m.update(pos, false, false, t + Duration::from_millis(200));
        let ev = m.update(pos, true, false, t + Duration::from_millis(240));
        assert_eq!(ev, vec![MouseEvent::LeftDown { x: 10.0, y: 10.0 }]);
    }

    #[test]
    fn slow_or_distant_presses_are_single_clicks() {
        let mut m = MouseTracker::default();
        let t = Instant::now();
        m.update(Some((10.0, 10.0)), true, false, t);
        m.update(Some((10.0, 10.0)), false, false, t + Duration::from_millis(10));
        let ev = m.update(Some((10.0, 10.0)), true, false, t + Duration::from_millis(900));
        assert!(matches!(ev[0], MouseEvent::LeftDown { .. }));
        m.update(Some((10.0, 10.0)), false, false, t + Duration::from_millis(910));
        let ev = m.update(Some((60.0, 10.0)), true, false, t + Duration::from_millis(950));
        assert!(matches!(ev[0], MouseEvent::LeftDown { .. }));
    }

    #[test]
    fn right_press_and_outside_window() {
        let mut m = MouseTracker::default();
        let t = Instant::now();
        assert!(m.update(None, false, true, t).is_empty());
        m.update(None, false, false, t);
        assert_eq!(
            m.update(Some((1.0, 2.0)), false, true, t),
            vec![MouseEvent::RightDown { x: 1.0, y: 2.0 }]
        );
    }

    #[test]
    fn keys_map_to_actions() {
        assert_eq!(key_action(Key::Q), Some(KeyAction::Quit));
        assert_eq!(key_action(Key::Z), Some(KeyAction::ZoomIn));
        assert_eq!(key_action(Key::R), Some(KeyAction::ToggleRecording));
        assert_eq!(key_action(Key::A), None);
    }
}
