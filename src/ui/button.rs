use super::theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub bounds: Bounds,
    pub toggled: bool,
}

impl Button {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bounds: Bounds::default(),
            toggled: false,
        }
    }

    /// Hit test, inclusive on every edge.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        let b = self.bounds;
        (b.x..=b.x + b.w).contains(&x) && (b.y..=b.y + b.h).contains(&y)
    }
}

/// Result of a click that landed on a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Selected(usize),
    Cleared,
}

/// A row of mutually exclusive toggle buttons along the top of the frame.
#[derive(Debug, Clone, Default)]
pub struct ButtonBar {
    buttons: Vec<Button>,
    frame: (u32, u32),
}

impl ButtonBar {
    pub fn new(frame_w: u32, frame_h: u32) -> Self {
        Self {
            buttons: Vec::new(),
            frame: (frame_w, frame_h),
        }
    }

    pub fn with_labels<I, S>(frame_w: u32, frame_h: u32, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut bar = Self::new(frame_w, frame_h);
        for label in labels {
            bar.add_button(Button::new(label));
        }
        bar
    }

    pub fn add_button(&mut self, button: Button) {
        self.buttons.push(button);
        self.layout(self.frame.0, self.frame.1);
    }

    pub fn buttons(&self) -> &[Button] {
        &self.buttons
    }

    pub fn frame_size(&self) -> (u32, u32) {
        self.frame
    }

    /// Size every button for a `w` x `h` frame and lay them out left to right.
    pub fn layout(&mut self, w: u32, h: u32) {
        self.frame = (w, h);
        let bw = (w as f32 * theme::BUTTON_WIDTH_RATE) as u32;
        let bh = (h as f32 * theme::BUTTON_HEIGHT_RATE) as u32;
        let gap = (w as f32 * theme::BUTTON_GAP_RATE) as u32;
        let mut x = (w as f32 * theme::BAR_LEFT_RATE) as u32;
        for button in &mut self.buttons {
            button.bounds = Bounds {
                x,
                y: theme::BAR_TOP,
                w: bw,
                h: bh,
            };
            x += bw + gap;
        }
    }

    pub fn selected(&self) -> Option<usize> {
        self.buttons.iter().position(|b| b.toggled)
    }

    /// Select `index` exclusively, or clear everything with `None`.
    pub fn select(&mut self, index: Option<usize>) {
        for (i, b) in self.buttons.iter_mut().enumerate() {
            b.toggled = Some(i) == index;
        }
    }

    /// Clicking an off button selects it alone; clicking the on button clears
    /// the bar. Misses leave the state untouched.
    pub fn click(&mut self, x: u32, y: u32) -> Option<Selection> {
        let hit = self.buttons.iter().position(|b| b.contains(x, y))?;
        if self.buttons[hit].toggled {
            self.select(None);
            Some(Selection::Cleared)
        } else {
            self.select(Some(hit));
            Some(Selection::Selected(hit))
        }
    }
}
