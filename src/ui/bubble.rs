//! Speech bubble state and the surface abstraction behind it.
//!
//! [`NotificationSurface`] is what the foreground dispatcher talks to.
//! [`Bubble`] is the platform-neutral implementation: it owns the message,
//! the auto-hide timer and the placement above the pet.  Backends only read
//! it.  The egui window paints it; [`TerminalSurface`] logs it.

use std::fmt;

/// Text-to-frame padding, horizontal and vertical.
const PADDING: (f32, f32) = (40.0, 30.0);
const MIN_WIDTH: f32 = 100.0;
const MAX_WIDTH: f32 = 400.0;
const MIN_HEIGHT: f32 = 60.0;
/// Vertical gap between bubble and anchor.
const GAP: f32 = 10.0;

/// Rough glyph metrics of the bubble font, for backends that cannot measure.
const GLYPH_WIDTH: f32 = 10.0;
const LINE_HEIGHT: f32 = 24.0;

// ---------------------------------------------------------------------------
// Rect
// ---------------------------------------------------------------------------

/// Axis-aligned rectangle in screen or window pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// Estimate the rendered size of `text` when wrapped to the widest bubble.
pub fn estimate_text_size(text: &str) -> (f32, f32) {
    let wrap = MAX_WIDTH - PADDING.0;
    let per_line = (wrap / GLYPH_WIDTH).floor().max(1.0) as usize;

    let mut widest = 0usize;
    let mut lines = 0usize;
    for line in text.lines() {
        let chars = line.chars().count();
        widest = widest.max(chars.min(per_line));
        lines += chars.div_ceil(per_line).max(1);
    }
    (widest as f32 * GLYPH_WIDTH, lines.max(1) as f32 * LINE_HEIGHT)
}

/// Bubble frame for text of `text_size`, centred above `anchor`.
///
/// The frame is padded, clamped to 100–400 px wide and at least 60 px tall,
/// and sits 10 px above the anchor.  With `bounds` the frame is shifted to
/// stay inside them (left and top edges win).
pub fn place(text_size: (f32, f32), anchor: Rect, bounds: Option<Rect>) -> Rect {
    let width = (text_size.0 + PADDING.0).clamp(MIN_WIDTH, MAX_WIDTH);
    let height = (text_size.1 + PADDING.1).max(MIN_HEIGHT);
    position(width, height, anchor, bounds)
}

fn position(width: f32, height: f32, anchor: Rect, bounds: Option<Rect>) -> Rect {
    let mut x = anchor.x + (anchor.width - width) / 2.0;
    let mut y = anchor.y - height - GAP;

    if let Some(b) = bounds {
        if x + width > b.right() {
            x = b.right() - width;
        }
        x = x.max(b.x);
        y = y.max(b.y);
    }
    Rect::new(x, y, width, height)
}

// ---------------------------------------------------------------------------
// NotificationSurface
// ---------------------------------------------------------------------------

/// Where `ShowMessage` text ends up.
pub trait NotificationSurface {
    /// Display `text` near `anchor` and restart the display timer.
    fn show(&mut self, text: &str, anchor: Rect);
    /// Follow a moved anchor.  No-op while hidden.
    fn update_position(&mut self, anchor: Rect);
    fn hide(&mut self);
    /// Advance the display timer by `dt` seconds; hides when it expires.
    fn tick(&mut self, dt: f32);
    fn is_visible(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Bubble
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Bubble {
    message: String,
    frame: Rect,
    elapsed: f32,
    display_secs: f32,
    visible: bool,
    bounds: Option<Rect>,
}

impl Bubble {
    pub fn new(display_secs: f32) -> Self {
        Self {
            message: String::new(),
            frame: Rect::default(),
            elapsed: 0.0,
            display_secs,
            visible: false,
            bounds: None,
        }
    }

    /// Keep the bubble inside `bounds` (screen work area or window).
    pub fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn set_bounds(&mut self, bounds: Option<Rect>) {
        self.bounds = bounds;
    }

    /// Visible message, if any.
    pub fn message(&self) -> Option<&str> {
        self.visible.then_some(self.message.as_str())
    }

    /// Frame of the visible bubble.
    pub fn frame(&self) -> Option<Rect> {
        self.visible.then_some(self.frame)
    }

    /// Seconds the current message has been shown.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn display_secs(&self) -> f32 {
        self.display_secs
    }
}

impl NotificationSurface for Bubble {
    fn show(&mut self, text: &str, anchor: Rect) {
        self.message.clear();
        self.message.push_str(text);
        self.frame = place(estimate_text_size(text), anchor, self.bounds);
        self.elapsed = 0.0;
        self.visible = true;
    }

    fn update_position(&mut self, anchor: Rect) {
        if !self.visible {
            return;
        }
        self.frame = position(self.frame.width, self.frame.height, anchor, self.bounds);
    }

    fn hide(&mut self) {
        self.visible = false;
    }

    fn tick(&mut self, dt: f32) {
        if !self.visible {
            return;
        }
        self.elapsed += dt;
        if self.elapsed >= self.display_secs {
            self.hide();
        }
    }

    fn is_visible(&self) -> bool {
        self.visible
    }
}

// ---------------------------------------------------------------------------
// TerminalSurface
// ---------------------------------------------------------------------------

/// Headless backend: a [`Bubble`] whose show and hide go to the log.
#[derive(Debug, Clone)]
pub struct TerminalSurface {
    bubble: Bubble,
}

impl TerminalSurface {
    pub fn new(display_secs: f32) -> Self {
        Self {
            bubble: Bubble::new(display_secs),
        }
    }

    pub fn bubble(&self) -> &Bubble {
        &self.bubble
    }
}

impl NotificationSurface for TerminalSurface {
    fn show(&mut self, text: &str, anchor: Rect) {
        self.bubble.show(text, anchor);
        log::info!("pet says: {text}");
    }

    fn update_position(&mut self, anchor: Rect) {
        self.bubble.update_position(anchor);
    }

    fn hide(&mut self) {
        if self.bubble.is_visible() {
            log::debug!("bubble: hidden");
        }
        self.bubble.hide();
    }

    fn tick(&mut self, dt: f32) {
        let was_visible = self.bubble.is_visible();
        self.bubble.tick(dt);
        if was_visible && !self.bubble.is_visible() {
            log::debug!("bubble: expired");
        }
    }

    fn is_visible(&self) -> bool {
        self.bubble.is_visible()
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) {}x{}",
            self.x, self.y, self.width, self.height
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
