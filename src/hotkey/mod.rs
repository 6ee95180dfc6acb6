//! Global hotkeys, backed by `rdev`.
//!
//! [`KeyBindings`] maps the four configurable keys to [`PetCommand`]s.
//! [`HotkeyListener::start`] runs `rdev::listen` on its own OS thread and
//! forwards matching key presses over a `tokio::sync::mpsc` channel that the
//! foreground drains each frame.
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use desktop_pet::config::HotkeyConfig;
//! use desktop_pet::hotkey::{HotkeyListener, KeyBindings};
//!
//! let bindings = KeyBindings::from_config(&HotkeyConfig::default()).unwrap();
//! let (tx, mut rx) = mpsc::channel(16);
//! let _listener = HotkeyListener::start(bindings, tx);
//! while let Ok(command) = rx.try_recv() {
//!     println!("{command:?}");
//! }
//! ```

pub mod listener;

pub use listener::HotkeyListener;

use thiserror::Error;

use crate::config::HotkeyConfig;
use crate::ui::PetCommand;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown key name '{name}' for hotkey.{binding}")]
pub struct HotkeyError {
    pub binding: &'static str,
    pub name: String,
}

// ---------------------------------------------------------------------------
// parse_key
// ---------------------------------------------------------------------------

/// Parse a key name such as `"F9"`, `"Esc"` or `"h"` into an [`rdev::Key`].
///
/// ```
/// use desktop_pet::hotkey::parse_key;
///
/// assert_eq!(parse_key("F9"), Some(rdev::Key::F9));
/// assert_eq!(parse_key("esc"), Some(rdev::Key::Escape));
/// assert_eq!(parse_key("h"), Some(rdev::Key::KeyH));
/// assert_eq!(parse_key("Ctrl+V"), None);
/// ```
pub fn parse_key(name: &str) -> Option<rdev::Key> {
    use rdev::Key::*;

    const FUNCTION_KEYS: [rdev::Key; 12] = [F1, F2, F3, F4, F5, F6, F7, F8, F9, F10, F11, F12];
    const LETTERS: [rdev::Key; 26] = [
        KeyA, KeyB, KeyC, KeyD, KeyE, KeyF, KeyG, KeyH, KeyI, KeyJ, KeyK, KeyL, KeyM, KeyN, KeyO,
        KeyP, KeyQ, KeyR, KeyS, KeyT, KeyU, KeyV, KeyW, KeyX, KeyY, KeyZ,
    ];

    let name = name.trim();
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            let idx = (c.to_ascii_lowercase() as u8 - b'a') as usize;
            return Some(LETTERS[idx]);
        }
        if let Some(d) = c.to_digit(10) {
            const DIGITS: [rdev::Key; 10] =
                [Num0, Num1, Num2, Num3, Num4, Num5, Num6, Num7, Num8, Num9];
            return Some(DIGITS[d as usize]);
        }
    }

    if let Some(n) = name
        .strip_prefix(|c: char| c == 'F' || c == 'f')
        .and_then(|n| n.parse::<usize>().ok())
    {
        return (1..=12).contains(&n).then(|| FUNCTION_KEYS[n - 1]);
    }

    let key = match name.to_ascii_lowercase().as_str() {
        "escape" | "esc" => Escape,
        "space" => Space,
        "return" | "enter" => Return,
        "tab" => Tab,
        "backspace" => Backspace,
        "delete" | "del" => Delete,
        "home" => Home,
        "end" => End,
        "pageup" => PageUp,
        "pagedown" => PageDown,
        "up" | "uparrow" => UpArrow,
        "down" | "downarrow" => DownArrow,
        "left" | "leftarrow" => LeftArrow,
        "right" | "rightarrow" => RightArrow,
        "pause" => Pause,
        "printscreen" => PrintScreen,
        _ => return None,
    };
    Some(key)
}

// ---------------------------------------------------------------------------
// KeyBindings
// ---------------------------------------------------------------------------

/// Resolved global hotkeys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyBindings {
    pub record: rdev::Key,
    pub hello: rdev::Key,
    pub time: rdev::Key,
    pub quit: rdev::Key,
}

impl KeyBindings {
    pub fn from_config(config: &HotkeyConfig) -> Result<Self, HotkeyError> {
        let resolve = |binding: &'static str, name: &str| {
            parse_key(name).ok_or_else(|| HotkeyError {
                binding,
                name: name.to_string(),
            })
        };
        Ok(Self {
            record: resolve("record_key", &config.record_key)?,
            hello: resolve("hello_key", &config.hello_key)?,
            time: resolve("time_key", &config.time_key)?,
            quit: resolve("quit_key", &config.quit_key)?,
        })
    }

    /// Command bound to a pressed `key`, if any.
    pub fn command_for(&self, key: rdev::Key) -> Option<PetCommand> {
        if key == self.record {
            Some(PetCommand::ToggleRecording)
        } else if key == self.hello {
            Some(PetCommand::hello())
        } else if key == self.time {
            Some(PetCommand::ask_time())
        } else if key == self.quit {
            Some(PetCommand::Quit)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
