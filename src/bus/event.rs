//! Typed event protocol carried by the [`EventBus`](crate::bus::EventBus).
//!
//! Every message that crosses a thread boundary is an [`Event`]: a closed
//! [`EventKind`] tag plus a string payload.  The payload meaning depends on
//! the kind:
//!
//! | Kind            | Producer          | Consumer        | Payload                      |
//! |-----------------|-------------------|-----------------|------------------------------|
//! | `AudioInput`    | audio worker      | inference       | transcribed user speech      |
//! | `ThinkRequest`  | foreground input  | inference       | user text to answer          |
//! | `ExecuteScript` | inference         | foreground      | Lua source to run            |
//! | `UiUpdate`      | inference, script | foreground      | expression name              |
//! | `ShowMessage`   | inference, script | foreground      | bubble text                  |
//! | `MovePet`       | script            | foreground      | window position `"x,y"`      |
//! | `Shutdown`      | foreground input  | foreground      | ignored                      |

use std::fmt;

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// Closed set of event tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Speech recognised by the audio worker.
    AudioInput,
    /// Text the pet should respond to.
    ThinkRequest,
    /// A script for the foreground's scripting sandbox.
    ExecuteScript,
    /// Change the pet's expression.
    UiUpdate,
    /// Display a message bubble.
    ShowMessage,
    /// Move the pet window to a screen position.
    MovePet,
    /// Terminate the foreground loop.
    Shutdown,
}

impl EventKind {
    /// Returns `true` for kinds consumed by the inference worker.
    ///
    /// ```
    /// use desktop_pet::bus::EventKind;
    ///
    /// assert!(EventKind::AudioInput.is_inference_request());
    /// assert!(EventKind::ThinkRequest.is_inference_request());
    /// assert!(!EventKind::ShowMessage.is_inference_request());
    /// ```
    pub fn is_inference_request(self) -> bool {
        matches!(self, EventKind::AudioInput | EventKind::ThinkRequest)
    }

    /// Returns `true` for kinds dispatched by the foreground loop.
    pub fn is_foreground(self) -> bool {
        matches!(
            self,
            EventKind::ExecuteScript
                | EventKind::UiUpdate
                | EventKind::ShowMessage
                | EventKind::MovePet
                | EventKind::Shutdown
        )
    }

    /// Short label used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            EventKind::AudioInput => "audio-input",
            EventKind::ThinkRequest => "think",
            EventKind::ExecuteScript => "exec-script",
            EventKind::UiUpdate => "ui-update",
            EventKind::ShowMessage => "show-message",
            EventKind::MovePet => "move-pet",
            EventKind::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// An immutable message unit crossing the bus.
///
/// Ownership moves into the bus on push and out to the popping consumer on
/// pop; events are never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    kind: EventKind,
    payload: String,
}

impl Event {
    pub fn new(kind: EventKind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    pub fn audio_input(text: impl Into<String>) -> Self {
        Self::new(EventKind::AudioInput, text)
    }

    pub fn think(text: impl Into<String>) -> Self {
        Self::new(EventKind::ThinkRequest, text)
    }

    pub fn execute_script(source: impl Into<String>) -> Self {
        Self::new(EventKind::ExecuteScript, source)
    }

    pub fn ui_update(expression: impl Into<String>) -> Self {
        Self::new(EventKind::UiUpdate, expression)
    }

    pub fn show_message(text: impl Into<String>) -> Self {
        Self::new(EventKind::ShowMessage, text)
    }

    /// Window top-left in logical screen pixels.
    pub fn move_pet(x: f32, y: f32) -> Self {
        Self::new(EventKind::MovePet, format!("{x},{y}"))
    }

    pub fn shutdown() -> Self {
        Self::new(EventKind::Shutdown, "")
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Consume the event and return its payload.
    pub fn into_payload(self) -> String {
        self.payload
    }

    /// Coordinates of a `MovePet` event.  `None` for other kinds or a
    /// malformed payload.
    pub fn position(&self) -> Option<(f32, f32)> {
        if self.kind != EventKind::MovePet {
            return None;
        }
        let (x, y) = self.payload.split_once(',')?;
        let x: f32 = x.trim().parse().ok()?;
        let y: f32 = y.trim().parse().ok()?;
        (x.is_finite() && y.is_finite()).then_some((x, y))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_kind_and_payload() {
        let ev = Event::think("hello");
        assert_eq!(ev.kind(), EventKind::ThinkRequest);
        assert_eq!(ev.payload(), "hello");

        assert_eq!(Event::audio_input("x").kind(), EventKind::AudioInput);
        assert_eq!(Event::execute_script("x").kind(), EventKind::ExecuteScript);
        assert_eq!(Event::ui_update("happy").kind(), EventKind::UiUpdate);
        assert_eq!(Event::show_message("hi").kind(), EventKind::ShowMessage);
        assert_eq!(Event::move_pet(1.0, 2.0).kind(), EventKind::MovePet);
        assert_eq!(Event::shutdown().kind(), EventKind::Shutdown);
        assert_eq!(Event::shutdown().payload(), "");
    }

    #[test]
    fn every_kind_has_exactly_one_consumer() {
        let all = [
            EventKind::AudioInput,
            EventKind::ThinkRequest,
            EventKind::ExecuteScript,
            EventKind::UiUpdate,
            EventKind::ShowMessage,
            EventKind::MovePet,
            EventKind::Shutdown,
        ];
        for kind in all {
            assert_ne!(
                kind.is_inference_request(),
                kind.is_foreground(),
                "{kind} must belong to exactly one consumer"
            );
        }
    }

    #[test]
    fn move_pet_carries_position() {
        let ev = Event::move_pet(120.0, -40.5);
        assert_eq!(ev.payload(), "120,-40.5");
        assert_eq!(ev.position(), Some((120.0, -40.5)));
    }

    #[test]
    fn position_rejects_other_kinds_and_garbage() {
        assert_eq!(Event::show_message("1,2").position(), None);
        assert_eq!(Event::new(EventKind::MovePet, "1;2").position(), None);
        assert_eq!(Event::new(EventKind::MovePet, "x,2").position(), None);
        assert_eq!(Event::new(EventKind::MovePet, "NaN,2").position(), None);
        assert_eq!(Event::new(EventKind::MovePet, " 3 , 4 ").position(), Some((3.0, 4.0)));
    }

    #[test]
    fn into_payload_moves_text_out() {
        let ev = Event::show_message("bubble text");
        assert_eq!(ev.into_payload(), "bubble text");
    }

    #[test]
    fn event_is_send() {
        fn assert_send<T: Send + 'static>() {}
        assert_send::<Event>();
    }
}
