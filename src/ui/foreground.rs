//! The foreground loop body, shared by the windowed and headless front ends.
//!
//! Each frame the front end calls [`Foreground::tick`], which advances the
//! bubble timer and drains at most `max_events_per_tick` foreground events
//! from the bus without blocking.  User input arrives as [`PetCommand`]s
//! through [`Foreground::handle_command`].

use std::sync::Arc;

use crate::audio::AudioCaptureSession;
use crate::bus::{Event, EventBus, EventKind};
use crate::script::ScriptHost;
use crate::ui::bubble::{NotificationSurface, Rect};

/// Expression shown before any `UiUpdate` arrives.
pub const DEFAULT_EXPRESSION: &str = "idle";

/// Canned request for the "hello" input.
pub const HELLO_TEXT: &str = "hello";
/// Canned request for the "time" input.
pub const TIME_TEXT: &str = "what time is it";
/// Canned request sent when the pet is clicked.
pub const POKE_TEXT: &str = "user clicked me";

// ---------------------------------------------------------------------------
// PetCommand / Flow
// ---------------------------------------------------------------------------

/// User intent, independent of where the input came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PetCommand {
    /// Start a recording, or stop the one in progress.
    ToggleRecording,
    /// Ask the pet something.
    Think(String),
    /// Leave the application.
    Quit,
}

impl PetCommand {
    pub fn hello() -> Self {
        Self::Think(HELLO_TEXT.into())
    }

    pub fn ask_time() -> Self {
        Self::Think(TIME_TEXT.into())
    }

    pub fn poke() -> Self {
        Self::Think(POKE_TEXT.into())
    }
}

/// Whether the foreground loop keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

// ---------------------------------------------------------------------------
// Foreground
// ---------------------------------------------------------------------------

pub struct Foreground<S: NotificationSurface> {
    bus: Arc<EventBus>,
    session: Arc<AudioCaptureSession>,
    scripts: ScriptHost,
    surface: S,
    expression: String,
    anchor: Rect,
    /// Window position requested by a script, not yet applied.
    pending_move: Option<(f32, f32)>,
    max_events_per_tick: usize,
    exited: bool,
}

impl<S: NotificationSurface> Foreground<S> {
    pub fn new(
        bus: Arc<EventBus>,
        session: Arc<AudioCaptureSession>,
        scripts: ScriptHost,
        surface: S,
        max_events_per_tick: usize,
    ) -> Self {
        Self {
            bus,
            session,
            scripts,
            surface,
            expression: DEFAULT_EXPRESSION.into(),
            anchor: Rect::default(),
            pending_move: None,
            max_events_per_tick: max_events_per_tick.max(1),
            exited: false,
        }
    }

    // -----------------------------------------------------------------------
    // Input
    // -----------------------------------------------------------------------

    pub fn handle_command(&mut self, command: PetCommand) {
        match command {
            PetCommand::ToggleRecording => {
                if self.session.toggle() {
                    log::info!("foreground: recording requested");
                } else {
                    log::info!("foreground: recording stop or cancel requested");
                }
            }
            PetCommand::Think(text) => {
                log::debug!("foreground: think request {text:?}");
                self.bus.push(Event::think(text));
            }
            PetCommand::Quit => {
                log::info!("foreground: quit requested");
                self.bus.push(Event::shutdown());
            }
        }
    }

    /// Move the bubble anchor (the pet's on-screen rectangle).
    pub fn set_anchor(&mut self, anchor: Rect) {
        if anchor != self.anchor {
            self.anchor = anchor;
            self.surface.update_position(anchor);
        }
    }

    /// Report where the window really is, for `pet.getPosition()`.
    pub fn note_window_position(&self, x: f32, y: f32) {
        self.scripts.api().note_position(x, y);
    }

    // -----------------------------------------------------------------------
    // Frame
    // -----------------------------------------------------------------------

    /// Advance timers by `dt` seconds and dispatch pending events.
    ///
    /// Returns [`Flow::Exit`] once a `Shutdown` event has been dispatched;
    /// later calls keep returning it.
    pub fn tick(&mut self, dt: f32) -> Flow {
        if self.exited {
            return Flow::Exit;
        }
        self.surface.tick(dt);

        for _ in 0..self.max_events_per_tick {
            let Some(event) = self.bus.try_pop_where(|e| e.kind().is_foreground()) else {
                break;
            };
            if self.dispatch(event) == Flow::Exit {
                self.exited = true;
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    fn dispatch(&mut self, event: Event) -> Flow {
        match event.kind() {
            EventKind::ExecuteScript => {
                if let Err(e) = self.scripts.execute(event.payload()) {
                    log::warn!("script: {e}");
                }
            }
            EventKind::UiUpdate => {
                log::debug!("foreground: expression {} -> {}", self.expression, event.payload());
                self.expression = event.into_payload();
            }
            EventKind::ShowMessage => {
                self.surface.show(event.payload(), self.anchor);
            }
            EventKind::MovePet => match event.position() {
                Some(position) => self.pending_move = Some(position),
                None => log::warn!("foreground: bad move payload {:?}", event.payload()),
            },
            EventKind::Shutdown => {
                log::info!("foreground: shutdown event received");
                return Flow::Exit;
            }
            kind @ (EventKind::AudioInput | EventKind::ThinkRequest) => {
                log::debug!("foreground: ignoring {kind}");
            }
        }
        Flow::Continue
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Latest window position requested by a script; cleared by the call.
    /// Several moves within one tick collapse into the last.
    pub fn take_pending_move(&mut self) -> Option<(f32, f32)> {
        self.pending_move.take()
    }

    /// Name of the current pet expression.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_recording()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{speech_script, HostApi};
    use std::time::Duration;

    /// Surface that records every call.
    #[derive(Default)]
    struct RecordingSurface {
        shown: Vec<(String, Rect)>,
        moved: Vec<Rect>,
        ticks: usize,
    }

    impl NotificationSurface for RecordingSurface {
        fn show(&mut self, text: &str, anchor: Rect) {
            self.shown.push((text.to_string(), anchor));
        }
        fn update_position(&mut self, anchor: Rect) {
            self.moved.push(anchor);
        }
        fn hide(&mut self) {}
        fn tick(&mut self, _dt: f32) {
            self.ticks += 1;
        }
        fn is_visible(&self) -> bool {
            !self.shown.is_empty()
        }
    }

    fn foreground(max: usize) -> Foreground<RecordingSurface> {
        let bus = Arc::new(EventBus::new());
        let session = Arc::new(AudioCaptureSession::new(Duration::from_secs(20)));
        let scripts = ScriptHost::new(HostApi::new(Arc::clone(&bus))).unwrap();
        Foreground::new(bus, session, scripts, RecordingSurface::default(), max)
    }

    #[test]
    fn show_message_reaches_surface_with_anchor() {
        let mut fg = foreground(8);
        let pet = Rect::new(10.0, 20.0, 100.0, 100.0);
        fg.set_anchor(pet);
        fg.bus().push(Event::show_message("hi"));

        assert_eq!(fg.tick(0.016), Flow::Continue);
        assert_eq!(fg.surface().shown, vec![("hi".to_string(), pet)]);
        assert_eq!(fg.surface().moved, vec![pet]);
        assert_eq!(fg.surface().ticks, 1);
    }

    #[test]
    fn ui_update_changes_expression() {
        let mut fg = foreground(8);
        assert_eq!(fg.expression(), DEFAULT_EXPRESSION);
        fg.bus().push(Event::ui_update("happy"));
        fg.tick(0.0);
        assert_eq!(fg.expression(), "happy");
    }

    #[test]
    fn speech_script_ends_up_in_bubble() {
        let mut fg = foreground(8);
        fg.bus().push(Event::execute_script(speech_script("I'm a pet")));
        fg.tick(0.0);
        // The script's ShowMessage is queued behind it and dispatched in the
        // same tick.
        assert_eq!(fg.surface().shown.len(), 1);
        assert_eq!(fg.surface().shown[0].0, "I'm a pet");
    }

    #[test]
    fn broken_script_is_not_fatal() {
        let mut fg = foreground(8);
        fg.bus().push(Event::execute_script("this is not lua"));
        fg.bus().push(Event::show_message("after"));
        assert_eq!(fg.tick(0.0), Flow::Continue);
        assert_eq!(fg.surface().shown[0].0, "after");
    }

    #[test]
    fn batch_is_bounded_per_tick() {
        let mut fg = foreground(2);
        for i in 0..5 {
            fg.bus().push(Event::show_message(i.to_string()));
        }
        fg.tick(0.0);
        assert_eq!(fg.surface().shown.len(), 2);
        fg.tick(0.0);
        fg.tick(0.0);
        assert_eq!(fg.surface().shown.len(), 5);
    }

    #[test]
    fn inference_events_are_left_for_the_worker() {
        let mut fg = foreground(8);
        fg.bus().push(Event::think("for inference"));
        fg.bus().push(Event::show_message("for me"));
        fg.tick(0.0);
        assert_eq!(fg.surface().shown.len(), 1);
        assert_eq!(fg.bus().len(), 1);
        assert_eq!(fg.bus().try_pop().unwrap().kind(), EventKind::ThinkRequest);
    }

    #[test]
    fn shutdown_event_exits_and_stays_exited() {
        let mut fg = foreground(8);
        fg.bus().push(Event::shutdown());
        fg.bus().push(Event::show_message("never shown"));
        assert_eq!(fg.tick(0.0), Flow::Exit);
        assert_eq!(fg.tick(0.0), Flow::Exit);
        assert!(fg.surface().shown.is_empty());
    }

    #[test]
    fn commands_map_to_bus_and_session() {
        let mut fg = foreground(8);

        fg.handle_command(PetCommand::hello());
        fg.handle_command(PetCommand::ask_time());
        fg.handle_command(PetCommand::poke());
        let payloads: Vec<String> = std::iter::from_fn(|| fg.bus().try_pop())
            .map(Event::into_payload)
            .collect();
        assert_eq!(payloads, vec![HELLO_TEXT, TIME_TEXT, POKE_TEXT]);

        fg.handle_command(PetCommand::ToggleRecording);
        assert!(fg.session.is_armed());

        fg.handle_command(PetCommand::Quit);
        assert_eq!(fg.tick(0.0), Flow::Exit);
    }

    #[test]
    fn script_move_becomes_one_pending_move() {
        let mut fg = foreground(8);
        assert_eq!(fg.take_pending_move(), None);
        fg.bus().push(Event::execute_script("pet.moveTo(10, 10)"));
        fg.bus().push(Event::execute_script("pet.setPosition(40, 80)"));
        fg.tick(0.0);
        assert_eq!(fg.take_pending_move(), Some((40.0, 80.0)));
        assert_eq!(fg.take_pending_move(), None);
    }

    #[test]
    fn malformed_move_is_ignored() {
        let mut fg = foreground(8);
        fg.bus().push(Event::new(EventKind::MovePet, "over there"));
        assert_eq!(fg.tick(0.0), Flow::Continue);
        assert_eq!(fg.take_pending_move(), None);
    }

    #[test]
    fn window_position_reaches_scripts() {
        let mut fg = foreground(8);
        fg.note_window_position(200.0, 100.0);
        fg.bus().push(Event::execute_script(
            "local p = pet.getPosition(); pet.moveTo(p.x + 5, p.y)",
        ));
        fg.tick(0.0);
        assert_eq!(fg.take_pending_move(), Some((205.0, 100.0)));
    }

    #[test]
    fn second_press_before_the_worker_cancels_the_recording() {
        let mut fg = foreground(8);
        fg.handle_command(PetCommand::ToggleRecording);
        fg.handle_command(PetCommand::ToggleRecording);
        assert!(!fg.session.is_armed());
        assert!(!fg.session.take_armed());
        assert!(!fg.is_recording());
    }

    #[test]
    fn toggle_while_recording_requests_stop() {
        let mut fg = foreground(8);
        fg.session.arm();
        assert!(fg.session.take_armed());
        assert!(fg.is_recording());
        fg.handle_command(PetCommand::ToggleRecording);
        assert!(!fg.is_recording());
        assert!(!fg.session.is_armed());
    }
}
