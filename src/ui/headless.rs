//! Headless front end: the foreground tick on a fixed frame interval, with
//! the bubble rendered to the log.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::ui::bubble::{Rect, TerminalSurface};
use crate::ui::foreground::{Flow, Foreground, PetCommand};

/// Nominal pet rectangle, so headless bubble frames are still meaningful.
const HEADLESS_ANCHOR: Rect = Rect::new(150.0, 250.0, 200.0, 200.0);

/// Tick `foreground` every `frame` until a `Shutdown` event is dispatched.
///
/// Commands from `commands` (global hotkeys) are applied before each tick.
/// A closed command channel is not an exit condition.
pub fn run_headless(
    foreground: &mut Foreground<TerminalSurface>,
    commands: &mut mpsc::Receiver<PetCommand>,
    frame: Duration,
) {
    log::info!("foreground: headless loop started ({}ms frames)", frame.as_millis());
    foreground.set_anchor(HEADLESS_ANCHOR);

    let mut last = Instant::now();
    loop {
        while let Ok(command) = commands.try_recv() {
            foreground.handle_command(command);
        }

        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f32();
        last = now;

        let flow = foreground.tick(dt);
        // No window: the move is only logged and remembered.
        if let Some((x, y)) = foreground.take_pending_move() {
            log::info!("foreground: pet moved to ({x}, {y})");
            foreground.note_window_position(x, y);
        }
        if flow == Flow::Exit {
            break;
        }

        let spent = now.elapsed();
        if let Some(rest) = frame.checked_sub(spent) {
            std::thread::sleep(rest);
        }
    }
    log::info!("foreground: headless loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::audio::AudioCaptureSession;
    use crate::bus::{Event, EventBus};
    use crate::script::{HostApi, ScriptHost};
    use crate::ui::NotificationSurface;

    fn foreground(bus: &Arc<EventBus>) -> Foreground<TerminalSurface> {
        foreground_with_api(bus).0
    }

    fn foreground_with_api(bus: &Arc<EventBus>) -> (Foreground<TerminalSurface>, HostApi) {
        let session = Arc::new(AudioCaptureSession::new(Duration::from_secs(20)));
        let api = HostApi::new(Arc::clone(bus));
        let scripts = ScriptHost::new(api.clone()).unwrap();
        let fg = Foreground::new(Arc::clone(bus), session, scripts, TerminalSurface::new(3.0), 8);
        (fg, api)
    }

    #[test]
    fn exits_on_quit_command() {
        let bus = Arc::new(EventBus::new());
        let mut fg = foreground(&bus);
        let (tx, mut rx) = mpsc::channel(4);
        tx.try_send(PetCommand::hello()).unwrap();
        tx.try_send(PetCommand::Quit).unwrap();

        run_headless(&mut fg, &mut rx, Duration::from_millis(1));

        // The think request stays queued for the inference worker.
        assert_eq!(bus.len(), 1);
        assert_eq!(bus.try_pop().unwrap().into_payload(), "hello");
    }

    #[test]
    fn shows_messages_before_shutdown() {
        let bus = Arc::new(EventBus::new());
        let mut fg = foreground(&bus);
        let (_tx, mut rx) = mpsc::channel(4);
        bus.push(Event::show_message("hi from the worker"));
        bus.push(Event::shutdown());

        run_headless(&mut fg, &mut rx, Duration::from_millis(1));

        assert!(fg.surface().is_visible());
        assert_eq!(fg.surface().bubble().message(), Some("hi from the worker"));
        let frame = fg.surface().bubble().frame().unwrap();
        assert!(frame.bottom() <= HEADLESS_ANCHOR.y);
    }

    #[test]
    fn script_moves_are_consumed_even_on_the_exit_tick() {
        let bus = Arc::new(EventBus::new());
        let (mut fg, api) = foreground_with_api(&bus);
        let (_tx, mut rx) = mpsc::channel(4);
        bus.push(Event::execute_script("pet.moveTo(30, 40)"));
        bus.push(Event::shutdown());

        run_headless(&mut fg, &mut rx, Duration::from_millis(1));

        assert_eq!(fg.take_pending_move(), None);
        assert_eq!(api.position(), (30.0, 40.0));
    }

    #[test]
    fn closed_command_channel_does_not_stop_the_loop() {
        let bus = Arc::new(EventBus::new());
        let mut fg = foreground(&bus);
        let (tx, mut rx) = mpsc::channel::<PetCommand>(1);
        drop(tx);

        let pusher = {
            let bus = Arc::clone(&bus);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(30));
                bus.push(Event::shutdown());
            })
        };
        let started = Instant::now();
        run_headless(&mut fg, &mut rx, Duration::from_millis(2));
        assert!(started.elapsed() >= Duration::from_millis(25));
        pusher.join().unwrap();
    }
}
