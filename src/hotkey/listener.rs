//! Dedicated OS thread running `rdev::listen`.
//!
//! `rdev::listen` blocks forever and has no shutdown API.  Dropping the
//! [`HotkeyListener`] sets a flag that makes the callback discard further
//! events; the thread itself stays parked in the OS hook until exit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::KeyBindings;
use crate::ui::PetCommand;

pub struct HotkeyListener {
    stop: Arc<AtomicBool>,
    /// Never joined; `rdev::listen` does not return.
    _thread: std::thread::JoinHandle<()>,
}

impl HotkeyListener {
    /// Spawn the listener thread.  Presses of a bound key are sent on `tx`.
    ///
    /// Uses `try_send` so a stalled foreground can never block the OS input
    /// hook; commands that do not fit are dropped with a warning.
    ///
    /// Returns `None` if the thread could not be spawned.
    pub fn start(bindings: KeyBindings, tx: mpsc::Sender<PetCommand>) -> Option<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let spawned = std::thread::Builder::new()
            .name("hotkey-listener".into())
            .spawn(move || {
                let result = rdev::listen(move |event| {
                    if stop_flag.load(Ordering::Relaxed) {
                        return;
                    }
                    let rdev::EventType::KeyPress(key) = event.event_type else {
                        return;
                    };
                    if let Some(command) = bindings.command_for(key) {
                        if let Err(e) = tx.try_send(command) {
                            log::warn!("hotkey: dropped command: {e}");
                        }
                    }
                });
                if let Err(e) = result {
                    log::error!("hotkey: rdev::listen exited with error: {e:?}");
                }
            });

        match spawned {
            Ok(thread) => {
                log::info!(
                    "hotkey: listening (record={:?}, hello={:?}, time={:?}, quit={:?})",
                    bindings.record,
                    bindings.hello,
                    bindings.time,
                    bindings.quit
                );
                Some(Self {
                    stop,
                    _thread: thread,
                })
            }
            Err(e) => {
                log::error!("hotkey: failed to spawn listener thread: {e}");
                None
            }
        }
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
