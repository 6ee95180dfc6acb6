//! Audio worker: the Idle ⇄ Recording loop around the capture session.
//!
//! Polled every `tick`; never touches the bus except to push the final
//! `AudioInput`.
//!
//! ```text
//!  Idle ── take_armed() ──▶ device.start ──▶ Recording
//!   ▲          (start failed: log, back to Idle)         │
//!   │                                                    │
//!   └── stop stream, take samples, transcribe ◀──────────┘
//!        (deadline reached, or request_stop left the Recording phase)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::{AudioCaptureSession, CaptureDevice, CaptureStream};
use crate::bus::{Event, EventBus};
use crate::stt::TranscriptionEngine;

enum State {
    Idle,
    Recording {
        stream: Box<dyn CaptureStream>,
        started: Instant,
    },
}

/// Why a recording ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Deadline,
    Manual,
}

pub struct AudioWorker {
    bus: Arc<EventBus>,
    session: Arc<AudioCaptureSession>,
    device: Box<dyn CaptureDevice>,
    stt: Arc<dyn TranscriptionEngine>,
    tick: Duration,
    state: State,
}

impl AudioWorker {
    pub fn new(
        bus: Arc<EventBus>,
        session: Arc<AudioCaptureSession>,
        device: Box<dyn CaptureDevice>,
        stt: Arc<dyn TranscriptionEngine>,
        tick: Duration,
    ) -> Self {
        Self {
            bus,
            session,
            device,
            stt,
            tick,
            state: State::Idle,
        }
    }

    /// Poll until `running` turns `false`.  A recording still in progress
    /// at that point is stopped and discarded.
    pub fn run(mut self, running: &AtomicBool) {
        log::info!("audio: worker loop started (tick {}ms)", self.tick.as_millis());
        while running.load(Ordering::SeqCst) {
            self.step();
            std::thread::sleep(self.tick);
        }

        if let State::Recording { stream, .. } = std::mem::replace(&mut self.state, State::Idle) {
            log::info!("audio: discarding recording in progress");
            if let Err(e) = stream.stop() {
                log::warn!("audio: failed to stop capture: {e}");
            }
            self.session.finish();
            self.session.take_samples();
        }
        log::info!("audio: worker loop finished");
    }

    /// One tick of the state machine.
    fn step(&mut self) {
        match &self.state {
            State::Idle => {
                if self.session.take_armed() {
                    self.start_recording();
                }
            }
            State::Recording { started, .. } => {
                let reason = if started.elapsed() >= self.session.deadline() {
                    StopReason::Deadline
                } else if !self.session.is_recording() {
                    StopReason::Manual
                } else {
                    return;
                };
                self.stop_recording(reason);
            }
        }
    }

    /// Called right after `take_armed` moved the session into Recording.
    fn start_recording(&mut self) {
        match self.device.start(Arc::clone(&self.session)) {
            Ok(stream) => {
                log::info!(
                    "audio: recording started (max {}s)",
                    self.session.deadline().as_secs()
                );
                self.state = State::Recording {
                    stream,
                    started: Instant::now(),
                };
            }
            Err(e) => {
                log::error!("audio: failed to start capture: {e}");
                self.session.finish();
                self.session.take_samples();
            }
        }
    }

    fn stop_recording(&mut self, reason: StopReason) {
        let State::Recording { stream, started } = std::mem::replace(&mut self.state, State::Idle)
        else {
            return;
        };
        // Deadline path: clear the flag so the callback stops appending.
        self.session.finish();
        log::info!(
            "audio: recording stopped ({reason:?}) after {:.1}s",
            started.elapsed().as_secs_f32()
        );

        if let Err(e) = stream.stop() {
            log::error!("audio: failed to stop capture: {e}");
            self.session.take_samples();
            return;
        }

        let samples = self.session.take_samples();
        if samples.is_empty() {
            log::info!("audio: no samples captured");
            return;
        }

        let rate = self.device.sample_rate();
        let text = match self.stt.transcribe(&samples, rate) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("audio: transcription failed: {e}");
                String::new()
            }
        };
        let text = text.trim();
        if text.is_empty() {
            log::info!("audio: empty transcription, nothing to send");
            return;
        }
        log::info!("audio: heard {text:?}");
        self.bus.push(Event::audio_input(text));
    }

    #[cfg(test)]
    fn is_recording(&self) -> bool {
        matches!(self.state, State::Recording { .. })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
