//! Shared state of one microphone, recording or not.
//!
//! [`AudioCaptureSession`] replaces process-wide flags: the foreground arms
//! and stops it, the capture callback appends to it, and the audio worker
//! drives the Idle → Recording → Idle cycle.  Everyone holds it through an
//! `Arc`.
//!
//! ```text
//!            arm()                  take_armed()
//!  Idle ───────────▶ Armed ─────────────────────▶ Recording
//!   ▲  ◀── toggle() ───┘                              │
//!   └──── finish() ◀── deadline or request_stop() ────┘
//! ```
//!
//! Phase and buffer share one lock, so every transition is atomic with
//! respect to the others and to the capture callback.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Armed,
    Recording,
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    samples: Vec<f32>,
}

/// Three-phase capture machine plus its sample buffer.
#[derive(Debug)]
pub struct AudioCaptureSession {
    inner: Mutex<Inner>,
    deadline: Duration,
}

impl AudioCaptureSession {
    pub fn new(deadline: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                phase: Phase::Idle,
                samples: Vec::new(),
            }),
            deadline,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Foreground side
    // -----------------------------------------------------------------------

    /// Ask the audio worker to start recording on its next tick.
    ///
    /// Ignored while a recording is already in progress.
    pub fn arm(&self) {
        let mut inner = self.lock();
        if inner.phase == Phase::Idle {
            inner.phase = Phase::Armed;
        }
    }

    /// Manual stop.  Clears the recording condition and any pending arm; the
    /// worker notices on its next tick.
    pub fn request_stop(&self) {
        self.lock().phase = Phase::Idle;
    }

    /// Toggle used by the record key.
    ///
    /// Idle arms a new recording and returns `true`.  A pending arm is
    /// cancelled and a recording in progress is stopped; both return
    /// `false`.
    pub fn toggle(&self) -> bool {
        let mut inner = self.lock();
        match inner.phase {
            Phase::Idle => {
                inner.phase = Phase::Armed;
                true
            }
            Phase::Armed | Phase::Recording => {
                inner.phase = Phase::Idle;
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Worker side
    // -----------------------------------------------------------------------

    /// Consume a pending arm request and enter Recording with an empty
    /// buffer.  Returns `false` (and changes nothing) when not armed.
    pub fn take_armed(&self) -> bool {
        let mut inner = self.lock();
        if inner.phase != Phase::Armed {
            return false;
        }
        inner.samples.clear();
        inner.phase = Phase::Recording;
        true
    }

    /// Leave Recording (timeout path or capture failure).  A fresh arm made
    /// after the recording was stopped is kept.
    pub fn finish(&self) {
        let mut inner = self.lock();
        if inner.phase == Phase::Recording {
            inner.phase = Phase::Idle;
        }
    }

    /// Move the captured samples out, leaving the buffer empty.
    pub fn take_samples(&self) -> Vec<f32> {
        std::mem::take(&mut self.lock().samples)
    }

    // -----------------------------------------------------------------------
    // Capture callback side
    // -----------------------------------------------------------------------

    /// Append mono samples.  Dropped unless a recording is in progress.
    pub fn append(&self, data: &[f32]) {
        let mut inner = self.lock();
        if inner.phase == Phase::Recording {
            inner.samples.extend_from_slice(data);
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn is_recording(&self) -> bool {
        self.lock().phase == Phase::Recording
    }

    pub fn is_armed(&self) -> bool {
        self.lock().phase == Phase::Armed
    }

    /// Maximum recording length.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub fn sample_count(&self) -> usize {
        self.lock().samples.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn session() -> AudioCaptureSession {
        AudioCaptureSession::new(Duration::from_secs(20))
    }

    fn recording() -> AudioCaptureSession {
        let s = session();
        s.arm();
        assert!(s.take_armed());
        s
    }

    #[test]
    fn arm_is_consumed_once() {
        let s = session();
        s.arm();
        assert!(s.is_armed());
        assert!(s.take_armed());
        assert!(s.is_recording());
        assert!(!s.take_armed());
    }

    #[test]
    fn arm_is_ignored_while_recording() {
        let s = recording();
        s.arm();
        assert!(!s.is_armed());
        assert!(s.is_recording());
    }

    #[test]
    fn append_only_while_recording() {
        let s = session();
        s.append(&[0.1, 0.2]);
        assert_eq!(s.sample_count(), 0);

        s.arm();
        s.append(&[0.1, 0.2]);
        assert_eq!(s.sample_count(), 0, "armed is not recording");

        assert!(s.take_armed());
        s.append(&[0.1, 0.2]);
        s.append(&[0.3]);
        assert_eq!(s.sample_count(), 3);

        s.finish();
        s.append(&[0.4]);
        assert_eq!(s.take_samples(), vec![0.1, 0.2, 0.3]);
        assert_eq!(s.sample_count(), 0);
    }

    #[test]
    fn new_recording_starts_with_empty_buffer() {
        let s = recording();
        s.append(&[1.0; 10]);
        s.finish();
        s.arm();
        assert!(s.take_armed());
        assert_eq!(s.sample_count(), 0);
    }

    #[test]
    fn request_stop_clears_recording_and_pending_arm() {
        let s = session();
        s.arm();
        s.request_stop();
        assert!(!s.take_armed());

        let s = recording();
        s.request_stop();
        assert!(!s.is_recording());
    }

    #[test]
    fn toggle_arms_then_stops() {
        let s = session();
        assert!(s.toggle());
        assert!(s.take_armed());
        assert!(!s.toggle());
        assert!(!s.is_recording());
        assert!(!s.is_armed());
    }

    #[test]
    fn toggle_while_armed_cancels_the_pending_start() {
        let s = session();
        assert!(s.toggle());
        assert!(!s.toggle());
        assert!(!s.is_armed());
        assert!(!s.take_armed());
        assert!(!s.is_recording());
    }

    #[test]
    fn stop_racing_the_worker_never_leaves_a_stale_arm() {
        // Press lands after the worker consumed the arm but before the
        // recording would have been visible under two separate flags.
        let s = session();
        assert!(s.toggle());
        assert!(s.take_armed());
        assert!(!s.toggle(), "second press must stop, not re-arm");
        s.finish();
        assert!(!s.is_armed());
        assert!(!s.take_armed(), "no second recording may start");
    }

    #[test]
    fn finish_keeps_an_arm_made_after_the_stop() {
        let s = recording();
        s.request_stop();
        s.arm();
        s.finish();
        assert!(s.is_armed());
    }

    #[test]
    fn no_append_lands_after_request_stop() {
        let s = Arc::new(recording());
        let writer = {
            let s = Arc::clone(&s);
            thread::spawn(move || {
                for _ in 0..2_000 {
                    s.append(&[0.5; 8]);
                }
            })
        };
        thread::sleep(Duration::from_millis(1));
        s.request_stop();
        let at_stop = s.sample_count();
        writer.join().unwrap();
        assert_eq!(s.sample_count(), at_stop);
        assert_eq!(at_stop % 8, 0);
    }

    #[test]
    fn concurrent_appends_are_not_lost() {
        let s = Arc::new(recording());
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let s = Arc::clone(&s);
                thread::spawn(move || {
                    for _ in 0..250 {
                        s.append(&[0.5; 4]);
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }
        assert_eq!(s.sample_count(), 4 * 250 * 4);
    }
}
