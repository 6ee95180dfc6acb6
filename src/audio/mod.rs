//! Audio capture for push-to-talk recordings.
//!
//! ```text
//! cpal callback ──downmix──▶ AudioCaptureSession::append
//!                                   │
//!               audio worker ◀── take_samples() after Recording → Idle
//! ```

pub mod capture;
pub mod resample;
pub mod session;

pub use capture::{CaptureDevice, CaptureError, CaptureStream, CpalCapture};
pub use resample::{downmix, resample_linear, WHISPER_SAMPLE_RATE};
pub use session::AudioCaptureSession;

#[cfg(test)]
pub use capture::FeederDevice;
