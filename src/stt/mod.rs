//! Speech-to-text.
//!
//! ```text
//! samples @ device rate ──resample──▶ 16 kHz mono ──whisper──▶ text
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use desktop_pet::stt::{TranscribeParams, TranscriptionEngine, WhisperEngine};
//!
//! let engine = WhisperEngine::load("models/ggml-base.bin", TranscribeParams::default())
//!     .expect("model file missing");
//! let silence = vec![0.0_f32; 48_000];
//! let text = engine.transcribe(&silence, 48_000).unwrap();
//! println!("{text:?}");
//! ```

pub mod engine;
pub mod transcribe;

pub use engine::{SttError, TranscriptionEngine, WhisperEngine};
pub use transcribe::{SamplingStrategy, Segment, TranscribeParams, TranscriptionResult};

#[cfg(test)]
pub use engine::RecordingStt;
