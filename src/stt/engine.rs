//! Transcription engine trait and the Whisper implementation.
//!
//! [`TranscriptionEngine`] is what the audio worker calls.  It is object-safe
//! and `Send + Sync` so it can be shared as `Arc<dyn TranscriptionEngine>`.
//!
//! [`WhisperEngine`] wraps a `whisper_rs::WhisperContext` loaded from a GGML
//! file.  Input at any sample rate is resampled to 16 kHz before inference.
//!
//! [`RecordingStt`] (under `#[cfg(test)]`) returns a fixed transcript and
//! records every call.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, WhisperContext, WhisperContextParameters};

use crate::audio::{resample_linear, WHISPER_SAMPLE_RATE};
use crate::stt::transcribe::{SamplingStrategy, Segment, TranscribeParams, TranscriptionResult};

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum SttError {
    /// The GGML model file was not found at the given path.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// whisper-rs failed to create a context or state.
    #[error("whisper context initialisation failed: {0}")]
    ContextInit(String),

    /// The inference pass failed.
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Shorter than whisper's minimum input.
    #[error("audio too short: {0} samples at 16 kHz, need at least {MIN_AUDIO_SAMPLES}")]
    AudioTooShort(usize),
}

// ---------------------------------------------------------------------------
// TranscriptionEngine trait
// ---------------------------------------------------------------------------

/// Mono PCM in, recognised text out.
///
/// An empty string means no speech was recognised.  Callers treat `Err` the
/// same way after logging it.
pub trait TranscriptionEngine: Send + Sync {
    fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String, SttError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn TranscriptionEngine>) {}
};

/// 100 ms at 16 kHz; whisper.cpp refuses shorter input.
const MIN_AUDIO_SAMPLES: usize = 1_600;

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

/// Whisper-backed engine.  A fresh `WhisperState` is created per call, so a
/// shared engine needs no locking.
pub struct WhisperEngine {
    ctx: WhisperContext,
    params: TranscribeParams,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

// SAFETY: the model weights are read-only after loading and whisper-rs
// declares WhisperContext Send + Sync; TranscribeParams is plain data.
unsafe impl Send for WhisperEngine {}
unsafe impl Sync for WhisperEngine {}

impl WhisperEngine {
    /// Load a GGML model.
    ///
    /// # Errors
    ///
    /// - [`SttError::ModelNotFound`] if `model_path` does not exist.
    /// - [`SttError::ContextInit`] if whisper-rs cannot load it.
    pub fn load(model_path: impl AsRef<Path>, params: TranscribeParams) -> Result<Self, SttError> {
        let path = model_path.as_ref();
        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }
        let path_str = path.to_str().ok_or_else(|| {
            SttError::ModelNotFound(format!("non-UTF-8 model path: {}", path.display()))
        })?;

        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        log::info!(
            "stt: loaded {} (language={}, threads={})",
            path.display(),
            params.language,
            params.n_threads
        );
        Ok(Self { ctx, params })
    }

    /// Transcribe 16 kHz mono audio with per-segment timing.
    pub fn transcribe_full(&self, audio: &[f32]) -> Result<TranscriptionResult, SttError> {
        if audio.len() < MIN_AUDIO_SAMPLES {
            return Err(SttError::AudioTooShort(audio.len()));
        }

        use whisper_rs::SamplingStrategy as WS;
        let strategy = match self.params.strategy {
            SamplingStrategy::Greedy { best_of } => WS::Greedy { best_of },
            SamplingStrategy::BeamSearch { beam_size, patience } => {
                WS::BeamSearch { beam_size, patience }
            }
        };

        let mut fp = FullParams::new(strategy);
        let lang = (self.params.language != "auto").then_some(self.params.language.as_str());
        fp.set_language(lang);
        fp.set_n_threads(self.params.n_threads);
        fp.set_print_progress(false);
        fp.set_print_realtime(false);
        fp.set_print_special(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        let started = std::time::Instant::now();
        state
            .full(fp, audio)
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let mut text = String::new();
        let mut segments = Vec::with_capacity(n_segments.max(0) as usize);
        for i in 0..n_segments {
            let seg_text = state
                .full_get_segment_text(i)
                .map_err(|e| SttError::Transcription(format!("segment {i}: {e}")))?;
            // Centiseconds.
            let t0 = state.full_get_segment_t0(i).unwrap_or(0).max(0) as u64 * 10;
            let t1 = state.full_get_segment_t1(i).unwrap_or(0).max(0) as u64 * 10;

            text.push_str(&seg_text);
            segments.push(Segment {
                text: seg_text,
                start_ms: t0,
                end_ms: t1,
            });
        }

        Ok(TranscriptionResult {
            text: text.trim().to_string(),
            segments,
            duration_ms: started.elapsed().as_millis(),
        })
    }
}

impl TranscriptionEngine for WhisperEngine {
    fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String, SttError> {
        let audio = resample_linear(samples, sample_rate, WHISPER_SAMPLE_RATE);
        let result = self.transcribe_full(&audio)?;
        log::debug!(
            "stt: {} segment(s) in {} ms",
            result.segments.len(),
            result.duration_ms
        );
        Ok(result.text)
    }
}

// ---------------------------------------------------------------------------
// RecordingStt  (test-only)
// ---------------------------------------------------------------------------

/// Test double returning a fixed response and recording each call's sample
/// count and rate.
#[cfg(test)]
pub struct RecordingStt {
    response: Result<String, SttError>,
    calls: std::sync::Mutex<Vec<(usize, u32)>>,
}

#[cfg(test)]
impl RecordingStt {
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            response: Ok(text.into()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn err(error: SttError) -> Self {
        Self {
            response: Err(error),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// `(sample_count, sample_rate)` of every call so far.
    pub fn calls(&self) -> Vec<(usize, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl TranscriptionEngine for RecordingStt {
    fn transcribe(&self, samples: &[f32], sample_rate: u32) -> Result<String, SttError> {
        self.calls.lock().unwrap().push((samples.len(), sample_rate));
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::transcribe::optimal_threads;

    #[test]
    fn recording_stt_returns_text_and_records_calls() {
        let engine = RecordingStt::ok("hello pet");
        assert_eq!(engine.transcribe(&[0.0; 320], 16_000).unwrap(), "hello pet");
        assert_eq!(engine.transcribe(&[0.0; 10], 48_000).unwrap(), "hello pet");
        assert_eq!(engine.calls(), vec![(320, 16_000), (10, 48_000)]);
    }

    #[test]
    fn recording_stt_err_is_returned() {
        let engine = RecordingStt::err(SttError::Transcription("boom".into()));
        assert!(matches!(
            engine.transcribe(&[0.0; 4], 16_000),
            Err(SttError::Transcription(_))
        ));
        assert_eq!(engine.calls().len(), 1);
    }

    #[test]
    fn load_missing_model_returns_model_not_found() {
        let result = WhisperEngine::load("/nonexistent/ggml-base.bin", TranscribeParams::default());
        assert!(
            matches!(result, Err(SttError::ModelNotFound(_))),
            "expected ModelNotFound, got: {result:?}"
        );
    }

    #[test]
    fn load_garbage_file_fails_to_init() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ggml-bogus.bin");
        std::fs::write(&path, b"not a model").unwrap();
        assert!(WhisperEngine::load(&path, TranscribeParams::default()).is_err());
    }

    #[test]
    fn box_dyn_engine_compiles() {
        let engine: Box<dyn TranscriptionEngine> = Box::new(RecordingStt::ok(""));
        assert_eq!(engine.transcribe(&[], 16_000).unwrap(), "");
    }

    #[test]
    fn error_display_mentions_detail() {
        assert!(SttError::ModelNotFound("/a/b.bin".into())
            .to_string()
            .contains("/a/b.bin"));
        assert!(SttError::AudioTooShort(12).to_string().contains("12"));
    }

    #[test]
    fn optimal_threads_is_bounded() {
        let t = optimal_threads();
        assert!((1..=8).contains(&t));
    }
}
