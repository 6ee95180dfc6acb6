//! Whisper run parameters and results.

use crate::config::SttConfig;

/// Owned, `Clone` mirror of `whisper_rs::SamplingStrategy`.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplingStrategy {
    /// Single-pass decoding; lowest latency.
    Greedy { best_of: i32 },
    /// Beam search; slower, slightly more accurate.
    BeamSearch { beam_size: i32, patience: f32 },
}

impl Default for SamplingStrategy {
    fn default() -> Self {
        Self::Greedy { best_of: 1 }
    }
}

/// Settings for one transcription run.
///
/// ```
/// use desktop_pet::stt::TranscribeParams;
///
/// let params = TranscribeParams {
///     language: "en".into(),
///     ..TranscribeParams::default()
/// };
/// assert_eq!(params.language, "en");
/// ```
#[derive(Debug, Clone)]
pub struct TranscribeParams {
    /// ISO-639-1 code, or `"auto"`.
    pub language: String,
    pub strategy: SamplingStrategy,
    pub n_threads: i32,
}

impl Default for TranscribeParams {
    fn default() -> Self {
        Self {
            language: "auto".into(),
            strategy: SamplingStrategy::default(),
            n_threads: optimal_threads(),
        }
    }
}

impl TranscribeParams {
    pub fn from_config(config: &SttConfig) -> Self {
        Self {
            language: config.language.clone(),
            ..Self::default()
        }
    }
}

/// Available parallelism, capped at 8.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

/// Output of [`WhisperEngine::transcribe_full`](crate::stt::WhisperEngine::transcribe_full).
#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    /// Concatenated, trimmed transcript.
    pub text: String,
    pub segments: Vec<Segment>,
    /// Wall-clock inference time.
    pub duration_ms: u128,
}

/// One time-aligned chunk of the transcript.
#[derive(Debug, Clone)]
pub struct Segment {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
}
