//! Channel downmix and sample-rate conversion.
//!
//! Whisper wants 16 kHz mono `f32`.  The capture callback calls [`downmix`]
//! on every hardware buffer; the transcription engine calls
//! [`resample_linear`] once per recording.  Linear interpolation is enough
//! for speech.

/// Sample rate expected by the transcription engine.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Average interleaved frames of `channels` samples down to one channel.
///
/// ```rust
/// use desktop_pet::audio::downmix;
///
/// assert_eq!(downmix(&[0.5, -0.5, 1.0, 0.0], 2), vec![0.0, 0.5]);
/// assert_eq!(downmix(&[0.25, 0.75], 1), vec![0.25, 0.75]);
/// ```
pub fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = usize::from(n);
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Convert `samples` from `from_rate` to `to_rate` by linear interpolation.
///
/// Equal rates return a copy.  A zero rate yields an empty buffer.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return samples.to_vec();
    }
    if samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return Vec::new();
    }

    let step = f64::from(from_rate) / f64::from(to_rate);
    let out_len = (samples.len() as f64 / step).ceil() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64) as f32;
            samples[idx] + (samples[next] - samples[idx]) * frac
        })
        .collect()
}
