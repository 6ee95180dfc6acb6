//! Microphone capture.
//!
//! [`CaptureDevice`] is the seam between the audio worker and the hardware.
//! [`CpalCapture`] opens the default `cpal` input device once at startup and
//! builds a fresh stream for every recording; the stream's callback
//! downmixes each buffer to mono and appends it to the shared
//! [`AudioCaptureSession`].
//!
//! `cpal::Stream` is not `Send` on every platform, so a [`CaptureStream`]
//! lives and dies on the thread that called [`CaptureDevice::start`].

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use crate::audio::resample::downmix;
use crate::audio::session::AudioCaptureSession;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to stop audio stream: {0}")]
    PauseStream(#[from] cpal::PauseStreamError),

    /// Failure reported by a non-cpal device.
    #[error("capture device error: {0}")]
    Device(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Something that can record into an [`AudioCaptureSession`].
///
/// Owned by the audio worker thread, hence only `Send`.
pub trait CaptureDevice: Send {
    /// Start delivering mono samples to `session.append`.
    fn start(
        &mut self,
        session: Arc<AudioCaptureSession>,
    ) -> Result<Box<dyn CaptureStream>, CaptureError>;

    /// Rate of the samples delivered to the session, in Hz.
    fn sample_rate(&self) -> u32;
}

/// A running recording.  Dropping it also stops delivery.
pub trait CaptureStream {
    fn stop(self: Box<Self>) -> Result<(), CaptureError>;
}

// ---------------------------------------------------------------------------
// CpalCapture
// ---------------------------------------------------------------------------

/// Default system microphone via `cpal`.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use desktop_pet::audio::{AudioCaptureSession, CaptureDevice, CpalCapture};
///
/// let session = Arc::new(AudioCaptureSession::new(Duration::from_secs(5)));
/// let mut mic = CpalCapture::new().unwrap();
/// session.arm();
/// session.take_armed();
/// let stream = mic.start(Arc::clone(&session)).unwrap();
/// std::thread::sleep(Duration::from_secs(1));
/// stream.stop().unwrap();
/// println!("{} samples @ {} Hz", session.take_samples().len(), mic.sample_rate());
/// ```
pub struct CpalCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    sample_rate: u32,
    channels: u16,
}

impl CpalCapture {
    /// Open the default input device and query its preferred config.
    pub fn new() -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;
        let supported = device.default_input_config()?;

        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        log::info!(
            "audio: input device '{}' at {sample_rate} Hz, {channels} channel(s)",
            device.name().unwrap_or_else(|_| "unknown".into())
        );

        Ok(Self {
            device,
            config,
            sample_rate,
            channels,
        })
    }
}

impl CaptureDevice for CpalCapture {
    fn start(
        &mut self,
        session: Arc<AudioCaptureSession>,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let channels = self.channels;
        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                session.append(&downmix(data, channels));
            },
            |err: cpal::StreamError| {
                log::error!("audio: stream error: {err}");
            },
            None,
        )?;
        stream.play()?;
        Ok(Box::new(CpalStream { stream }))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

struct CpalStream {
    stream: cpal::Stream,
}

impl CaptureStream for CpalStream {
    fn stop(self: Box<Self>) -> Result<(), CaptureError> {
        self.stream.pause()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FeederDevice  (test-only)
// ---------------------------------------------------------------------------

/// Fake microphone: a background thread appends a constant chunk every
/// millisecond until the stream is stopped.
#[cfg(test)]
pub struct FeederDevice {
    pub sample_rate: u32,
    pub chunk: Vec<f32>,
    /// Makes every `start` call fail.
    pub fail_start: bool,
    pub starts: Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl FeederDevice {
    pub fn new() -> Self {
        Self {
            sample_rate: 16_000,
            chunk: vec![0.25; 16],
            fail_start: false,
            starts: Arc::new(std::sync::atomic::AtomicUsize::new(0)),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_start: true,
            ..Self::new()
        }
    }
}

#[cfg(test)]
struct FeederStream {
    running: Arc<std::sync::atomic::AtomicBool>,
    feeder: Option<std::thread::JoinHandle<()>>,
}

#[cfg(test)]
impl CaptureDevice for FeederDevice {
    fn start(
        &mut self,
        session: Arc<AudioCaptureSession>,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        use std::sync::atomic::{AtomicBool, Ordering};

        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(CaptureError::Device("feeder refused to start".into()));
        }
        let running = Arc::new(AtomicBool::new(true));
        let chunk = self.chunk.clone();
        let flag = Arc::clone(&running);
        let feeder = std::thread::spawn(move || {
            while flag.load(Ordering::SeqCst) {
                session.append(&chunk);
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        });
        Ok(Box::new(FeederStream {
            running,
            feeder: Some(feeder),
        }))
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
impl CaptureStream for FeederStream {
    fn stop(mut self: Box<Self>) -> Result<(), CaptureError> {
        self.running
            .store(false, std::sync::atomic::Ordering::SeqCst);
        if let Some(feeder) = self.feeder.take() {
            let _ = feeder.join();
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
