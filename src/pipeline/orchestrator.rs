//! Process lifecycle: init → run → shutdown.
//!
//! [`Orchestrator`] owns the [`EventBus`], the tokio runtime the completion
//! engine runs on, and everything that is handed to a worker exactly once
//! (the [`ContextWindow`] and the capture device).
//!
//! ```text
//! init          load engines, open microphone        (any failure → InitError)
//!  │
//! run           spawn inference-worker + audio-worker threads
//!  │            start hotkey listener
//!  │            foreground loop on this thread (egui window or headless)
//!  │
//! shutdown      bus.shutdown(), stop flags, join both workers
//! ```

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::audio::{AudioCaptureSession, CaptureDevice, CaptureError, CpalCapture};
use crate::bus::EventBus;
use crate::config::{AppPaths, ConfigError, PetConfig};
use crate::hotkey::{HotkeyError, HotkeyListener, KeyBindings};
use crate::llm::{ApiCompletionEngine, CompletionEngine, ContextWindow, EngineError};
use crate::script::{HostApi, ScriptError, ScriptHost};
use crate::stt::{SttError, TranscribeParams, TranscriptionEngine, WhisperEngine};
use crate::ui::{self, Bubble, Foreground, NotificationSurface, TerminalSurface};

use super::audio_worker::AudioWorker;
use super::handle::WorkerHandle;
use super::inference::InferenceWorker;

/// Capacity of the hotkey → foreground command channel.
const COMMAND_CHANNEL: usize = 32;

// ---------------------------------------------------------------------------
// InitError
// ---------------------------------------------------------------------------

/// Anything that stops the pet from starting.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("completion engine failed to load: {0}")]
    Engine(#[from] EngineError),

    #[error("transcription engine failed to load: {0}")]
    Stt(#[from] SttError),

    #[error("audio capture unavailable: {0}")]
    Capture(#[from] CaptureError),

    #[error("script host failed to start: {0}")]
    Script(#[from] ScriptError),

    #[error("invalid hotkey: {0}")]
    Hotkey(#[from] HotkeyError),

    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Runtime used by the completion engine: multi-thread, two workers.
pub fn build_runtime() -> Result<tokio::runtime::Runtime, InitError> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .map_err(InitError::Runtime)
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    config: PetConfig,
    bindings: KeyBindings,
    bus: Arc<EventBus>,
    session: Arc<AudioCaptureSession>,
    engine: Arc<dyn CompletionEngine>,
    stt: Arc<dyn TranscriptionEngine>,
    /// Taken by `start_workers`.
    device: Option<Box<dyn CaptureDevice>>,
    /// Taken by `start_workers`.
    context: Option<ContextWindow>,
    workers: Vec<WorkerHandle>,
    hotkeys: Option<HotkeyListener>,
    shut_down: bool,
    // Last field, so it drops after the engine.
    runtime: tokio::runtime::Runtime,
}

impl Orchestrator {
    // -----------------------------------------------------------------------
    // Init
    // -----------------------------------------------------------------------

    /// Validate `config`, load both engines and open the default microphone.
    pub fn init(config: PetConfig) -> Result<Self, InitError> {
        config.validate()?;
        let runtime = build_runtime()?;

        log::info!("orchestrator: loading completion engine ({})", config.llm.model);
        let engine = runtime.block_on(ApiCompletionEngine::load(&config.llm))?;

        let model_path = config.stt.resolve_model_path(&AppPaths::new());
        log::info!("orchestrator: loading transcription model {}", model_path.display());
        let stt = WhisperEngine::load(&model_path, TranscribeParams::from_config(&config.stt))?;

        let device = CpalCapture::new()?;

        Self::with_engines(
            config,
            runtime,
            Arc::new(engine),
            Arc::new(stt),
            Box::new(device),
        )
    }

    /// Assemble from already-loaded engines.
    pub fn with_engines(
        config: PetConfig,
        runtime: tokio::runtime::Runtime,
        engine: Arc<dyn CompletionEngine>,
        stt: Arc<dyn TranscriptionEngine>,
        device: Box<dyn CaptureDevice>,
    ) -> Result<Self, InitError> {
        config.validate()?;
        let bindings = KeyBindings::from_config(&config.hotkey)?;
        let context = ContextWindow::new(
            config.assistant.system_prompt.clone(),
            config.assistant.max_turns,
        );
        let session = Arc::new(AudioCaptureSession::new(Duration::from_secs(
            config.audio.recording_seconds,
        )));

        Ok(Self {
            config,
            bindings,
            bus: Arc::new(EventBus::new()),
            session,
            engine,
            stt,
            device: Some(device),
            context: Some(context),
            workers: Vec::new(),
            hotkeys: None,
            shut_down: false,
            runtime,
        })
    }

    // -----------------------------------------------------------------------
    // Run
    // -----------------------------------------------------------------------

    /// Spawn the inference and audio worker threads.  Later calls are no-ops.
    pub fn start_workers(&mut self) -> Result<(), InitError> {
        let (Some(context), Some(device)) = (self.context.take(), self.device.take()) else {
            return Ok(());
        };

        let inference = InferenceWorker::new(
            Arc::clone(&self.bus),
            Arc::clone(&self.engine),
            context,
            self.runtime.handle().clone(),
        );
        let handle = WorkerHandle::spawn("inference-worker", move |running| {
            let context = inference.run(&running);
            log::debug!("inference: {} messages in final history", context.len());
        })
        .map_err(|source| InitError::Spawn {
            name: "inference-worker",
            source,
        })?;
        self.workers.push(handle);

        // The capture stream is not Send; the worker is built on its thread.
        let bus = Arc::clone(&self.bus);
        let session = Arc::clone(&self.session);
        let stt = Arc::clone(&self.stt);
        let tick = Duration::from_millis(self.config.audio.tick_ms);
        let handle = WorkerHandle::spawn("audio-worker", move |running| {
            AudioWorker::new(bus, session, device, stt, tick).run(&running);
        })
        .map_err(|source| InitError::Spawn {
            name: "audio-worker",
            source,
        })?;
        self.workers.push(handle);
        Ok(())
    }

    /// Start the workers and the global hotkey listener, then run the
    /// foreground loop on the calling thread until the pet quits.
    pub fn run(&mut self, headless: bool) -> anyhow::Result<()> {
        self.start_workers()?;

        let (tx, mut rx) = mpsc::channel(COMMAND_CHANNEL);
        self.hotkeys = HotkeyListener::start(self.bindings, tx);
        if self.hotkeys.is_none() {
            log::warn!("orchestrator: running without global hotkeys");
        }

        if headless {
            let mut foreground = self.foreground(TerminalSurface::new(self.config.ui.bubble_secs))?;
            ui::run_headless(
                &mut foreground,
                &mut rx,
                Duration::from_millis(self.config.ui.frame_ms),
            );
            Ok(())
        } else {
            let foreground = self.foreground(Bubble::new(self.config.ui.bubble_secs))?;
            ui::run_windowed(foreground, rx, &self.config.ui)
        }
    }

    /// Foreground dispatcher bound to this orchestrator's bus and session.
    ///
    /// Runs the configured startup script first; a script that fails to
    /// load or run is logged and skipped.  Must be called on the thread that
    /// will tick it.
    pub fn foreground<S: NotificationSurface>(
        &self,
        surface: S,
    ) -> Result<Foreground<S>, InitError> {
        let scripts = ScriptHost::new(HostApi::new(Arc::clone(&self.bus)))?;
        if let Some(path) = self.config.scripts.resolve_init_path(&AppPaths::new()) {
            if let Err(e) = scripts.run_init(&path) {
                log::warn!("script: init script skipped: {e}");
            }
        }
        Ok(Foreground::new(
            Arc::clone(&self.bus),
            Arc::clone(&self.session),
            scripts,
            surface,
            self.config.ui.max_events_per_tick,
        ))
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Close the bus, stop and join both workers.  Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        log::info!("orchestrator: shutting down");

        self.bus.shutdown();
        for worker in &self.workers {
            worker.stop();
        }
        for worker in &mut self.workers {
            worker.join();
        }
        self.hotkeys = None;
        log::info!("orchestrator: shutdown complete");
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn session(&self) -> &Arc<AudioCaptureSession> {
        &self.session
    }

    pub fn config(&self) -> &PetConfig {
        &self.config
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use crate::audio::FeederDevice;
    use crate::bus::Event;
    use crate::llm::ScriptedEngine;
    use crate::stt::RecordingStt;
    use crate::ui::{Flow, PetCommand};

    fn test_config() -> PetConfig {
        let mut config = PetConfig::default();
        config.audio.tick_ms = 2;
        config.audio.recording_seconds = 30;
        config
    }

    fn orchestrator(
        engine: Arc<ScriptedEngine>,
        stt: Arc<RecordingStt>,
    ) -> Orchestrator {
        Orchestrator::with_engines(
            test_config(),
            build_runtime().unwrap(),
            engine,
            stt,
            Box::new(FeederDevice::new()),
        )
        .unwrap()
    }

    fn wait_until(what: &str, mut done: impl FnMut() -> bool) {
        let start = Instant::now();
        while !done() {
            assert!(start.elapsed() < Duration::from_secs(5), "timed out waiting for {what}");
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn invalid_config_is_an_init_error() {
        let mut config = test_config();
        config.assistant.max_turns = 0;
        let err = Orchestrator::with_engines(
            config,
            build_runtime().unwrap(),
            Arc::new(ScriptedEngine::ok("x")),
            Arc::new(RecordingStt::ok("x")),
            Box::new(FeederDevice::new()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, InitError::Config(ConfigError::ZeroMaxTurns)));
    }

    #[test]
    fn bad_hotkey_is_an_init_error() {
        let mut config = test_config();
        config.hotkey.quit_key = "NotAKey".into();
        let err = Orchestrator::with_engines(
            config,
            build_runtime().unwrap(),
            Arc::new(ScriptedEngine::ok("x")),
            Arc::new(RecordingStt::ok("x")),
            Box::new(FeederDevice::new()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, InitError::Hotkey(_)));
    }

    #[test]
    fn spoken_request_becomes_a_bubble() {
        let engine = Arc::new(ScriptedEngine::ok("Hello, human!"));
        let stt = Arc::new(RecordingStt::ok("hi pet"));
        let mut orch = orchestrator(Arc::clone(&engine), Arc::clone(&stt));
        orch.start_workers().unwrap();
        let mut fg = orch.foreground(TerminalSurface::new(3.0)).unwrap();

        // Record until samples arrive, then stop by hand.
        fg.handle_command(PetCommand::ToggleRecording);
        let session = Arc::clone(orch.session());
        wait_until("recording", || session.sample_count() > 0);
        fg.handle_command(PetCommand::ToggleRecording);

        wait_until("bubble", || {
            fg.tick(0.002);
            fg.surface().bubble().message() == Some("Hello, human!")
        });
        // UiUpdate is pushed right after the script; give it one more tick.
        wait_until("expression", || {
            fg.tick(0.002);
            fg.expression() == "happy"
        });

        assert_eq!(stt.calls().len(), 1);
        let prompts = engine.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("hi pet"));

        fg.handle_command(PetCommand::Quit);
        assert_eq!(fg.tick(0.0), Flow::Exit);
        orch.shutdown();
    }

    #[test]
    fn think_request_round_trip_and_failure_message() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            Ok("It is snack time.".into()),
            Err(EngineError::EmptyResponse),
        ]));
        let mut orch = orchestrator(Arc::clone(&engine), Arc::new(RecordingStt::ok("")));
        orch.start_workers().unwrap();
        let mut fg = orch.foreground(TerminalSurface::new(3.0)).unwrap();

        fg.handle_command(PetCommand::ask_time());
        wait_until("reply", || {
            fg.tick(0.0);
            fg.surface().bubble().message() == Some("It is snack time.")
        });

        fg.handle_command(PetCommand::hello());
        wait_until("error bubble", || {
            fg.tick(0.0);
            fg.surface()
                .bubble()
                .message()
                .is_some_and(|m| m.contains("empty completion"))
        });
        orch.shutdown();
    }

    #[test]
    fn shutdown_is_idempotent_and_joins_workers() {
        let mut orch = orchestrator(
            Arc::new(ScriptedEngine::ok("x")),
            Arc::new(RecordingStt::ok("x")),
        );
        orch.start_workers().unwrap();
        orch.start_workers().unwrap();
        assert_eq!(orch.workers.len(), 2);

        orch.shutdown();
        assert!(orch.workers.iter().all(WorkerHandle::is_finished));
        assert!(orch.bus().is_closed());
        orch.shutdown();
    }

    #[test]
    fn shutdown_while_recording_stops_the_audio_worker() {
        let stt = Arc::new(RecordingStt::ok("never"));
        let mut orch = orchestrator(Arc::new(ScriptedEngine::ok("x")), Arc::clone(&stt));
        orch.start_workers().unwrap();

        orch.session().arm();
        let session = Arc::clone(orch.session());
        wait_until("recording", || session.sample_count() > 0);

        orch.shutdown();
        assert!(!orch.session().is_recording());
        assert_eq!(orch.session().sample_count(), 0);
        assert!(stt.calls().is_empty());
        assert!(orch.bus().is_empty());
    }

    #[test]
    fn foreground_can_drain_after_shutdown() {
        let mut orch = orchestrator(
            Arc::new(ScriptedEngine::ok("x")),
            Arc::new(RecordingStt::ok("x")),
        );
        orch.start_workers().unwrap();
        let mut fg = orch.foreground(TerminalSurface::new(3.0)).unwrap();
        orch.bus().push(Event::show_message("goodbye"));
        orch.shutdown();

        assert_eq!(fg.tick(0.0), Flow::Continue);
        assert_eq!(fg.surface().bubble().message(), Some("goodbye"));
    }

    fn orchestrator_with_init(init_path: &std::path::Path) -> Orchestrator {
        let mut config = test_config();
        config.scripts.init_path = Some(init_path.to_string_lossy().into_owned());
        Orchestrator::with_engines(
            config,
            build_runtime().unwrap(),
            Arc::new(ScriptedEngine::ok("x")),
            Arc::new(RecordingStt::ok("x")),
            Box::new(FeederDevice::new()),
        )
        .unwrap()
    }

    #[test]
    fn startup_script_greets_through_the_bus() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("init.lua");
        std::fs::write(&path, "function onInit() pet.say('good morning') end").unwrap();

        let orch = orchestrator_with_init(&path);
        let mut fg = orch.foreground(TerminalSurface::new(3.0)).unwrap();
        fg.tick(0.0);
        assert_eq!(fg.surface().bubble().message(), Some("good morning"));
    }

    #[test]
    fn missing_startup_script_does_not_block_the_foreground() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator_with_init(&dir.path().join("absent.lua"));
        let mut fg = orch.foreground(TerminalSurface::new(3.0)).unwrap();
        orch.bus().push(Event::show_message("still here"));
        fg.tick(0.0);
        assert_eq!(fg.surface().bubble().message(), Some("still here"));
    }
}
