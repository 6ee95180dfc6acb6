//! Pet settings structs, defaults, validation and TOML persistence.
//!
//! Every section implements `Serialize`, `Deserialize`, `Default` and `Clone`
//! and is marked `#[serde(default)]`, so a hand-edited `settings.toml` only
//! needs the keys it wants to change.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;

// ---------------------------------------------------------------------------
// AssistantConfig
// ---------------------------------------------------------------------------

/// Persona and memory of the conversational assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// First block of every prompt.
    pub system_prompt: String,
    /// Number of user/assistant exchanges kept in the context window.
    pub max_turns: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            system_prompt:
                "You are a helpful AI assistant. Keep responses concise and friendly.".into(),
            max_turns: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Connection settings for the completion backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible server (Ollama, llama.cpp server,
    /// LM Studio, vLLM …).
    pub base_url: String,
    /// Bearer token; `None` or empty for local servers.
    pub api_key: Option<String>,
    /// Model identifier; must be listed by `GET /v1/models`.
    pub model: String,
    pub temperature: f32,
    /// Token budget for one generation.
    pub max_tokens: u32,
    /// Client-side request timeout in seconds.  `0` disables it.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            api_key: None,
            model: "qwen2.5:3b".into(),
            temperature: 0.8,
            max_tokens: 256,
            timeout_secs: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper transcription engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// GGML model file stem, resolved as `{models_dir}/ggml-{model}.bin`.
    pub model: String,
    /// ISO-639-1 code, or `"auto"` for Whisper's language detection.
    pub language: String,
    /// Explicit model file; overrides `model` when set.
    pub model_path: Option<String>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "base".into(),
            language: "auto".into(),
            model_path: None,
        }
    }
}

impl SttConfig {
    /// Resolve the model file against `paths`.
    pub fn resolve_model_path(&self, paths: &AppPaths) -> PathBuf {
        match &self.model_path {
            Some(p) if !p.is_empty() => PathBuf::from(p),
            _ => paths.models_dir.join(format!("ggml-{}.bin", self.model)),
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Recording behaviour of the audio worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Recording stops automatically after this many seconds.
    pub recording_seconds: u64,
    /// Polling interval of the audio worker in milliseconds.
    pub tick_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            recording_seconds: 20,
            tick_ms: 50,
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Foreground loop and pet window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Run without a window; bubbles go to the log.
    pub headless: bool,
    /// Frame interval of the headless loop in milliseconds.
    pub frame_ms: u64,
    /// Upper bound on events dispatched per foreground tick.
    pub max_events_per_tick: usize,
    /// Seconds a message bubble stays visible.
    pub bubble_secs: f32,
    /// Pet window size `(width, height)` in logical pixels.
    pub window_size: (f32, f32),
    pub always_on_top: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            headless: false,
            frame_ms: 16,
            max_events_per_tick: 32,
            bubble_secs: 3.0,
            window_size: (500.0, 500.0),
            always_on_top: true,
        }
    }
}

// ---------------------------------------------------------------------------
// HotkeyConfig
// ---------------------------------------------------------------------------

/// Global hotkey bindings (key names as understood by `hotkey::parse_key`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    /// Start recording, or stop a recording in progress.
    pub record_key: String,
    /// Say hello to the pet.
    pub hello_key: String,
    /// Ask the pet for the time.
    pub time_key: String,
    /// Quit the application.
    pub quit_key: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            record_key: "F9".into(),
            hello_key: "F7".into(),
            time_key: "F8".into(),
            quit_key: "F10".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptsConfig
// ---------------------------------------------------------------------------

/// User Lua scripts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptsConfig {
    /// Lua file run once when the foreground starts; its `onInit` function
    /// is called afterwards if defined.  Relative paths are resolved
    /// against the config directory.
    pub init_path: Option<String>,
}

impl ScriptsConfig {
    /// `None` when no startup script is configured.
    pub fn resolve_init_path(&self, paths: &AppPaths) -> Option<PathBuf> {
        match self.init_path.as_deref() {
            Some(p) if !p.is_empty() => {
                let path = PathBuf::from(p);
                Some(if path.is_absolute() {
                    path
                } else {
                    paths.config_dir.join(path)
                })
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// A setting that would make the pet unable to run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("assistant.max_turns must be greater than zero")]
    ZeroMaxTurns,
    #[error("audio.recording_seconds must be greater than zero")]
    ZeroRecordingSeconds,
    #[error("audio.tick_ms must be greater than zero")]
    ZeroTick,
    #[error("ui.max_events_per_tick must be greater than zero")]
    ZeroEventsPerTick,
}

// ---------------------------------------------------------------------------
// PetConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use desktop_pet::config::PetConfig;
///
/// // Writes the defaults when the file is missing.
/// let config = PetConfig::load().unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PetConfig {
    pub assistant: AssistantConfig,
    pub llm: LlmConfig,
    pub stt: SttConfig,
    pub audio: AudioConfig,
    pub ui: UiConfig,
    pub hotkey: HotkeyConfig,
    pub scripts: ScriptsConfig,
}

impl PetConfig {
    /// Load from the platform `settings.toml`.  On first run the defaults
    /// are written there so the user has a file to edit.
    pub fn load() -> Result<Self> {
        Self::load_or_create(&AppPaths::new().settings_file)
    }

    /// Like [`load_from`](Self::load_from), but a missing file is created
    /// with the defaults.  A failed write is logged; the defaults are still
    /// returned.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load_from(path);
        }
        let config = Self::default();
        match config.save_to(path) {
            Ok(()) => log::info!("config: wrote default settings to {}", path.display()),
            Err(e) => log::warn!("config: could not write {}: {e}", path.display()),
        }
        Ok(config)
    }

    /// Load from an explicit path.  A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("config: {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        log::debug!("config: loaded {}", path.display());
        Ok(config)
    }

    /// Write as pretty TOML, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Reject values the workers cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.assistant.max_turns == 0 {
            return Err(ConfigError::ZeroMaxTurns);
        }
        if self.audio.recording_seconds == 0 {
            return Err(ConfigError::ZeroRecordingSeconds);
        }
        if self.audio.tick_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }
        if self.ui.max_events_per_tick == 0 {
            return Err(ConfigError::ZeroEventsPerTick);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
