//! Configuration: [`PetConfig`] with one section per subsystem, [`AppPaths`]
//! for platform directories, and TOML persistence via `PetConfig::load` /
//! `PetConfig::save_to`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AssistantConfig, AudioConfig, ConfigError, HotkeyConfig, LlmConfig, PetConfig, ScriptsConfig,
    SttConfig, UiConfig,
};
