//! Platform directories for settings and model files, resolved with `dirs`.
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\desktop-pet\
//!   macOS:   ~/Library/Application Support/desktop-pet/
//!   Linux:   ~/.config/desktop-pet/
//!
//! Data dir (Whisper models):
//!   Windows: %LOCALAPPDATA%\desktop-pet\models\
//!   macOS:   ~/Library/Application Support/desktop-pet/models/
//!   Linux:   ~/.local/share/desktop-pet/models/

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    /// `{config_dir}/settings.toml`.
    pub settings_file: PathBuf,
    /// Directory scanned for `ggml-*.bin` files.
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "desktop-pet";

    /// Falls back to the working directory when the platform has no
    /// standard location.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);
        let models_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME)
            .join("models");

        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            models_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
