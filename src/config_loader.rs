use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // HTTP surface
    pub bind_host: String,
    pub bind_port: u16,
    pub static_dir: String,
    // Storage
    pub output_dir: String,
    pub history_db_path: String,
    pub history_default_limit: usize,
    pub history_max_limit: usize,
    // Dispatch
    pub adapter_timeout_secs: u64,
    // Offline engine
    pub espeak_binary: String,
    // Google TTS
    pub gtts_base_url: String,
    // OpenAI
    pub openai_base_url: String,
    pub openai_api_key: String,
    pub openai_model: String,
    // Azure Speech
    pub azure_speech_key: String,
    pub azure_speech_region: String,
    pub azure_endpoint: String, // Overrides the region-derived endpoint when set
    // Coqui TTS server
    pub coqui_url: String,
    pub coqui_speakers: String, // Comma separated speaker ids
}

impl Default for Settings {
    fn default() -> Self {
        let history_db_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tts-hub/history");

        Self {
            bind_host: "127.0.0.1".to_string(),
            bind_port: 8000,
            static_dir: "static".to_string(),
            output_dir: "audio_outputs".to_string(),
            history_db_path: history_db_path.to_string_lossy().into_owned(),
            history_default_limit: 50,
            history_max_limit: 500,
            adapter_timeout_secs: 30,
            espeak_binary: "espeak-ng".to_string(),
            gtts_base_url: "https://translate.google.com".to_string(),
            openai_base_url: "https://api.openai.com".to_string(),
            openai_api_key: String::new(),
            openai_model: "tts-1".to_string(),
            azure_speech_key: String::new(),
            azure_speech_region: String::new(),
            azure_endpoint: String::new(),
            coqui_url: String::new(),
            coqui_speakers: String::new(),
        }
    }
}

impl Settings {
    /// Defaults, then `TtsHub.*` in the working directory, then the user
    /// config, then `TTS_HUB_*` environment variables.
    pub fn new() -> Result<Self, config::ConfigError> {
        Self::load(None)
    }

    /// Same as [`Settings::new`] with an extra, required config file merged
    /// after the user config.
    pub fn load(extra_file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::with_name("TtsHub").required(false))
            .add_source(
                File::with_name(&format!(
                    "{}/.config/tts-hub/TtsHub",
                    std::env::var("HOME").unwrap_or_default()
                ))
                .required(false),
            );

        if let Some(path) = extra_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        // e.g. TTS_HUB_OPENAI_API_KEY
        let builder = builder.add_source(Environment::with_prefix("TTS_HUB"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.bind_host.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "bind_host must not be empty".to_string(),
            ));
        }
        if self.adapter_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "adapter_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.history_default_limit == 0 || self.history_max_limit == 0 {
            return Err(config::ConfigError::Message(
                "history limits must be greater than 0".to_string(),
            ));
        }
        if self.history_default_limit > self.history_max_limit {
            return Err(config::ConfigError::Message(format!(
                "history_default_limit ({}) exceeds history_max_limit ({})",
                self.history_default_limit, self.history_max_limit
            )));
        }
        Ok(())
    }

    pub fn coqui_speaker_list(&self) -> Vec<String> {
        self.coqui_speakers
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Azure endpoint, derived from the region unless explicitly configured.
    pub fn azure_base_url(&self) -> Option<String> {
        if !self.azure_endpoint.trim().is_empty() {
            return Some(self.azure_endpoint.trim_end_matches('/').to_string());
        }
        if self.azure_speech_region.trim().is_empty() {
            return None;
        }
        Some(format!(
            "https://{}.tts.speech.microsoft.com",
            self.azure_speech_region.trim()
        ))
    }
}
