pub mod azure;
pub mod coqui;
pub mod espeak;
pub mod gtts;
pub mod openai;

use crate::config_loader::Settings;
use crate::engine::Engine;
use crate::error::BackendError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Represents a text-to-speech voice
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Voice {
    pub engine: Engine,
    /// Identifier the engine expects when selecting this voice
    pub id: String,
    pub name: String,
    pub language: String,
    pub gender: Option<String>,
}

/// Normalized parameters handed to every adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisParams {
    pub text: String,
    /// Already resolved against the engine's voices; `None` means engine default
    pub voice: Option<String>,
    /// Words per minute, clamped to the engine's range
    pub rate: f32,
    /// 0.0 - 1.0
    pub volume: f32,
    pub language: String,
}

/// What an adapter hands back after writing its audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOutput {
    pub path: PathBuf,
    /// Duration reported or derived by the engine, if it knows one
    pub duration_seconds: Option<f64>,
}

/// Trait that all speech synthesis backends must implement.
/// This allows us to plug in different engines (eSpeak, cloud APIs, Coqui, etc.)
///
/// Implementations must be safe to call concurrently: no per-call state may
/// live on `self`.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// The engine this backend adapts
    fn engine(&self) -> Engine;

    /// File extension of the audio this backend writes
    fn audio_extension(&self) -> &'static str {
        "wav"
    }

    /// Returns the voices the engine currently exposes
    async fn list_voices(&self) -> Result<Vec<Voice>, BackendError>;

    /// Synthesizes `params.text` into `output`
    async fn synthesize(
        &self,
        params: &SynthesisParams,
        output: &Path,
    ) -> Result<SynthesisOutput, BackendError>;
}

/// The set of adapters the dispatcher and voice catalog work with,
/// in registration order.
#[derive(Default, Clone)]
pub struct BackendRegistry {
    backends: Vec<Arc<dyn SpeechBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds one adapter per engine from the settings. Cloud adapters without
    /// credentials are still registered and report themselves unavailable.
    pub fn from_settings(settings: &Settings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.adapter_timeout_secs))
            .user_agent(concat!("tts-hub/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut registry = Self::new();
        registry.register(Arc::new(espeak::EspeakBackend::from_settings(settings)));
        registry.register(Arc::new(gtts::GttsBackend::from_settings(
            client.clone(),
            settings,
        )));
        registry.register(Arc::new(openai::OpenAiBackend::from_settings(
            client.clone(),
            settings,
        )));
        registry.register(Arc::new(azure::AzureBackend::from_settings(
            client.clone(),
            settings,
        )));
        registry.register(Arc::new(coqui::CoquiBackend::from_settings(client, settings)));
        Ok(registry)
    }

    /// Adds a backend, replacing any earlier one for the same engine.
    pub fn register(&mut self, backend: Arc<dyn SpeechBackend>) {
        let engine = backend.engine();
        match self.backends.iter_mut().find(|b| b.engine() == engine) {
            Some(slot) => *slot = backend,
            None => self.backends.push(backend),
        }
    }

    pub fn get(&self, engine: Engine) -> Option<Arc<dyn SpeechBackend>> {
        self.backends.iter().find(|b| b.engine() == engine).cloned()
    }

    pub fn engines(&self) -> Vec<Engine> {
        self.backends.iter().map(|b| b.engine()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn SpeechBackend>> {
        self.backends.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

/// Turns a non-2xx response into a [`BackendError::Status`] carrying the
/// start of the body, which is where cloud APIs put their explanation.
pub(crate) async fn ensure_success(
    engine: Engine,
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > 300 {
        let mut cut = 300;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(BackendError::Status {
        engine,
        status: status.as_u16(),
        body,
    })
}

/// Writes an engine's audio bytes to the output path.
pub(crate) async fn write_audio(
    engine: Engine,
    output: &Path,
    bytes: &[u8],
) -> Result<(), BackendError> {
    if bytes.is_empty() {
        return Err(BackendError::InvalidResponse {
            engine,
            message: "empty audio payload".to_string(),
        });
    }
    tokio::fs::write(output, bytes)
        .await
        .map_err(|e| BackendError::io(engine, e))
}
