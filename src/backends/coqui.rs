use super::{ensure_success, write_audio, SpeechBackend, SynthesisOutput, SynthesisParams, Voice};
use crate::config_loader::Settings;
use crate::engine::Engine;
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};

const DEFAULT_SPEAKER: &str = "default";

/// A Coqui `tts-server` reached over HTTP (`GET /api/tts`).
///
/// Single-speaker models expose one `default` voice; multi-speaker models
/// list the speaker ids configured for the server.
pub struct CoquiBackend {
    client: Client,
    base_url: String,
    speakers: Vec<String>,
}

impl CoquiBackend {
    pub fn new(client: Client, base_url: impl Into<String>, speakers: Vec<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            speakers,
        }
    }

    pub fn from_settings(client: Client, settings: &Settings) -> Self {
        Self::new(
            client,
            settings.coqui_url.clone(),
            settings.coqui_speaker_list(),
        )
    }

    fn base_url(&self) -> Result<&str, BackendError> {
        if self.base_url.trim().is_empty() {
            return Err(BackendError::not_configured(
                Engine::Coqui,
                "no server URL configured",
            ));
        }
        Ok(&self.base_url)
    }
}

#[async_trait]
impl SpeechBackend for CoquiBackend {
    fn engine(&self) -> Engine {
        Engine::Coqui
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, BackendError> {
        self.base_url()?;
        let voice = |id: &str| Voice {
            engine: Engine::Coqui,
            id: id.to_string(),
            name: id.to_string(),
            language: "en".to_string(),
            gender: None,
        };

        if self.speakers.is_empty() {
            return Ok(vec![voice(DEFAULT_SPEAKER)]);
        }
        Ok(self.speakers.iter().map(|s| voice(s.as_str())).collect())
    }

    async fn synthesize(
        &self,
        params: &SynthesisParams,
        output: &Path,
    ) -> Result<SynthesisOutput, BackendError> {
        let base_url = self.base_url()?;

        let mut query = vec![("text", params.text.as_str())];
        if let Some(speaker) = params.voice.as_deref().filter(|s| *s != DEFAULT_SPEAKER) {
            query.push(("speaker_id", speaker));
        }
        if !self.speakers.is_empty() {
            query.push(("language_id", params.language.as_str()));
        }

        let response = self
            .client
            .get(format!("{}/api/tts", base_url))
            .query(&query)
            .send()
            .await
            .map_err(|e| BackendError::http(Engine::Coqui, e))?;

        let response = ensure_success(Engine::Coqui, response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::http(Engine::Coqui, e))?;

        write_audio(Engine::Coqui, output, &bytes).await?;

        Ok(SynthesisOutput {
            path: PathBuf::from(output),
            duration_seconds: None,
        })
    }
}
