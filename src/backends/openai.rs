use super::{ensure_success, write_audio, SpeechBackend, SynthesisOutput, SynthesisParams, Voice};
use crate::config_loader::Settings;
use crate::engine::{Engine, DEFAULT_RATE};
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::path::{Path, PathBuf};

const VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];
const DEFAULT_VOICE: &str = "alloy";

/// OpenAI `/v1/audio/speech`.
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn from_settings(client: Client, settings: &Settings) -> Self {
        Self::new(
            client,
            settings.openai_base_url.clone(),
            settings.openai_api_key.clone(),
            settings.openai_model.clone(),
        )
    }

    fn api_key(&self) -> Result<&str, BackendError> {
        if self.api_key.trim().is_empty() {
            return Err(BackendError::not_configured(
                Engine::Openai,
                "check API key",
            ));
        }
        Ok(&self.api_key)
    }
}

/// Words per minute to OpenAI's speed multiplier (0.25 - 4.0).
fn speed_for_rate(rate: f32) -> f32 {
    (rate / DEFAULT_RATE).clamp(0.25, 4.0)
}

#[async_trait]
impl SpeechBackend for OpenAiBackend {
    fn engine(&self) -> Engine {
        Engine::Openai
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, BackendError> {
        self.api_key()?;
        Ok(VOICES
            .iter()
            .map(|name| Voice {
                engine: Engine::Openai,
                id: name.to_string(),
                name: name.to_string(),
                language: "en".to_string(),
                gender: Some("neutral".to_string()),
            })
            .collect())
    }

    async fn synthesize(
        &self,
        params: &SynthesisParams,
        output: &Path,
    ) -> Result<SynthesisOutput, BackendError> {
        let api_key = self.api_key()?;
        let body = json!({
            "model": self.model,
            "input": params.text,
            "voice": params.voice.as_deref().unwrap_or(DEFAULT_VOICE),
            "speed": speed_for_rate(params.rate),
            "response_format": "wav",
        });

        let response = self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::http(Engine::Openai, e))?;

        let response = ensure_success(Engine::Openai, response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::http(Engine::Openai, e))?;

        write_audio(Engine::Openai, output, &bytes).await?;

        Ok(SynthesisOutput {
            path: PathBuf::from(output),
            duration_seconds: None,
        })
    }
}
