use super::{ensure_success, write_audio, SpeechBackend, SynthesisOutput, SynthesisParams, Voice};
use crate::config_loader::Settings;
use crate::engine::{Engine, DEFAULT_RATE};
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_VOICE: &str = "en-US-AriaNeural";
const OUTPUT_FORMAT: &str = "riff-24khz-16bit-mono-pcm";

/// Azure Cognitive Services Speech, REST flavour.
pub struct AzureBackend {
    client: Client,
    base_url: Option<String>,
    key: String,
}

/// One entry of `/cognitiveservices/voices/list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AzureVoice {
    short_name: String,
    #[serde(default)]
    display_name: Option<String>,
    locale: String,
    #[serde(default)]
    gender: Option<String>,
}

impl AzureBackend {
    pub fn new(client: Client, base_url: Option<String>, key: impl Into<String>) -> Self {
        Self {
            client,
            base_url,
            key: key.into(),
        }
    }

    pub fn from_settings(client: Client, settings: &Settings) -> Self {
        Self::new(
            client,
            settings.azure_base_url(),
            settings.azure_speech_key.clone(),
        )
    }

    fn credentials(&self) -> Result<(&str, &str), BackendError> {
        match &self.base_url {
            Some(url) if !self.key.trim().is_empty() => Ok((url.as_str(), self.key.as_str())),
            _ => Err(BackendError::not_configured(
                Engine::Azure,
                "check API credentials",
            )),
        }
    }
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Azure locales look like `en-US`; a bare `en` gets the US variant.
fn locale_for(language: &str) -> String {
    match language {
        "" | "en" => "en-US".to_string(),
        other => other.to_string(),
    }
}

/// SSML document with the rate expressed relative to the normal speed.
pub fn build_ssml(params: &SynthesisParams, voice: &str) -> String {
    let rate_pct = ((params.rate / DEFAULT_RATE - 1.0) * 100.0).round() as i32;
    let volume = (params.volume.clamp(0.0, 1.0) * 100.0).round() as u32;
    format!(
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='{}'>\
<voice name='{}'><prosody rate='{:+}%' volume='{}'>{}</prosody></voice></speak>",
        escape_xml(&locale_for(&params.language)),
        escape_xml(voice),
        rate_pct,
        volume,
        escape_xml(&params.text)
    )
}

#[async_trait]
impl SpeechBackend for AzureBackend {
    fn engine(&self) -> Engine {
        Engine::Azure
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, BackendError> {
        let (base_url, key) = self.credentials()?;
        let response = self
            .client
            .get(format!("{}/cognitiveservices/voices/list", base_url))
            .header("Ocp-Apim-Subscription-Key", key)
            .send()
            .await
            .map_err(|e| BackendError::http(Engine::Azure, e))?;

        let response = ensure_success(Engine::Azure, response).await?;
        let voices: Vec<AzureVoice> = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse {
                engine: Engine::Azure,
                message: format!("failed to parse voice list: {}", e),
            })?;

        Ok(voices
            .into_iter()
            .map(|v| Voice {
                engine: Engine::Azure,
                name: v.display_name.unwrap_or_else(|| v.short_name.clone()),
                id: v.short_name,
                language: v.locale,
                gender: v.gender.map(|g| g.to_lowercase()),
            })
            .collect())
    }

    async fn synthesize(
        &self,
        params: &SynthesisParams,
        output: &Path,
    ) -> Result<SynthesisOutput, BackendError> {
        let (base_url, key) = self.credentials()?;
        let voice = params.voice.as_deref().unwrap_or(DEFAULT_VOICE);

        let response = self
            .client
            .post(format!("{}/cognitiveservices/v1", base_url))
            .header("Ocp-Apim-Subscription-Key", key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .body(build_ssml(params, voice))
            .send()
            .await
            .map_err(|e| BackendError::http(Engine::Azure, e))?;

        let response = ensure_success(Engine::Azure, response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::http(Engine::Azure, e))?;

        write_audio(Engine::Azure, output, &bytes).await?;

        Ok(SynthesisOutput {
            path: PathBuf::from(output),
            duration_seconds: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(text: &str, rate: f32) -> SynthesisParams {
        SynthesisParams {
            text: text.to_string(),
            voice: None,
            rate,
            volume: 0.5,
            language: "en".to_string(),
        }
    }

    #[test]
    fn test_ssml_escapes_text() {
        let ssml = build_ssml(&params("Tom & <Jerry>", 150.0), DEFAULT_VOICE);
        assert!(ssml.contains("Tom &amp; &lt;Jerry&gt;"));
        assert!(ssml.contains("xml:lang='en-US'"));
        assert!(ssml.contains("rate='+0%'"));
        assert!(ssml.contains("volume='50'"));
    }

    #[test]
    fn test_ssml_rate_is_relative() {
        assert!(build_ssml(&params("hi", 300.0), DEFAULT_VOICE).contains("rate='+100%'"));
        assert!(build_ssml(&params("hi", 75.0), DEFAULT_VOICE).contains("rate='-50%'"));
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let backend = AzureBackend::new(Client::new(), None, "key");
        assert!(matches!(
            backend.list_voices().await,
            Err(BackendError::NotConfigured { .. })
        ));
    }
}
