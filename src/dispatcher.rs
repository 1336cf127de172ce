//! Routes a synthesis request to the matching backend and normalizes the
//! outcome. Nothing in here returns an error: every failure becomes a
//! [`SynthesisResult`] the caller can record and report.

use crate::audio;
use crate::backends::{BackendRegistry, SpeechBackend, SynthesisParams, Voice};
use crate::config_loader::Settings;
use crate::engine::{Engine, DEFAULT_RATE};
use crate::error::TtsError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const DEFAULT_LANGUAGE: &str = "en";

fn default_engine() -> String {
    Engine::Offline.to_string()
}

/// Body of `POST /api/synthesize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    #[serde(rename = "voice_engine", alias = "engine", default = "default_engine")]
    pub engine: String,
    #[serde(default)]
    pub voice_name: Option<String>,
    #[serde(default)]
    pub rate: Option<f32>,
    #[serde(default)]
    pub volume: Option<f32>,
    #[serde(default)]
    pub language: Option<String>,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, engine: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            engine: engine.into(),
            voice_name: None,
            rate: None,
            volume: None,
            language: None,
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice_name = Some(voice.into());
        self
    }

    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Rate/volume/language as actually applied, kept with every history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub rate: f32,
    pub volume: f32,
    pub language: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Empty text or out of range settings
    Validation,
    /// Engine key outside the supported set
    UnsupportedEngine,
    /// The engine itself reported an error
    Adapter,
    /// The engine did not answer in time
    Timeout,
}

impl FailureKind {
    /// Rejected before any engine was involved.
    pub fn is_client_error(&self) -> bool {
        matches!(self, FailureKind::Validation | FailureKind::UnsupportedEngine)
    }
}

impl From<&TtsError> for FailureKind {
    fn from(err: &TtsError) -> Self {
        match err {
            TtsError::Validation(_) => FailureKind::Validation,
            TtsError::UnsupportedEngine(_) => FailureKind::UnsupportedEngine,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisOutcome {
    Success {
        audio_file_path: PathBuf,
        duration_seconds: f64,
    },
    Failure {
        kind: FailureKind,
        error_message: String,
    },
}

/// Normalized result of one synthesis attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisResult {
    /// Canonical engine name, or the raw key when it did not resolve
    pub engine: String,
    /// Voice the engine was asked to use; `None` is the engine default.
    /// Before voice resolution this is the requested voice.
    pub voice_name: Option<String>,
    pub settings: VoiceSettings,
    pub outcome: SynthesisOutcome,
}

impl SynthesisResult {
    fn rejected(
        engine: &str,
        voice_name: Option<String>,
        settings: VoiceSettings,
        err: TtsError,
    ) -> Self {
        info!("Rejected synthesis request: {}", err);
        Self {
            engine: engine.to_string(),
            voice_name,
            settings,
            outcome: SynthesisOutcome::Failure {
                kind: FailureKind::from(&err),
                error_message: err.to_string(),
            },
        }
    }

    pub fn success(&self) -> bool {
        matches!(self.outcome, SynthesisOutcome::Success { .. })
    }

    pub fn audio_file_path(&self) -> Option<&Path> {
        match &self.outcome {
            SynthesisOutcome::Success {
                audio_file_path, ..
            } => Some(audio_file_path),
            SynthesisOutcome::Failure { .. } => None,
        }
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        match &self.outcome {
            SynthesisOutcome::Success {
                duration_seconds, ..
            } => Some(*duration_seconds),
            SynthesisOutcome::Failure { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            SynthesisOutcome::Failure { error_message, .. } => Some(error_message),
            SynthesisOutcome::Success { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            SynthesisOutcome::Failure { kind, .. } => Some(*kind),
            SynthesisOutcome::Success { .. } => None,
        }
    }

    /// Human readable summary for API responses.
    pub fn message(&self) -> String {
        match &self.outcome {
            SynthesisOutcome::Success { .. } => {
                format!("Speech synthesized successfully with {}", self.engine)
            }
            SynthesisOutcome::Failure { error_message, .. } => error_message.clone(),
        }
    }
}

/// Picks the voice the engine should use for `requested`: exact id or name,
/// then case-insensitive, then a name containing the request.
pub fn match_voice<'a>(voices: &'a [Voice], requested: &str) -> Option<&'a Voice> {
    voices
        .iter()
        .find(|v| v.id == requested || v.name == requested)
        .or_else(|| {
            voices.iter().find(|v| {
                v.id.eq_ignore_ascii_case(requested) || v.name.eq_ignore_ascii_case(requested)
            })
        })
        .or_else(|| {
            let needle = requested.to_lowercase();
            voices
                .iter()
                .find(|v| v.name.to_lowercase().contains(&needle))
        })
}

fn validate(text: &str, volume: f32) -> Result<(), TtsError> {
    if text.trim().is_empty() {
        return Err(TtsError::Validation(
            "Text must not be empty".to_string(),
        ));
    }
    if !volume.is_finite() || !(0.0..=1.0).contains(&volume) {
        return Err(TtsError::Validation(format!(
            "Volume must be between 0.0 and 1.0, got {}",
            volume
        )));
    }
    Ok(())
}

pub struct Dispatcher {
    registry: Arc<BackendRegistry>,
    output_dir: PathBuf,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<BackendRegistry>, output_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            registry,
            output_dir: output_dir.into(),
            timeout,
        }
    }

    /// Creates the output directory if needed.
    pub fn from_settings(
        registry: Arc<BackendRegistry>,
        settings: &Settings,
    ) -> std::io::Result<Self> {
        std::fs::create_dir_all(&settings.output_dir)?;
        Ok(Self::new(
            registry,
            &settings.output_dir,
            Duration::from_secs(settings.adapter_timeout_secs),
        ))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub async fn synthesize(&self, request: &SynthesisRequest) -> SynthesisResult {
        let requested_voice = request
            .voice_name
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let volume = request.volume.unwrap_or(1.0);
        let mut settings = VoiceSettings {
            rate: request.rate.unwrap_or(DEFAULT_RATE),
            volume,
            language: request
                .language
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .unwrap_or(DEFAULT_LANGUAGE)
                .to_string(),
        };
        let engine_key = request.engine.trim();

        if let Err(e) = validate(&request.text, volume) {
            return SynthesisResult::rejected(engine_key, requested_voice, settings, e);
        }

        let engine = match engine_key.parse::<Engine>() {
            Ok(engine) => engine,
            Err(e) => return SynthesisResult::rejected(engine_key, requested_voice, settings, e),
        };
        settings.rate = engine.clamp_rate(settings.rate);

        let Some(backend) = self.registry.get(engine) else {
            let err = TtsError::UnsupportedEngine(format!("{} (not configured)", engine));
            return SynthesisResult::rejected(engine.as_str(), requested_voice, settings, err);
        };

        let voice = self
            .resolve_voice(backend.as_ref(), requested_voice.as_deref())
            .await;

        let params = SynthesisParams {
            text: request.text.clone(),
            voice: voice.clone(),
            rate: settings.rate,
            volume: settings.volume,
            language: settings.language.clone(),
        };
        let output = self
            .output_dir
            .join(audio::output_file_name(engine, backend.audio_extension()));

        info!(
            "Synthesizing {} chars with {} (voice: {})",
            params.text.chars().count(),
            engine,
            voice.as_deref().unwrap_or("default")
        );

        let outcome = match tokio::time::timeout(self.timeout, backend.synthesize(&params, &output)).await
        {
            Ok(Ok(out)) => {
                let duration_seconds =
                    audio::resolve_duration(out.duration_seconds, &out.path, &params.text, params.rate);
                info!(
                    "{} wrote {} ({:.2}s)",
                    engine,
                    out.path.display(),
                    duration_seconds
                );
                SynthesisOutcome::Success {
                    audio_file_path: out.path,
                    duration_seconds,
                }
            }
            Ok(Err(e)) => {
                error!("TTS synthesis failed: {}", e);
                let _ = tokio::fs::remove_file(&output).await;
                SynthesisOutcome::Failure {
                    kind: FailureKind::Adapter,
                    error_message: format!("{} synthesis failed: {}", engine, e),
                }
            }
            Err(_) => {
                error!("TTS synthesis timed out: {}", engine);
                let _ = tokio::fs::remove_file(&output).await;
                SynthesisOutcome::Failure {
                    kind: FailureKind::Timeout,
                    error_message: format!(
                        "{} synthesis timed out after {}s",
                        engine,
                        self.timeout.as_secs_f32()
                    ),
                }
            }
        };

        SynthesisResult {
            engine: engine.to_string(),
            voice_name: voice,
            settings,
            outcome,
        }
    }

    /// Falls back to the engine default (`None`) when the voice is unknown
    /// or the engine cannot enumerate its voices right now.
    async fn resolve_voice(
        &self,
        backend: &dyn SpeechBackend,
        requested: Option<&str>,
    ) -> Option<String> {
        let requested = requested?;
        let voices = match tokio::time::timeout(self.timeout, backend.list_voices()).await {
            Ok(Ok(voices)) => voices,
            Ok(Err(e)) => {
                warn!("Could not list {} voices: {}", backend.engine(), e);
                return None;
            }
            Err(_) => {
                warn!("Listing {} voices timed out", backend.engine());
                return None;
            }
        };

        let matched = match_voice(&voices, requested).map(|v| v.id.clone());
        if matched.is_none() {
            info!(
                "Voice '{}' not offered by {}, using engine default",
                requested,
                backend.engine()
            );
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(id: &str, name: &str) -> Voice {
        Voice {
            engine: Engine::Offline,
            id: id.to_string(),
            name: name.to_string(),
            language: "en".to_string(),
            gender: None,
        }
    }

    #[test]
    fn test_match_voice_prefers_exact() {
        let voices = vec![
            voice("en-gb", "English (Great Britain)"),
            voice("en", "English"),
        ];
        assert_eq!(match_voice(&voices, "English").unwrap().id, "en");
        assert_eq!(match_voice(&voices, "EN-GB").unwrap().id, "en-gb");
        assert_eq!(match_voice(&voices, "britain").unwrap().id, "en-gb");
        assert!(match_voice(&voices, "Klingon").is_none());
    }

    #[test]
    fn test_validate() {
        assert!(validate("hello", 1.0).is_ok());
        assert!(validate("  \n\t", 1.0).is_err());
        assert!(validate("hello", 1.5).is_err());
        assert!(validate("hello", f32::NAN).is_err());
    }

    #[test]
    fn test_request_defaults_from_json() {
        let request: SynthesisRequest = serde_json::from_str(r#"{"text": "hi"}"#).unwrap();
        assert_eq!(request.engine, "offline");
        assert_eq!(request.rate, None);

        let request: SynthesisRequest =
            serde_json::from_str(r#"{"text": "hi", "voice_engine": "gtts", "rate": 120}"#).unwrap();
        assert_eq!(request.engine, "gtts");
        assert_eq!(request.rate, Some(120.0));
    }

    #[test]
    fn test_failure_kind_classification() {
        assert!(FailureKind::Validation.is_client_error());
        assert!(FailureKind::UnsupportedEngine.is_client_error());
        assert!(!FailureKind::Adapter.is_client_error());
        assert!(!FailureKind::Timeout.is_client_error());
    }
}
