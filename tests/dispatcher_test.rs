mod common;

use async_trait::async_trait;
use common::{failing_backend, voice, wav_backend, MockBackend};
use proptest::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{tempdir, TempDir};
use tts_hub::backends::{BackendRegistry, SpeechBackend, SynthesisOutput, SynthesisParams, Voice};
use tts_hub::catalog::VoiceCatalog;
use tts_hub::dispatcher::{Dispatcher, FailureKind, SynthesisRequest};
use tts_hub::engine::Engine;
use tts_hub::error::BackendError;

fn dispatcher_with(backends: Vec<Arc<dyn SpeechBackend>>, timeout: Duration) -> (Dispatcher, TempDir) {
    let dir = tempdir().unwrap();
    let mut registry = BackendRegistry::new();
    for backend in backends {
        registry.register(backend);
    }
    let dispatcher = Dispatcher::new(Arc::new(registry), dir.path(), timeout);
    (dispatcher, dir)
}

/// A backend that never calls the engine.
fn untouched_backend() -> MockBackend {
    let mut backend = MockBackend::new();
    backend.expect_engine().return_const(Engine::Offline);
    backend.expect_audio_extension().return_const("wav");
    backend.expect_list_voices().times(0);
    backend.expect_synthesize().times(0);
    backend
}

struct SlowBackend;

#[async_trait]
impl SpeechBackend for SlowBackend {
    fn engine(&self) -> Engine {
        Engine::Coqui
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, BackendError> {
        Ok(Vec::new())
    }

    async fn synthesize(
        &self,
        _params: &SynthesisParams,
        output: &Path,
    ) -> Result<SynthesisOutput, BackendError> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(SynthesisOutput {
            path: PathBuf::from(output),
            duration_seconds: Some(1.0),
        })
    }
}

#[tokio::test]
async fn test_empty_text_never_reaches_adapter() {
    let (dispatcher, _dir) = dispatcher_with(vec![Arc::new(untouched_backend())], Duration::from_secs(5));

    let result = dispatcher
        .synthesize(&SynthesisRequest::new("", "offline"))
        .await;

    assert!(!result.success());
    assert_eq!(result.failure_kind(), Some(FailureKind::Validation));
    assert!(result.error_message().unwrap().contains("empty"));
    assert!(result.audio_file_path().is_none());
}

#[tokio::test]
async fn test_out_of_range_volume_is_rejected() {
    let (dispatcher, _dir) = dispatcher_with(vec![Arc::new(untouched_backend())], Duration::from_secs(5));

    let result = dispatcher
        .synthesize(&SynthesisRequest::new("Hello", "offline").with_volume(1.5))
        .await;

    assert_eq!(result.failure_kind(), Some(FailureKind::Validation));
    assert!(result.error_message().unwrap().contains("Volume"));
}

#[tokio::test]
async fn test_unknown_engine_is_named() {
    let (dispatcher, _dir) = dispatcher_with(vec![Arc::new(untouched_backend())], Duration::from_secs(5));

    let result = dispatcher
        .synthesize(&SynthesisRequest::new("Hello", "festival"))
        .await;

    assert!(!result.success());
    assert_eq!(result.failure_kind(), Some(FailureKind::UnsupportedEngine));
    assert!(result.error_message().unwrap().contains("festival"));
    assert_eq!(result.engine, "festival");
}

#[tokio::test]
async fn test_known_but_unregistered_engine() {
    let (dispatcher, _dir) = dispatcher_with(vec![Arc::new(untouched_backend())], Duration::from_secs(5));

    let result = dispatcher
        .synthesize(&SynthesisRequest::new("Hello", "azure"))
        .await;

    assert_eq!(result.failure_kind(), Some(FailureKind::UnsupportedEngine));
    assert!(result.error_message().unwrap().contains("azure"));
}

#[tokio::test]
async fn test_hello_world_offline() {
    let (dispatcher, _dir) = dispatcher_with(vec![Arc::new(wav_backend(Engine::Offline))], Duration::from_secs(5));

    let request = SynthesisRequest::new("Hello world", "offline")
        .with_rate(150.0)
        .with_volume(1.0);
    let result = dispatcher.synthesize(&request).await;

    assert!(result.success(), "{:?}", result);
    let path = result.audio_file_path().unwrap();
    assert!(path.exists());
    assert!(path.starts_with(dispatcher.output_dir()));
    assert!(path.file_name().unwrap().to_string_lossy().starts_with("tts_offline_"));
    assert!(result.duration_seconds().unwrap() > 0.0);
    assert!(result.error_message().is_none());
    assert_eq!(result.message(), "Speech synthesized successfully with offline");
}

#[tokio::test]
async fn test_adapter_failure_is_converted() {
    let (dispatcher, _dir) = dispatcher_with(vec![Arc::new(failing_backend(Engine::Openai))], Duration::from_secs(5));

    let result = dispatcher
        .synthesize(&SynthesisRequest::new("Hello", "openai"))
        .await;

    assert!(!result.success());
    assert_eq!(result.failure_kind(), Some(FailureKind::Adapter));
    let message = result.error_message().unwrap();
    assert!(message.contains("429"));
    assert!(message.contains("quota exceeded"));
    assert!(result.duration_seconds().is_none());
}

#[tokio::test]
async fn test_slow_adapter_times_out() {
    let (dispatcher, dir) = dispatcher_with(vec![Arc::new(SlowBackend)], Duration::from_millis(100));

    let result = dispatcher
        .synthesize(&SynthesisRequest::new("Hello", "coqui"))
        .await;

    assert_eq!(result.failure_kind(), Some(FailureKind::Timeout));
    assert!(result.error_message().unwrap().contains("timed out"));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_unknown_voice_falls_back_to_default() {
    let mut backend = MockBackend::new();
    backend.expect_engine().return_const(Engine::Offline);
    backend.expect_audio_extension().return_const("wav");
    backend
        .expect_list_voices()
        .times(1)
        .returning(|| Ok(vec![voice(Engine::Offline, "en-us", "English (America)")]));
    backend
        .expect_synthesize()
        .withf(|params, _| params.voice.is_none())
        .times(1)
        .returning(|_, output| {
            std::fs::write(output, common::wav_bytes(0.5)).unwrap();
            Ok(SynthesisOutput {
                path: PathBuf::from(output),
                duration_seconds: None,
            })
        });
    let (dispatcher, _dir) = dispatcher_with(vec![Arc::new(backend)], Duration::from_secs(5));

    let result = dispatcher
        .synthesize(&SynthesisRequest::new("Hello", "offline").with_voice("Klingon"))
        .await;

    assert!(result.success());
    assert_eq!(result.voice_name, None);
}

#[tokio::test]
async fn test_voice_matched_by_name_fragment() {
    let mut backend = MockBackend::new();
    backend.expect_engine().return_const(Engine::Offline);
    backend.expect_audio_extension().return_const("wav");
    backend.expect_list_voices().returning(|| {
        Ok(vec![
            voice(Engine::Offline, "en-us", "English (America)"),
            voice(Engine::Offline, "fr-fr", "French (France)"),
        ])
    });
    backend
        .expect_synthesize()
        .withf(|params, _| params.voice.as_deref() == Some("fr-fr"))
        .times(1)
        .returning(|_, output| {
            std::fs::write(output, common::wav_bytes(0.5)).unwrap();
            Ok(SynthesisOutput {
                path: PathBuf::from(output),
                duration_seconds: None,
            })
        });
    let (dispatcher, _dir) = dispatcher_with(vec![Arc::new(backend)], Duration::from_secs(5));

    let result = dispatcher
        .synthesize(&SynthesisRequest::new("Bonjour", "offline").with_voice("france"))
        .await;

    assert!(result.success());
    assert_eq!(result.voice_name.as_deref(), Some("fr-fr"));
}

#[tokio::test]
async fn test_failed_enumeration_uses_default_voice() {
    let mut backend = MockBackend::new();
    backend.expect_engine().return_const(Engine::Azure);
    backend.expect_audio_extension().return_const("wav");
    backend
        .expect_list_voices()
        .returning(|| Err(BackendError::not_configured(Engine::Azure, "check API credentials")));
    backend
        .expect_synthesize()
        .withf(|params, _| params.voice.is_none())
        .times(1)
        .returning(|_, output| {
            std::fs::write(output, common::wav_bytes(0.5)).unwrap();
            Ok(SynthesisOutput {
                path: PathBuf::from(output),
                duration_seconds: Some(0.5),
            })
        });
    let (dispatcher, _dir) = dispatcher_with(vec![Arc::new(backend)], Duration::from_secs(5));

    let result = dispatcher
        .synthesize(&SynthesisRequest::new("Hello", "azure").with_voice("en-US-GuyNeural"))
        .await;

    assert!(result.success());
    assert_eq!(result.duration_seconds(), Some(0.5));
}

#[tokio::test]
async fn test_rate_is_clamped_before_dispatch() {
    let mut backend = MockBackend::new();
    backend.expect_engine().return_const(Engine::Offline);
    backend.expect_audio_extension().return_const("wav");
    backend
        .expect_synthesize()
        .withf(|params, _| params.rate == 300.0 && params.language == "en")
        .times(1)
        .returning(|_, output| {
            std::fs::write(output, common::wav_bytes(0.5)).unwrap();
            Ok(SynthesisOutput {
                path: PathBuf::from(output),
                duration_seconds: None,
            })
        });
    let (dispatcher, _dir) = dispatcher_with(vec![Arc::new(backend)], Duration::from_secs(5));

    let result = dispatcher
        .synthesize(&SynthesisRequest::new("Fast talker", "pyttsx3").with_rate(1000.0))
        .await;

    assert!(result.success());
    assert_eq!(result.engine, "offline");
    assert_eq!(result.settings.rate, 300.0);
}

#[tokio::test]
async fn test_catalog_swallows_failing_engine() {
    let registry = {
        let mut registry = BackendRegistry::new();
        registry.register(Arc::new(wav_backend(Engine::Offline)));
        registry.register(Arc::new(failing_backend(Engine::Openai)));
        registry.register(Arc::new(wav_backend(Engine::Coqui)));
        Arc::new(registry)
    };
    let catalog = VoiceCatalog::new(registry, Duration::from_secs(5));

    let voices = catalog.list_voices().await;

    assert_eq!(voices.len(), 4);
    assert!(voices.iter().all(|v| v.engine != Engine::Openai));
    // Grouped by engine in registration order
    assert_eq!(voices[0].engine, Engine::Offline);
    assert_eq!(voices[1].engine, Engine::Offline);
    assert_eq!(voices[2].engine, Engine::Coqui);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn whitespace_only_text_is_rejected(text in "[ \t\r\n]{0,12}") {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let (dispatcher, _dir) = dispatcher_with(vec![Arc::new(untouched_backend())], Duration::from_secs(5));

        let result = runtime.block_on(dispatcher.synthesize(&SynthesisRequest::new(text, "offline")));

        prop_assert!(!result.success());
        prop_assert_eq!(result.failure_kind(), Some(FailureKind::Validation));
    }
}
