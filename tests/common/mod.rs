#![allow(dead_code)]

use async_trait::async_trait;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tts_hub::backends::{SpeechBackend, SynthesisOutput, SynthesisParams, Voice};
use tts_hub::engine::Engine;
use tts_hub::error::BackendError;

mockall::mock! {
    pub Backend {}
    #[async_trait]
    impl SpeechBackend for Backend {
        fn engine(&self) -> Engine;
        fn audio_extension(&self) -> &'static str;
        async fn list_voices(&self) -> Result<Vec<Voice>, BackendError>;
        async fn synthesize(
            &self,
            params: &SynthesisParams,
            output: &Path,
        ) -> Result<SynthesisOutput, BackendError>;
    }
}

/// 16 kHz mono silence of the given length.
pub fn wav_bytes(seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut buf = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut buf), spec).unwrap();
        for _ in 0..(16_000.0 * seconds) as usize {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    buf
}

pub fn voice(engine: Engine, id: &str, name: &str) -> Voice {
    Voice {
        engine,
        id: id.to_string(),
        name: name.to_string(),
        language: "en".to_string(),
        gender: None,
    }
}

/// A backend that answers every synthesis with one second of WAV.
pub fn wav_backend(engine: Engine) -> MockBackend {
    let mut backend = MockBackend::new();
    backend.expect_engine().return_const(engine);
    backend.expect_audio_extension().return_const("wav");
    backend.expect_list_voices().returning(move || {
        Ok(vec![
            voice(engine, "en-us", "English (America)"),
            voice(engine, "fr-fr", "French (France)"),
        ])
    });
    backend.expect_synthesize().returning(|_, output| {
        std::fs::write(output, wav_bytes(1.0)).map_err(|e| BackendError::io(Engine::Offline, e))?;
        Ok(SynthesisOutput {
            path: PathBuf::from(output),
            duration_seconds: None,
        })
    });
    backend
}

/// A backend whose engine always fails.
pub fn failing_backend(engine: Engine) -> MockBackend {
    let mut backend = MockBackend::new();
    backend.expect_engine().return_const(engine);
    backend.expect_audio_extension().return_const("wav");
    backend.expect_list_voices().returning(move || {
        Err(BackendError::not_configured(engine, "check API key"))
    });
    backend.expect_synthesize().returning(move |_, _| {
        Err(BackendError::Status {
            engine,
            status: 429,
            body: "quota exceeded".to_string(),
        })
    });
    backend
}
