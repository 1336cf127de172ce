use super::{ensure_success, write_audio, SpeechBackend, SynthesisOutput, SynthesisParams, Voice};
use crate::config_loader::Settings;
use crate::engine::Engine;
use crate::error::BackendError;
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};

/// The translate endpoint refuses longer inputs.
const MAX_CHUNK_CHARS: usize = 200;

/// Google serves 32 kbit/s mono MP3.
const MP3_BYTES_PER_SEC: f64 = 32_000.0 / 8.0;

const LANGUAGES: &[(&str, &str)] = &[
    ("en", "English"),
    ("en-uk", "English (UK)"),
    ("es", "Spanish"),
    ("fr", "French"),
    ("de", "German"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("nl", "Dutch"),
    ("ru", "Russian"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
    ("zh-CN", "Chinese (Mandarin)"),
    ("hi", "Hindi"),
];

/// Google Translate text-to-speech. No credentials; voices are languages.
pub struct GttsBackend {
    client: Client,
    base_url: String,
}

impl GttsBackend {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(client: Client, settings: &Settings) -> Self {
        Self::new(client, settings.gtts_base_url.clone())
    }

    async fn fetch_chunk(
        &self,
        chunk: &str,
        index: usize,
        total: usize,
        language: &str,
        speed: &str,
    ) -> Result<Vec<u8>, BackendError> {
        let url = format!("{}/translate_tts", self.base_url);
        let total = total.to_string();
        let index = index.to_string();
        let text_len = chunk.chars().count().to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("q", chunk),
                ("tl", language),
                ("ttsspeed", speed),
                ("total", total.as_str()),
                ("idx", index.as_str()),
                ("textlen", text_len.as_str()),
            ])
            .send()
            .await
            .map_err(|e| BackendError::http(Engine::Gtts, e))?;

        let response = ensure_success(Engine::Gtts, response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::http(Engine::Gtts, e))?;
        Ok(bytes.to_vec())
    }
}

/// Splits text into chunks of at most `max_chars` characters, breaking on
/// whitespace where possible.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        // Words longer than a whole chunk get hard-split
        while word.chars().count() > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let cut = word
                .char_indices()
                .nth(max_chars)
                .map(|(i, _)| i)
                .unwrap_or(word.len());
            chunks.push(word[..cut].to_string());
            word = &word[cut..];
        }
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl SpeechBackend for GttsBackend {
    fn engine(&self) -> Engine {
        Engine::Gtts
    }

    fn audio_extension(&self) -> &'static str {
        "mp3"
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, BackendError> {
        Ok(LANGUAGES
            .iter()
            .map(|(code, name)| Voice {
                engine: Engine::Gtts,
                id: code.to_string(),
                name: name.to_string(),
                language: code.to_string(),
                gender: None,
            })
            .collect())
    }

    async fn synthesize(
        &self,
        params: &SynthesisParams,
        output: &Path,
    ) -> Result<SynthesisOutput, BackendError> {
        // The voice is the language; an explicit voice wins over the request language
        let language = params.voice.as_deref().unwrap_or(&params.language);
        // gTTS only knows normal and slow
        let speed = if params.rate < 100.0 { "0.3" } else { "1" };

        let chunks = split_text(&params.text, MAX_CHUNK_CHARS);
        let total = chunks.len();
        let mut audio = Vec::new();
        for (index, chunk) in chunks.iter().enumerate() {
            let bytes = self.fetch_chunk(chunk, index, total, language, speed).await?;
            audio.extend_from_slice(&bytes);
        }

        write_audio(Engine::Gtts, output, &audio).await?;

        Ok(SynthesisOutput {
            path: PathBuf::from(output),
            duration_seconds: Some(audio.len() as f64 / MP3_BYTES_PER_SEC),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_short_text_is_single_chunk() {
        assert_eq!(split_text("Hello world", 200), vec!["Hello world"]);
    }

    #[test]
    fn test_split_respects_limit() {
        let text = "lorem ipsum dolor sit amet ".repeat(30);
        let chunks = split_text(&text, 200);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 200));
        assert_eq!(chunks.join(" "), text.trim());
    }

    #[test]
    fn test_split_hard_splits_long_words() {
        let word = "a".repeat(450);
        let chunks = split_text(&word, 200);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].len(), 50);
    }

    #[tokio::test]
    async fn test_voices_are_languages() {
        let backend = GttsBackend::new(Client::new(), "http://localhost");
        let voices = backend.list_voices().await.unwrap();
        assert!(voices.iter().any(|v| v.id == "en" && v.language == "en"));
    }
}
