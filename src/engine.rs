use crate::error::TtsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Words per minute used when a request does not ask for a rate.
pub const DEFAULT_RATE: f32 = 150.0;

const RATE_RANGE: RangeInclusive<f32> = 50.0..=300.0;

/// The fixed set of text-to-speech engines the service can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Local espeak-ng synthesizer
    Offline,
    /// Google Translate TTS
    Gtts,
    /// OpenAI audio/speech API
    Openai,
    /// Azure Cognitive Services Speech
    Azure,
    /// Coqui TTS server
    Coqui,
}

impl Engine {
    pub const ALL: [Engine; 5] = [
        Engine::Offline,
        Engine::Gtts,
        Engine::Openai,
        Engine::Azure,
        Engine::Coqui,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Offline => "offline",
            Engine::Gtts => "gtts",
            Engine::Openai => "openai",
            Engine::Azure => "azure",
            Engine::Coqui => "coqui",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Engine::Offline => "espeak-ng (Offline)",
            Engine::Gtts => "Google TTS (Online)",
            Engine::Openai => "OpenAI TTS (Premium)",
            Engine::Azure => "Azure Speech (Premium)",
            Engine::Coqui => "Coqui TTS (AI)",
        }
    }

    /// Valid speech rate for this engine, in words per minute.
    /// Adapters translate it into their native unit.
    pub fn rate_range(&self) -> RangeInclusive<f32> {
        RATE_RANGE
    }

    pub fn clamp_rate(&self, rate: f32) -> f32 {
        let range = self.rate_range();
        if !rate.is_finite() {
            return DEFAULT_RATE;
        }
        rate.clamp(*range.start(), *range.end())
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Engine {
    type Err = TtsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "offline" | "espeak" | "espeak-ng" | "pyttsx3" => Ok(Engine::Offline),
            "gtts" | "google" => Ok(Engine::Gtts),
            "openai" => Ok(Engine::Openai),
            "azure" => Ok(Engine::Azure),
            "coqui" => Ok(Engine::Coqui),
            _ => Err(TtsError::UnsupportedEngine(s.to_string())),
        }
    }
}
