use super::{SpeechBackend, SynthesisOutput, SynthesisParams, Voice};
use crate::config_loader::Settings;
use crate::engine::Engine;
use crate::error::BackendError;
use async_trait::async_trait;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Offline synthesis through the `espeak-ng` binary.
///
/// Every call spawns its own child process, so concurrent requests never
/// share engine state.
pub struct EspeakBackend {
    binary: String,
    timeout: Duration,
}

impl EspeakBackend {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.espeak_binary.clone(),
            Duration::from_secs(settings.adapter_timeout_secs),
        )
    }

    fn run_blocking(
        binary: &str,
        timeout: Duration,
        args: &[String],
        stdin_text: Option<&str>,
    ) -> Result<Vec<u8>, BackendError> {
        let mut child = Command::new(binary)
            .args(args)
            .stdin(if stdin_text.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BackendError::Process {
                engine: Engine::Offline,
                message: format!("failed to run {}: {}", binary, e),
            })?;

        // Fed from its own thread so a child that stops reading still hits the timeout
        let writer = match (stdin_text, child.stdin.take()) {
            (Some(text), Some(mut stdin)) => {
                let text = text.to_string();
                Some(std::thread::spawn(move || {
                    stdin
                        .write_all(text.as_bytes())
                        .and_then(|_| stdin.write_all(b"\n"))
                }))
            }
            _ => None,
        };

        let status = match child.wait_timeout(timeout) {
            Ok(status) => status,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(BackendError::io(Engine::Offline, e));
            }
        };

        let Some(status) = status else {
            let _ = child.kill();
            let _ = child.wait();
            if let Some(writer) = writer {
                let _ = writer.join();
            }
            return Err(BackendError::Process {
                engine: Engine::Offline,
                message: format!("timed out after {}s", timeout.as_secs_f32()),
            });
        };

        let written = match writer.map(|w| w.join()) {
            Some(Ok(result)) => result,
            Some(Err(_)) => Err(std::io::Error::other("stdin writer panicked")),
            None => Ok(()),
        };
        let output = child
            .wait_with_output()
            .map_err(|e| BackendError::io(Engine::Offline, e))?;
        if !status.success() {
            return Err(BackendError::Process {
                engine: Engine::Offline,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written.map_err(|e| BackendError::io(Engine::Offline, e))?;
        Ok(output.stdout)
    }

    async fn run(
        &self,
        args: Vec<String>,
        stdin_text: Option<String>,
    ) -> Result<Vec<u8>, BackendError> {
        let binary = self.binary.clone();
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || {
            Self::run_blocking(&binary, timeout, &args, stdin_text.as_deref())
        })
        .await
        .map_err(|e| BackendError::Process {
            engine: Engine::Offline,
            message: format!("synthesis task failed: {}", e),
        })?
    }
}

/// Parses the table printed by `espeak-ng --voices`:
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  af              --/M      Afrikaans          gmw/af
///  2  en-us           --/M      English_(America)  gmw/en-US            (en 10)
/// ```
pub fn parse_voice_table(table: &str) -> Vec<Voice> {
    let Ok(row) = Regex::new(r"^\s*\d+\s+(\S+)\s+(\S+)\s+(\S+)\s+\S+") else {
        return Vec::new();
    };

    table
        .lines()
        .filter_map(|line| row.captures(line))
        .map(|caps| {
            let language = caps[1].to_string();
            let gender = match caps[2].rsplit('/').next() {
                Some("M") => Some("male".to_string()),
                Some("F") => Some("female".to_string()),
                _ => None,
            };
            Voice {
                engine: Engine::Offline,
                id: language.clone(),
                name: caps[3].replace('_', " "),
                language,
                gender,
            }
        })
        .collect()
}

#[async_trait]
impl SpeechBackend for EspeakBackend {
    fn engine(&self) -> Engine {
        Engine::Offline
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, BackendError> {
        let stdout = self.run(vec!["--voices".to_string()], None).await?;
        Ok(parse_voice_table(&String::from_utf8_lossy(&stdout)))
    }

    async fn synthesize(
        &self,
        params: &SynthesisParams,
        output: &Path,
    ) -> Result<SynthesisOutput, BackendError> {
        // espeak amplitude runs 0-200 with 100 as the normal level
        let amplitude = (params.volume.clamp(0.0, 1.0) * 100.0).round() as u32;
        let mut args = vec![
            "-w".to_string(),
            output.to_string_lossy().into_owned(),
            "-s".to_string(),
            (params.rate.round() as u32).to_string(),
            "-a".to_string(),
            amplitude.to_string(),
        ];
        if let Some(voice) = &params.voice {
            args.push("-v".to_string());
            args.push(voice.clone());
        }
        args.push("--stdin".to_string());

        self.run(args, Some(params.text.clone())).await?;

        if !output.exists() {
            return Err(BackendError::InvalidResponse {
                engine: Engine::Offline,
                message: "espeak-ng exited without writing audio".to_string(),
            });
        }

        Ok(SynthesisOutput {
            path: PathBuf::from(output),
            duration_seconds: None,
        })
    }
}
