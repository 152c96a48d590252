use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use serde::Serialize;
use tempfile::NamedTempFile;

/// The text-to-speech collaborator boundary: text in, audio bytes out.
pub trait SpeechSynthesizer {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
const DEFAULT_VOICE_ID: &str = "pNInz6obpgDQGcFmaJgB";
const DEFAULT_MODEL_ID: &str = "eleven_multilingual_v2";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    use_speaker_boost: bool,
}

/// ElevenLabs HTTP synthesizer. Like the completion client, the API key is
/// optional until the feature is actually used.
pub struct ElevenLabsClient {
    client: reqwest::blocking::Client,
    base_url: String,
    voice_id: String,
    model_id: String,
    api_key: Option<String>,
}

impl ElevenLabsClient {
    pub fn from_env() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build http client")?;
        Ok(ElevenLabsClient {
            client,
            base_url: std::env::var("ELEVENLABS_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            voice_id: std::env::var("LECTERN_VOICE_ID")
                .unwrap_or_else(|_| DEFAULT_VOICE_ID.into()),
            model_id: DEFAULT_MODEL_ID.to_string(),
            api_key: std::env::var("ELEVENLABS_API_KEY").ok(),
        })
    }
}

impl SpeechSynthesizer for ElevenLabsClient {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("ELEVENLABS_API_KEY is not set");
        };
        let endpoint = format!(
            "{}/v1/text-to-speech/{}",
            self.base_url.trim_end_matches('/'),
            self.voice_id
        );
        debug!("synthesizing {} chars of speech", text.len());

        let response = self
            .client
            .post(&endpoint)
            .header("xi-api-key", api_key)
            .json(&SpeechRequest {
                text,
                model_id: &self.model_id,
                voice_settings: VoiceSettings {
                    stability: 0.0,
                    similarity_boost: 1.0,
                    style: 0.0,
                    use_speaker_boost: true,
                },
            })
            .send()
            .with_context(|| format!("POST {endpoint}"))?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().unwrap_or_default();
            bail!("speech API error ({status}): {raw}");
        }
        let audio = response.bytes().context("read audio body")?;
        Ok(audio.to_vec())
    }
}

/// Players tried in order; the first one that spawns wins. Overridable with
/// LECTERN_PLAYER for setups where none of these are on PATH.
const PLAYERS: [(&str, &[&str]); 3] = [
    ("mpv", &["--no-video", "--really-quiet"]),
    ("ffplay", &["-nodisp", "-autoexit", "-loglevel", "quiet"]),
    ("afplay", &[]),
];

/// A running playback. Killing the child is the cancellation path; the temp
/// file must outlive the player, so it rides along.
pub struct Playback {
    child: Child,
    _audio_file: NamedTempFile,
}

impl Playback {
    pub fn is_finished(&mut self) -> Result<bool> {
        Ok(self.child.try_wait().context("poll audio player")?.is_some())
    }

    /// Blocks until the player exits on its own.
    pub fn wait(&mut self) -> Result<()> {
        self.child.wait().context("wait for audio player")?;
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        if self.child.try_wait()?.is_none() {
            self.child.kill().context("stop audio player")?;
        }
        self.child.wait()?;
        Ok(())
    }
}

/// Writes the audio to a temp file and hands it to an external player.
/// Blocking-until-done is the caller's choice via [`Playback::wait`]; the
/// reader instead polls [`Playback::is_finished`] so a cancellation key can
/// interrupt playback.
pub fn play(audio: &[u8]) -> Result<Playback> {
    let mut audio_file = tempfile::Builder::new()
        .prefix("lectern-tts")
        .suffix(".mp3")
        .tempfile()
        .context("create audio temp file")?;
    audio_file
        .write_all(audio)
        .context("write audio temp file")?;
    audio_file.flush()?;
    let path = audio_file.path().to_path_buf();

    if let Ok(player) = std::env::var("LECTERN_PLAYER") {
        let child = spawn_player(&player, &[], &path)?;
        return Ok(Playback {
            child,
            _audio_file: audio_file,
        });
    }

    for (player, args) in PLAYERS {
        match spawn_player(player, args, &path) {
            Ok(child) => {
                return Ok(Playback {
                    child,
                    _audio_file: audio_file,
                });
            }
            Err(err) => warn!("audio player {player} unavailable: {err}"),
        }
    }
    bail!("no audio player found (tried mpv, ffplay, afplay; set LECTERN_PLAYER)");
}

fn spawn_player(player: &str, args: &[&str], path: &std::path::Path) -> Result<Child> {
    Command::new(player)
        .args(args)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("spawn {player}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_cancel_kills_a_running_player() {
        let mut audio_file = NamedTempFile::new().unwrap();
        audio_file.write_all(b"silence").unwrap();
        let child = Command::new("sleep")
            .arg("30")
            .stdout(Stdio::null())
            .spawn()
            .unwrap();
        let mut playback = Playback {
            child,
            _audio_file: audio_file,
        };
        assert!(!playback.is_finished().unwrap());
        playback.cancel().unwrap();
        assert!(playback.is_finished().unwrap());
    }
}
