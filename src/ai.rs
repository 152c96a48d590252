use std::io::{BufRead, BufReader, Lines};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::debug;
use serde::Serialize;

/// A finite, non-restartable stream of completion text chunks. Dropping the
/// iterator early is the cancellation signal; nothing else needs cleanup.
pub type ChunkStream = Box<dyn Iterator<Item = Result<String>>>;

/// The AI completion collaborator boundary: a prompt in, a lazy sequence of
/// text chunks out. The reader folds the chunks into accumulated text and
/// may stop consuming at any point.
pub trait CompletionClient {
    fn complete(&self, system: Option<&str>, prompt: &str) -> Result<ChunkStream>;
}

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Streaming chat-completions client. The API key is read from the
/// environment at construction but only required when a completion is
/// actually requested, so the reader starts fine without one and the
/// failure surfaces as a message on first use.
pub struct OpenAiClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let model = std::env::var("LECTERN_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build http client")?;
        Ok(OpenAiClient {
            client,
            endpoint: chat_endpoint(&base_url),
            model,
            api_key: std::env::var("OPENAI_API_KEY").ok(),
        })
    }
}

impl CompletionClient for OpenAiClient {
    fn complete(&self, system: Option<&str>, prompt: &str) -> Result<ChunkStream> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("OPENAI_API_KEY is not set");
        };

        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        debug!("requesting completion from {} ({})", self.endpoint, self.model);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&ChatRequest {
                model: &self.model,
                stream: true,
                messages,
            })
            .send()
            .with_context(|| format!("POST {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().context("read error response body")?;
            let message = parse_error_message(&raw).unwrap_or(raw);
            bail!("completion API error ({status}): {message}");
        }

        Ok(Box::new(SseChunks::new(BufReader::new(response))))
    }
}

fn chat_endpoint(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/chat/completions")
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

/// Iterator over the text deltas of a server-sent-events completion stream.
/// Ends on `[DONE]`, a read error, or stream exhaustion; once finished it
/// stays finished.
struct SseChunks<R: BufRead> {
    lines: Lines<R>,
    done: bool,
}

impl<R: BufRead> SseChunks<R> {
    fn new(reader: R) -> Self {
        SseChunks {
            lines: reader.lines(),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for SseChunks<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err).context("read completion stream"));
                }
                None => {
                    self.done = true;
                    return None;
                }
            };
            let Some(payload) = line.strip_prefix("data:") else {
                continue;
            };
            let payload = payload.trim();
            if payload == "[DONE]" {
                self.done = true;
                return None;
            }
            match delta_text(payload) {
                Ok(Some(text)) if !text.is_empty() => return Some(Ok(text)),
                Ok(_) => continue,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

fn delta_text(payload: &str) -> Result<Option<String>> {
    let value: serde_json::Value =
        serde_json::from_str(payload).context("parse completion stream event")?;
    Ok(value
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|content| content.as_str())
        .map(str::to_owned))
}
