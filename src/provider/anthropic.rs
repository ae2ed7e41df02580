//! Driver for the Anthropic messages API.
//!
//! Claude streams typed events: each `data: ` payload carries a `type`
//! discriminator, and only `content_block_delta` events hold visible text.
//! Lifecycle events (`message_start`, `content_block_start`, `ping`, ...)
//! are silently consumed; `message_stop` ends the stream. The body arrives
//! in arbitrary byte chunks, so decoding runs through the shared
//! [`LineScanner`] and survives splits mid-line.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use crate::api::{ChatMessage, ModelsResponse};
use crate::core::message::Message;
use crate::provider::error::ApiError;
use crate::provider::sse::{event_data, LineScanner};
use crate::provider::{ModelDescriptor, Provider, StreamSink};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const MODELS_URL: &str = "https://api.anthropic.com/v1/models";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

const FALLBACK: &[(&str, &str, &str)] = &[
    (
        "claude-3-5-sonnet-20241022",
        "Claude 3.5 Sonnet",
        "Balanced intelligence and speed",
    ),
    (
        "claude-3-5-haiku-20241022",
        "Claude 3.5 Haiku",
        "Fast and efficient",
    ),
    ("claude-3-opus-20240229", "Claude 3 Opus", "Most capable"),
    (
        "claude-3-sonnet-20240229",
        "Claude 3 Sonnet",
        "Balanced performance",
    ),
];

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    delta: Option<EventDelta>,
}

#[derive(Deserialize)]
struct EventDelta {
    #[serde(default)]
    text: Option<String>,
}

pub struct Anthropic {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl Anthropic {
    pub fn new(api_key: String, model: String, client: reqwest::Client) -> Self {
        let model = if model.is_empty() {
            FALLBACK[0].0.to_string()
        } else {
            model
        };
        Anthropic {
            api_key,
            model,
            client,
        }
    }

    fn fallback_models() -> Vec<ModelDescriptor> {
        FALLBACK
            .iter()
            .map(|(id, name, desc)| ModelDescriptor::new(id, name, desc))
            .collect()
    }
}

/// Incremental decoder for the typed-event framing.
#[derive(Default)]
pub(crate) struct Decoder {
    lines: LineScanner,
    stopped: bool,
}

impl Decoder {
    pub(crate) fn push(&mut self, chunk: &[u8], fragments: &mut Vec<String>) {
        self.lines.push(chunk);
        while let Some(line) = self.lines.next_line() {
            if self.stopped {
                break;
            }
            let Some(data) = event_data(&line) else {
                continue;
            };
            match serde_json::from_str::<StreamEvent>(data) {
                Ok(event) => match event.kind.as_str() {
                    "content_block_delta" => {
                        if let Some(text) = event.delta.and_then(|d| d.text) {
                            if !text.is_empty() {
                                fragments.push(text);
                            }
                        }
                    }
                    "message_stop" => self.stopped = true,
                    // message_start, content_block_start/stop, ping, ...
                    _ => {}
                },
                Err(err) => tracing::debug!("skipping malformed stream event: {err}"),
            }
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.stopped
    }
}

#[async_trait]
impl Provider for Anthropic {
    fn name(&self) -> &'static str {
        "claude"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream_with_history(
        &self,
        history: &[Message],
        sink: &mut dyn StreamSink,
    ) -> Result<(), ApiError> {
        let request = MessagesRequest {
            model: self.model.clone(),
            messages: history
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_api_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: MAX_TOKENS,
            stream: true,
        };

        let response = self
            .client
            .post(MESSAGES_URL)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, body));
        }

        let mut stream = response.bytes_stream();
        let mut decoder = Decoder::default();
        let mut fragments = Vec::new();
        while let Some(chunk) = stream.next().await {
            decoder.push(&chunk?, &mut fragments);
            for fragment in fragments.drain(..) {
                sink.push_fragment(&fragment);
            }
            if decoder.is_done() {
                break;
            }
        }
        Ok(())
    }

    async fn list_models(&self) -> Vec<ModelDescriptor> {
        let response = self
            .client
            .get(MODELS_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            _ => {
                tracing::debug!("claude: model discovery failed, using fallback list");
                return Self::fallback_models();
            }
        };

        let Ok(parsed) = response.json::<ModelsResponse>().await else {
            return Self::fallback_models();
        };

        if parsed.data.is_empty() {
            return Self::fallback_models();
        }

        parsed
            .data
            .into_iter()
            .map(|m| {
                let display = m.display_name.unwrap_or_else(|| m.id.clone());
                ModelDescriptor::new(&m.id, &display, "")
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(chunks: &[&[u8]]) -> (Vec<String>, bool) {
        let mut decoder = Decoder::default();
        let mut fragments = Vec::new();
        for chunk in chunks {
            decoder.push(chunk, &mut fragments);
        }
        (fragments, decoder.is_done())
    }

    const STREAM: &str = "event: message_start\n\
        data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\"}}\n\
        event: content_block_start\n\
        data: {\"type\":\"content_block_start\",\"index\":0}\n\
        data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"He\"}}\n\
        data: {\"type\":\"ping\"}\n\
        data: {\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"llo\"}}\n\
        data: {\"type\":\"content_block_stop\",\"index\":0}\n\
        data: {\"type\":\"message_stop\"}\n";

    #[test]
    fn only_content_deltas_emit_text() {
        let (fragments, done) = decode_all(&[STREAM.as_bytes()]);
        assert_eq!(fragments, vec!["He", "llo"]);
        assert!(done);
    }

    #[test]
    fn chunk_boundary_invariance_including_mid_line() {
        let bytes = STREAM.as_bytes();
        let (whole, _) = decode_all(&[bytes]);

        for split in 1..bytes.len() {
            let (parts, done) = decode_all(&[&bytes[..split], &bytes[split..]]);
            assert_eq!(parts, whole, "split at byte {split} changed the output");
            assert!(done);
        }
    }

    #[test]
    fn malformed_event_is_skipped() {
        let payload = "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"a\"}}\n\
            data: {broken\n\
            data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"b\"}}\n\
            data: {\"type\":\"message_stop\"}\n";
        let (fragments, done) = decode_all(&[payload.as_bytes()]);
        assert_eq!(fragments, vec!["a", "b"]);
        assert!(done);
    }

    #[test]
    fn empty_model_defaults_to_first_fallback() {
        let client = crate::provider::http::build_client();
        let p = Anthropic::new("k".into(), String::new(), client);
        assert_eq!(p.model_id(), "claude-3-5-sonnet-20241022");
    }
}
