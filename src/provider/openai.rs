//! Driver for backends speaking the OpenAI chat-completions dialect.
//!
//! ChatGPT, DeepSeek, Mistral, and Qwen all share this wire shape: a JSON
//! POST with the full message history, answered by a line-delimited event
//! stream where `data: ` lines carry delta payloads and a `[DONE]` sentinel
//! signals normal termination. One driver parameterized by base URL covers
//! all four.

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::api::{ChatMessage, ChatRequest, ChatResponse, ModelsResponse};
use crate::core::message::Message;
use crate::provider::error::ApiError;
use crate::provider::http::join_url;
use crate::provider::sse::{event_data, LineScanner};
use crate::provider::{ModelDescriptor, Provider, StreamSink};

const DONE_SENTINEL: &str = "[DONE]";

type Fallback = (&'static str, &'static str, &'static str);

const CHATGPT_FALLBACK: &[Fallback] = &[
    ("gpt-4o", "GPT-4o", "Most capable multimodal model"),
    ("gpt-4o-mini", "GPT-4o Mini", "Fast and affordable"),
    ("gpt-4-turbo", "GPT-4 Turbo", "Advanced reasoning"),
    ("o1-preview", "o1 Preview", "Reasoning model"),
    ("o1-mini", "o1 Mini", "Lightweight reasoning"),
];

const DEEPSEEK_FALLBACK: &[Fallback] = &[
    ("deepseek-chat", "DeepSeek Chat", "General purpose chat model"),
    ("deepseek-reasoner", "DeepSeek Reasoner", "Advanced reasoning model"),
];

const MISTRAL_FALLBACK: &[Fallback] = &[
    ("mistral-large-latest", "Mistral Large", "Most capable model"),
    ("mistral-small-latest", "Mistral Small", "Fast and efficient"),
    ("codestral-latest", "Codestral", "Code generation"),
    ("ministral-8b-latest", "Ministral 8B", "Lightweight model"),
];

const QWEN_FALLBACK: &[Fallback] = &[
    ("qwen-max", "Qwen Max", "Most capable Qwen model"),
    ("qwen-plus", "Qwen Plus", "Balanced performance"),
    ("qwen-turbo", "Qwen Turbo", "Fast and efficient"),
    ("qwen2.5-72b-instruct", "Qwen 2.5 72B", "Large instruction model"),
    ("qwen2.5-32b-instruct", "Qwen 2.5 32B", "Medium instruction model"),
];

pub struct OpenAiCompatible {
    name: &'static str,
    base_url: &'static str,
    api_key: String,
    model: String,
    client: reqwest::Client,
    fallback: &'static [Fallback],
    // ChatGPT's /models endpoint lists embeddings, TTS, and other non-chat
    // models; the filter keeps the listing usable.
    model_filter: Option<fn(&str) -> bool>,
}

impl OpenAiCompatible {
    fn new(
        name: &'static str,
        base_url: &'static str,
        api_key: String,
        model: String,
        client: reqwest::Client,
        fallback: &'static [Fallback],
        model_filter: Option<fn(&str) -> bool>,
    ) -> Self {
        let model = if model.is_empty() {
            fallback[0].0.to_string()
        } else {
            model
        };
        OpenAiCompatible {
            name,
            base_url,
            api_key,
            model,
            client,
            fallback,
            model_filter,
        }
    }

    pub fn chatgpt(api_key: String, model: String, client: reqwest::Client) -> Self {
        Self::new(
            "chatgpt",
            "https://api.openai.com/v1",
            api_key,
            model,
            client,
            CHATGPT_FALLBACK,
            Some(|id| id.contains("gpt") || id.contains("o1")),
        )
    }

    pub fn deepseek(api_key: String, model: String, client: reqwest::Client) -> Self {
        Self::new(
            "deepseek",
            "https://api.deepseek.com/v1",
            api_key,
            model,
            client,
            DEEPSEEK_FALLBACK,
            None,
        )
    }

    pub fn mistral(api_key: String, model: String, client: reqwest::Client) -> Self {
        Self::new(
            "mistral",
            "https://api.mistral.ai/v1",
            api_key,
            model,
            client,
            MISTRAL_FALLBACK,
            None,
        )
    }

    pub fn qwen(api_key: String, model: String, client: reqwest::Client) -> Self {
        Self::new(
            "qwen",
            "https://dashscope-intl.aliyuncs.com/compatible-mode/v1",
            api_key,
            model,
            client,
            QWEN_FALLBACK,
            None,
        )
    }

    fn fallback_models(&self) -> Vec<ModelDescriptor> {
        self.fallback
            .iter()
            .map(|(id, name, desc)| ModelDescriptor::new(id, name, desc))
            .collect()
    }
}

/// Incremental decoder for the line-delimited event framing. Feed it raw
/// body chunks; it yields delta fragments and flags the `[DONE]` sentinel.
#[derive(Default)]
pub(crate) struct Decoder {
    lines: LineScanner,
    done: bool,
}

impl Decoder {
    pub(crate) fn push(&mut self, chunk: &[u8], fragments: &mut Vec<String>) {
        self.lines.push(chunk);
        while let Some(line) = self.lines.next_line() {
            if self.done {
                break;
            }
            let Some(data) = event_data(&line) else {
                continue;
            };
            if data == DONE_SENTINEL {
                self.done = true;
                break;
            }
            match serde_json::from_str::<ChatResponse>(data) {
                Ok(response) => {
                    if let Some(choice) = response.choices.first() {
                        if let Some(content) = &choice.delta.content {
                            if !content.is_empty() {
                                fragments.push(content.clone());
                            }
                        }
                    }
                }
                // A single corrupt event must not abort the stream.
                Err(err) => tracing::debug!("skipping malformed stream event: {err}"),
            }
        }
    }

    pub(crate) fn is_done(&self) -> bool {
        self.done
    }
}

#[async_trait]
impl Provider for OpenAiCompatible {
    fn name(&self) -> &'static str {
        self.name
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream_with_history(
        &self,
        history: &[Message],
        sink: &mut dyn StreamSink,
    ) -> Result<(), ApiError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: history
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.as_api_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            stream: true,
        };

        let response = self
            .client
            .post(join_url(self.base_url, "chat/completions"))
            .header("Content-Type", "application/json")
            .bearer_auth(&self.api_key)
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
            .get(join_url(self.base_url, "models"))
            .bearer_auth(&self.api_key)
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            _ => {
                tracing::debug!("{}: model discovery failed, using fallback list", self.name);
                return self.fallback_models();
            }
        };

        let Ok(parsed) = response.json::<ModelsResponse>().await else {
            return self.fallback_models();
        };

        let models: Vec<ModelDescriptor> = parsed
            .data
            .into_iter()
            .filter(|m| self.model_filter.map_or(true, |keep| keep(&m.id)))
            .map(|m| {
                let display = m.display_name.unwrap_or_else(|| m.id.clone());
                ModelDescriptor::new(&m.id, &display, "")
            })
            .collect();

        if models.is_empty() {
            self.fallback_models()
        } else {
            models
        }
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

    fn delta_line(text: &str) -> String {
        format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{text}\"}}}}]}}\n")
    }

    #[test]
    fn fragments_concatenate_to_all_deltas_before_sentinel() {
        let payload = format!(
            "{}{}data: [DONE]\n{}",
            delta_line("He"),
            delta_line("llo"),
            delta_line("ignored after done"),
        );
        let (fragments, done) = decode_all(&[payload.as_bytes()]);
        assert_eq!(fragments, vec!["He", "llo"]);
        assert!(done);
    }

    #[test]
    fn chunk_boundary_invariance() {
        let payload = format!("{}{}data: [DONE]\n", delta_line("Hel"), delta_line("lo!"));
        let bytes = payload.as_bytes();

        let (whole, _) = decode_all(&[bytes]);
        for split in 1..bytes.len() {
            let (parts, done) = decode_all(&[&bytes[..split], &bytes[split..]]);
            assert_eq!(parts, whole, "split at byte {split} changed the output");
            assert!(done);
        }
    }

    #[test]
    fn malformed_line_is_skipped() {
        let payload = format!(
            "{}data: {{not json}}\n{}data: [DONE]\n",
            delta_line("a"),
            delta_line("b")
        );
        let (fragments, done) = decode_all(&[payload.as_bytes()]);
        assert_eq!(fragments, vec!["a", "b"]);
        assert!(done);
    }

    #[test]
    fn non_data_lines_are_ignored() {
        let payload = format!(": keep-alive\n\n{}data: [DONE]\n", delta_line("x"));
        let (fragments, _) = decode_all(&[payload.as_bytes()]);
        assert_eq!(fragments, vec!["x"]);
    }

    #[test]
    fn empty_model_defaults_to_first_fallback() {
        let client = crate::provider::http::build_client();
        let p = OpenAiCompatible::chatgpt("k".into(), String::new(), client.clone());
        assert_eq!(p.model_id(), "gpt-4o");
        let p = OpenAiCompatible::deepseek("k".into(), String::new(), client);
        assert_eq!(p.model_id(), "deepseek-chat");
    }

    #[test]
    fn chatgpt_filter_keeps_chat_models() {
        let client = crate::provider::http::build_client();
        let p = OpenAiCompatible::chatgpt("k".into(), "gpt-4o".into(), client);
        let keep = p.model_filter.unwrap();
        assert!(keep("gpt-4o-mini"));
        assert!(keep("o1-preview"));
        assert!(!keep("text-embedding-3-small"));
    }
}
