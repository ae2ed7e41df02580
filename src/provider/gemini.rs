//! Driver for the Gemini generative-language API.
//!
//! Gemini's REST surface streams line-delimited `data: ` events like the
//! OpenAI dialect, but the payload shape is its own (`candidates` /
//! `content.parts`), the assistant role is called `model`, and there is no
//! termination sentinel — the stream ends when the connection closes. Model
//! ids come back under a `models/` namespace that has to be stripped before
//! use as a plain selector.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use crate::core::message::{Message, Role};
use crate::provider::error::ApiError;
use crate::provider::sse::{event_data, LineScanner};
use crate::provider::{ModelDescriptor, Provider, StreamSink};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const FALLBACK: &[(&str, &str, &str)] = &[
    ("gemini-2.5-flash", "Gemini 2.5 Flash", "Fast and versatile"),
    ("gemini-2.5-pro", "Gemini 2.5 Pro", "Advanced reasoning"),
    (
        "gemini-2.0-flash",
        "Gemini 2.0 Flash",
        "Previous generation fast model",
    ),
    (
        "gemini-flash-latest",
        "Gemini Flash Latest",
        "Latest Flash release",
    ),
];

/// Strips the `models/` namespace prefix so ids work as plain selectors,
/// both when listing and when accepting user-supplied ids.
pub fn normalize_model_id(id: &str) -> &str {
    id.strip_prefix("models/").unwrap_or(id)
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ModelsList {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    name: String,
    #[serde(rename = "displayName", default)]
    display_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "supportedGenerationMethods", default)]
    supported_generation_methods: Vec<String>,
}

pub struct Gemini {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl Gemini {
    pub fn new(api_key: String, model: String, client: reqwest::Client) -> Self {
        let model = if model.is_empty() {
            FALLBACK[0].0.to_string()
        } else {
            normalize_model_id(&model).to_string()
        };
        Gemini {
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

/// Incremental decoder for Gemini's event stream. No sentinel: end-of-stream
/// is the normal termination signal.
#[derive(Default)]
pub(crate) struct Decoder {
    lines: LineScanner,
}

impl Decoder {
    pub(crate) fn push(&mut self, chunk: &[u8], fragments: &mut Vec<String>) {
        self.lines.push(chunk);
        while let Some(line) = self.lines.next_line() {
            let Some(data) = event_data(&line) else {
                continue;
            };
            match serde_json::from_str::<StreamChunk>(data) {
                Ok(chunk) => {
                    for candidate in chunk.candidates {
                        let Some(content) = candidate.content else {
                            continue;
                        };
                        for part in content.parts {
                            if let Some(text) = part.text {
                                if !text.is_empty() {
                                    fragments.push(text);
                                }
                            }
                        }
                    }
                }
                Err(err) => tracing::debug!("skipping malformed stream event: {err}"),
            }
        }
    }
}

#[async_trait]
impl Provider for Gemini {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream_with_history(
        &self,
        history: &[Message],
        sink: &mut dyn StreamSink,
    ) -> Result<(), ApiError> {
        let request = GenerateRequest {
            contents: history
                .iter()
                .map(|m| Content {
                    role: match m.role {
                        Role::User => "user",
                        Role::Assistant => "model",
                    },
                    parts: vec![Part {
                        text: m.content.clone(),
                    }],
                })
                .collect(),
        };

        let url = format!(
            "{BASE_URL}/models/{}:streamGenerateContent?alt=sse",
            self.model
        );
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
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
        }
        Ok(())
    }

    async fn list_models(&self) -> Vec<ModelDescriptor> {
        let response = self
            .client
            .get(format!("{BASE_URL}/models"))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            _ => {
                tracing::debug!("gemini: model discovery failed, using fallback list");
                return Self::fallback_models();
            }
        };

        let Ok(parsed) = response.json::<ModelsList>().await else {
            return Self::fallback_models();
        };

        let models: Vec<ModelDescriptor> = parsed
            .models
            .into_iter()
            .filter(|m| {
                m.supported_generation_methods
                    .iter()
                    .any(|method| method == "generateContent")
            })
            .map(|m| {
                let id = normalize_model_id(&m.name).to_string();
                let display = m.display_name.unwrap_or_else(|| id.clone());
                ModelDescriptor::new(&id, &display, m.description.as_deref().unwrap_or(""))
            })
            .collect();

        if models.is_empty() {
            Self::fallback_models()
        } else {
            models
        }
    }
}
