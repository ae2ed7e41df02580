//! Provider facades: one uniform streaming contract over backends with
//! incompatible wire framings.
//!
//! Every backend implements [`Provider`]: send the full message history,
//! forward text fragments into a [`StreamSink`] as they are parsed, and end
//! with a classified outcome. Model discovery never fails the caller — each
//! driver degrades to a fixed fallback list. A facade instance binds one
//! credential and one model id at construction; switching model or provider
//! means constructing a new instance through [`create_provider`].

pub mod anthropic;
pub mod error;
pub mod gemini;
pub mod http;
pub mod openai;
pub mod sse;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::message::Message;
pub use error::ApiError;

/// A model offered by a backend. Only `id` is interpreted programmatically;
/// it is passed back verbatim as the selected model.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
    pub description: String,
}

impl ModelDescriptor {
    pub fn new(id: &str, display_name: &str, description: &str) -> Self {
        ModelDescriptor {
            id: id.to_string(),
            display_name: display_name.to_string(),
            description: description.to_string(),
        }
    }
}

/// Write-only, append-ordered destination for streamed text fragments.
/// Implementations must accept fragments in the exact order the backend
/// emitted them.
pub trait StreamSink: Send {
    fn push_fragment(&mut self, fragment: &str);
}

/// The accumulating buffer used by the blocking front end and tests.
impl StreamSink for String {
    fn push_fragment(&mut self, fragment: &str) {
        self.push_str(fragment);
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    /// Short backend id, e.g. `"claude"`.
    fn name(&self) -> &'static str;

    /// The model this facade instance is bound to.
    fn model_id(&self) -> &str;

    /// Sends the full history and streams fragments into `sink` as they are
    /// parsed — never buffered to completion first. Returns once the stream
    /// ends or errors; no fragments are emitted after an error status.
    async fn stream_with_history(
        &self,
        history: &[Message],
        sink: &mut dyn StreamSink,
    ) -> Result<(), ApiError>;

    /// Available models, newest-ish first. Degrades to the driver's fallback
    /// list on any discovery failure; never errors.
    async fn list_models(&self) -> Vec<ModelDescriptor>;
}

/// The backends this build knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Claude,
    ChatGpt,
    DeepSeek,
    Mistral,
    Qwen,
}

impl ProviderKind {
    pub const ALL: &'static [ProviderKind] = &[
        ProviderKind::Gemini,
        ProviderKind::Claude,
        ProviderKind::ChatGpt,
        ProviderKind::DeepSeek,
        ProviderKind::Mistral,
        ProviderKind::Qwen,
    ];

    pub fn from_name(name: &str) -> Option<ProviderKind> {
        match name.to_ascii_lowercase().as_str() {
            "gemini" => Some(ProviderKind::Gemini),
            "claude" => Some(ProviderKind::Claude),
            "chatgpt" => Some(ProviderKind::ChatGpt),
            "deepseek" => Some(ProviderKind::DeepSeek),
            "mistral" => Some(ProviderKind::Mistral),
            "qwen" => Some(ProviderKind::Qwen),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::Claude => "claude",
            ProviderKind::ChatGpt => "chatgpt",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Mistral => "mistral",
            ProviderKind::Qwen => "qwen",
        }
    }
}

/// Builds the facade for a backend. An empty `model` selects the first entry
/// of the backend's fallback list.
pub fn create_provider(
    kind: ProviderKind,
    api_key: String,
    model: String,
    client: reqwest::Client,
) -> Arc<dyn Provider> {
    match kind {
        ProviderKind::Gemini => Arc::new(gemini::Gemini::new(api_key, model, client)),
        ProviderKind::Claude => Arc::new(anthropic::Anthropic::new(api_key, model, client)),
        ProviderKind::ChatGpt => Arc::new(openai::OpenAiCompatible::chatgpt(api_key, model, client)),
        ProviderKind::DeepSeek => {
            Arc::new(openai::OpenAiCompatible::deepseek(api_key, model, client))
        }
        ProviderKind::Mistral => {
            Arc::new(openai::OpenAiCompatible::mistral(api_key, model, client))
        }
        ProviderKind::Qwen => Arc::new(openai::OpenAiCompatible::qwen(api_key, model, client)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names_round_trip() {
        for kind in ProviderKind::ALL {
            assert_eq!(ProviderKind::from_name(kind.as_str()), Some(*kind));
        }
        assert_eq!(ProviderKind::from_name("CLAUDE"), Some(ProviderKind::Claude));
        assert_eq!(ProviderKind::from_name("llama"), None);
    }

    #[test]
    fn empty_model_resolves_to_fallback_default() {
        let client = http::build_client();
        for kind in ProviderKind::ALL {
            let provider = create_provider(*kind, "k".into(), String::new(), client.clone());
            assert!(
                !provider.model_id().is_empty(),
                "{} facade should default its model",
                provider.name()
            );
        }
    }
}
