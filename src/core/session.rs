//! The session core shared by both front ends.
//!
//! [`SessionCore`] owns the conversation, the active provider facade, and
//! the command dispatch + turn execution logic. The blocking REPL and the
//! event-loop UI differ only in how they source input and render output;
//! the state machine lives here once.

use std::sync::{Arc, Mutex};

use crate::core::config::Config;
use crate::core::conversation::Conversation;
use crate::core::message::Message;
use crate::core::resolver::{parse_model_spec, provider_for_model};
use crate::provider::{create_provider, ApiError, Provider, ProviderKind, StreamSink};

/// Session commands. The command surface (names and synonyms) is a stable
/// user-facing contract.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Clear,
    Exit,
    /// `/model <model | provider/model | provider>`; empty arg shows usage.
    Model(String),
}

/// What to do with a line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputKind {
    /// Forward to the backend as a user message.
    Message,
    Command(Command),
    UnknownCommand(String),
}

struct CommandSpec {
    name: &'static str,
    aliases: &'static [&'static str],
    usage: &'static str,
    description: &'static str,
}

const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "help",
        aliases: &["h", "?"],
        usage: "/help",
        description: "Show this help",
    },
    CommandSpec {
        name: "clear",
        aliases: &["c"],
        usage: "/clear",
        description: "Clear the conversation",
    },
    CommandSpec {
        name: "model",
        aliases: &["m"],
        usage: "/model <model | provider/model | provider>",
        description: "Switch model or provider",
    },
    CommandSpec {
        name: "exit",
        aliases: &["quit", "q"],
        usage: "/exit",
        description: "Exit the session",
    },
];

pub fn classify_input(input: &str) -> InputKind {
    let trimmed = input.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return InputKind::Message;
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };
    let name = name.to_ascii_lowercase();

    let matched = COMMANDS
        .iter()
        .find(|spec| spec.name == name || spec.aliases.contains(&name.as_str()));
    match matched.map(|spec| spec.name) {
        Some("help") => InputKind::Command(Command::Help),
        Some("clear") => InputKind::Command(Command::Clear),
        Some("exit") => InputKind::Command(Command::Exit),
        Some("model") => InputKind::Command(Command::Model(args.to_string())),
        _ => InputKind::UnknownCommand(trimmed.to_string()),
    }
}

pub fn help_text() -> String {
    let mut text = String::from("Commands:\n");
    for spec in COMMANDS {
        let aliases: Vec<String> = spec.aliases.iter().map(|a| format!("/{a}")).collect();
        text.push_str(&format!(
            "  {:<42} {} (aliases: {})\n",
            spec.usage,
            spec.description,
            aliases.join(", ")
        ));
    }
    text
}

/// Result of dispatching a parsed command.
#[derive(Debug, PartialEq)]
pub enum CommandOutcome {
    /// Display this text and stay in the session.
    Notice(String),
    Exit,
}

/// Discards fragments; the blocking front end renders the accumulated text
/// once the turn completes.
pub struct NullSink;

impl StreamSink for NullSink {
    fn push_fragment(&mut self, _fragment: &str) {}
}

/// Forwards fragments to the caller's sink while accumulating the full text
/// for the history commit.
struct Tee<'a> {
    out: &'a mut dyn StreamSink,
    text: String,
}

impl StreamSink for Tee<'_> {
    fn push_fragment(&mut self, fragment: &str) {
        self.text.push_str(fragment);
        self.out.push_fragment(fragment);
    }
}

struct Active {
    kind: ProviderKind,
    provider: Arc<dyn Provider>,
}

pub struct SessionCore {
    conversation: Conversation,
    active: Mutex<Active>,
    config: Config,
    client: reqwest::Client,
}

impl SessionCore {
    pub fn new(kind: ProviderKind, api_key: String, model: String, config: Config) -> Self {
        let client = crate::provider::http::build_client();
        let provider = create_provider(kind, api_key, model, client.clone());
        SessionCore {
            conversation: Conversation::new(),
            active: Mutex::new(Active { kind, provider }),
            config,
            client,
        }
    }

    #[cfg(test)]
    fn with_provider(kind: ProviderKind, provider: Arc<dyn Provider>, config: Config) -> Self {
        SessionCore {
            conversation: Conversation::new(),
            active: Mutex::new(Active { kind, provider }),
            config,
            client: crate::provider::http::build_client(),
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// `(provider, model)` of the active facade, for display.
    pub fn active_names(&self) -> (String, String) {
        let active = self.active.lock().unwrap();
        (
            active.kind.as_str().to_string(),
            active.provider.model_id().to_string(),
        )
    }

    fn active_provider(&self) -> Arc<dyn Provider> {
        self.active.lock().unwrap().provider.clone()
    }

    /// Executes one turn: appends the user message, streams against a
    /// snapshot of the history, commits the assistant reply on success, and
    /// rolls the user message back on failure so a retry does not duplicate
    /// it. Callers must reject empty input before calling.
    pub async fn send_turn(
        &self,
        input: &str,
        sink: &mut dyn StreamSink,
    ) -> Result<String, ApiError> {
        self.conversation.append(Message::user(input));
        let history = self.conversation.snapshot();
        let provider = self.active_provider();

        let mut tee = Tee {
            out: sink,
            text: String::new(),
        };
        match provider.stream_with_history(&history, &mut tee).await {
            Ok(()) => {
                let text = tee.text;
                self.conversation.append(Message::assistant(text.clone()));
                Ok(text)
            }
            Err(err) => {
                self.conversation.rollback_user();
                Err(err)
            }
        }
    }

    pub fn dispatch_command(&self, command: Command) -> CommandOutcome {
        match command {
            Command::Help => CommandOutcome::Notice(help_text()),
            Command::Clear => {
                self.conversation.clear();
                CommandOutcome::Notice("Conversation cleared.".to_string())
            }
            Command::Exit => CommandOutcome::Exit,
            Command::Model(arg) => {
                if arg.is_empty() {
                    let (provider, model) = self.active_names();
                    CommandOutcome::Notice(format!(
                        "Current: {provider}/{model}\nUsage: /model <model | provider/model | provider>"
                    ))
                } else {
                    match self.switch_model(&arg) {
                        Ok(notice) => CommandOutcome::Notice(notice),
                        Err(err) => CommandOutcome::Notice(err),
                    }
                }
            }
        }
    }

    /// Rebinds the session to a new facade. Accepts a bare provider name
    /// (re-resolving that provider's default model), a `provider/model`
    /// spec, or a bare model id whose provider is prefix-detected (falling
    /// back to the current provider).
    fn switch_model(&self, spec: &str) -> Result<String, String> {
        let (kind, model) = if let Some(kind) = ProviderKind::from_name(spec) {
            (kind, String::new())
        } else {
            let (spec_provider, model) = parse_model_spec(spec);
            let kind = match spec_provider {
                Some(name) => ProviderKind::from_name(name)
                    .ok_or_else(|| format!("Unknown provider: {name}"))?,
                None => provider_for_model(model)
                    .unwrap_or_else(|| self.active.lock().unwrap().kind),
            };
            (kind, model.to_string())
        };

        let credentials = self
            .config
            .credentials_for(kind.as_str())
            .map_err(|e| e.to_string())?
            .ok_or_else(|| {
                format!(
                    "Provider '{}' is not configured; add an api_key to your config",
                    kind.as_str()
                )
            })?;

        let model = if model.is_empty() {
            credentials.model.clone().unwrap_or_default()
        } else {
            model
        };

        let provider = create_provider(
            kind,
            credentials.api_key.clone(),
            model,
            self.client.clone(),
        );
        let notice = format!("Switched to {}/{}", kind.as_str(), provider.model_id());
        *self.active.lock().unwrap() = Active { kind, provider };
        Ok(notice)
    }
}

/// User-facing description of a failed turn, with a distinct hint when the
/// failure looks like the model not existing on the backend.
pub fn describe_error(model: &str, err: &ApiError) -> String {
    if err.is_model_not_found() {
        format!("Model '{model}' was not found by the backend. Try /model to pick another.")
    } else {
        format!("Query failed: {err}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use reqwest::StatusCode;

    use crate::core::config::ProviderConfig;
    use crate::core::message::Role;
    use crate::provider::ModelDescriptor;

    struct Scripted {
        fragments: Vec<&'static str>,
        fail_status: Option<u16>,
    }

    #[async_trait]
    impl Provider for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn model_id(&self) -> &str {
            "scripted-model"
        }

        async fn stream_with_history(
            &self,
            _history: &[Message],
            sink: &mut dyn StreamSink,
        ) -> Result<(), ApiError> {
            if let Some(status) = self.fail_status {
                return Err(ApiError::from_status(
                    StatusCode::from_u16(status).unwrap(),
                    "scripted failure".to_string(),
                ));
            }
            for fragment in &self.fragments {
                sink.push_fragment(fragment);
            }
            Ok(())
        }

        async fn list_models(&self) -> Vec<ModelDescriptor> {
            vec![ModelDescriptor::new("scripted-model", "Scripted", "")]
        }
    }

    fn core_with(fragments: Vec<&'static str>, fail_status: Option<u16>) -> SessionCore {
        SessionCore::with_provider(
            ProviderKind::ChatGpt,
            Arc::new(Scripted {
                fragments,
                fail_status,
            }),
            Config::default(),
        )
    }

    struct Recording(Vec<String>);

    impl StreamSink for Recording {
        fn push_fragment(&mut self, fragment: &str) {
            self.0.push(fragment.to_string());
        }
    }

    #[tokio::test]
    async fn successful_turn_commits_concatenated_fragments() {
        let core = core_with(vec!["He", "llo"], None);
        let mut sink = Recording(Vec::new());

        let text = core.send_turn("hi", &mut sink).await.unwrap();

        assert_eq!(text, "Hello");
        assert_eq!(sink.0, vec!["He", "llo"]);

        let history = core.conversation().snapshot();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "hi");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].content, "Hello");
    }

    #[tokio::test]
    async fn failed_turn_rolls_back_and_delivers_no_fragments() {
        let core = core_with(Vec::new(), Some(401));
        let mut sink = Recording(Vec::new());

        let err = core.send_turn("hi", &mut sink).await.unwrap_err();
        assert!(matches!(err, ApiError::Auth));
        assert!(sink.0.is_empty());
        assert!(core.conversation().is_empty());
    }

    #[tokio::test]
    async fn retry_after_failure_does_not_duplicate_the_user_turn() {
        let failing = core_with(Vec::new(), Some(500));
        let _ = failing.send_turn("same input", &mut NullSink).await;
        assert_eq!(failing.conversation().len(), 0);

        let ok = core_with(vec!["fine"], None);
        ok.conversation().append(Message::user("earlier"));
        ok.conversation().append(Message::assistant("reply"));
        let before = ok.conversation().len();
        let _ = ok.send_turn("same input", &mut NullSink).await.unwrap();
        let history = ok.conversation().snapshot();
        assert_eq!(history.len(), before + 2);
        let users = history
            .iter()
            .filter(|m| m.role == Role::User && m.content == "same input")
            .count();
        assert_eq!(users, 1);
    }

    #[test]
    fn classify_commands_and_synonyms() {
        assert_eq!(classify_input("hello there"), InputKind::Message);
        for input in ["/help", "/h", "/?", "/HELP"] {
            assert_eq!(classify_input(input), InputKind::Command(Command::Help));
        }
        for input in ["/clear", "/c"] {
            assert_eq!(classify_input(input), InputKind::Command(Command::Clear));
        }
        for input in ["/exit", "/quit", "/q"] {
            assert_eq!(classify_input(input), InputKind::Command(Command::Exit));
        }
        assert_eq!(
            classify_input("/model gemini/gemini-2.5-pro"),
            InputKind::Command(Command::Model("gemini/gemini-2.5-pro".into()))
        );
        assert_eq!(
            classify_input("/m"),
            InputKind::Command(Command::Model(String::new()))
        );
        assert_eq!(
            classify_input("/bogus"),
            InputKind::UnknownCommand("/bogus".into())
        );
    }

    #[test]
    fn clear_command_empties_history_and_prior_snapshots_survive() {
        let core = core_with(Vec::new(), None);
        core.conversation().append(Message::user("hi"));
        let snapshot = core.conversation().snapshot();

        let outcome = core.dispatch_command(Command::Clear);
        assert_eq!(
            outcome,
            CommandOutcome::Notice("Conversation cleared.".into())
        );
        assert!(core.conversation().is_empty());
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn switch_model_by_bare_provider_and_spec() {
        let mut config = Config::default();
        config.providers.insert(
            "claude".into(),
            ProviderConfig {
                api_key: "k".into(),
                model: None,
            },
        );
        let core = SessionCore::with_provider(
            ProviderKind::ChatGpt,
            Arc::new(Scripted {
                fragments: Vec::new(),
                fail_status: None,
            }),
            config,
        );

        // Bare provider name re-resolves that provider's default model.
        let notice = core.switch_model("claude").unwrap();
        assert_eq!(notice, "Switched to claude/claude-3-5-sonnet-20241022");
        assert_eq!(core.active_names().0, "claude");

        // Bare model id prefix-detects its provider.
        let notice = core.switch_model("claude-3-opus-20240229").unwrap();
        assert_eq!(notice, "Switched to claude/claude-3-opus-20240229");

        // Unconfigured provider is refused.
        let err = core.switch_model("qwen/qwen-max").unwrap_err();
        assert!(err.contains("not configured"));

        // Unknown provider in a spec is refused.
        let err = core.switch_model("llamafarm/llama-70b").unwrap_err();
        assert!(err.contains("Unknown provider"));
    }

    #[test]
    fn model_not_found_gets_a_distinct_hint() {
        let err = ApiError::from_status(
            StatusCode::from_u16(404).unwrap(),
            "model not found".into(),
        );
        let text = describe_error("gpt-7", &err);
        assert!(text.contains("/model"));

        let text = describe_error("gpt-4o", &ApiError::RateLimited);
        assert!(text.starts_with("Query failed"));
    }

    #[test]
    fn help_lists_every_command() {
        let help = help_text();
        for name in ["/help", "/clear", "/model", "/exit"] {
            assert!(help.contains(name), "help should mention {name}");
        }
    }
}
