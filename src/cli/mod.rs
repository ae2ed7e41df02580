//! Command-line interface parsing and dispatch.

pub mod setup;

use std::error::Error;
use std::sync::Arc;

use clap::Parser;

use crate::core::config::{Config, ConfigError};
use crate::core::resolver;
use crate::core::session::SessionCore;
use crate::provider::{create_provider, http, ProviderKind};
use crate::ui::theme::Theme;
use crate::ui::{repl, tui};

const EXAMPLES: &str = "\
Examples:
  ask What is the meaning of life?
  ask -m gpt-4o Write a haiku about Rust
  ask -p claude Explain quantum computing
  ask -P fast Tell me a joke
  ask -s              Start an interactive session
  ask -t              Start the full-screen interface
  ask --list-models
  ask --config        Run the configuration wizard";

#[derive(Parser, Debug)]
#[command(name = "ask", version, about = "Query AI models from the terminal")]
#[command(after_help = EXAMPLES)]
pub struct Args {
    /// AI provider to use (gemini, claude, chatgpt, deepseek, mistral, qwen)
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Model to use, or provider/model (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Use a named profile from config
    #[arg(short = 'P', long)]
    pub profile: Option<String>,

    /// Start an interactive session
    #[arg(short, long)]
    pub session: bool,

    /// Start the full-screen interface
    #[arg(short, long)]
    pub tui: bool,

    /// List available models for all providers
    #[arg(long)]
    pub list_models: bool,

    /// Run the configuration wizard
    #[arg(long)]
    pub config: bool,

    /// The prompt to send (one-shot mode)
    #[arg(trailing_var_arg = true)]
    pub prompt: Vec<String>,
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    if args.config {
        return setup::run_wizard();
    }
    if args.list_models {
        return list_models().await;
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(ConfigError::NotFound) => {
            // First run: walk through setup instead of failing.
            return setup::run_wizard();
        }
        Err(ConfigError::PlaceholderKey { provider }) => {
            setup::print_placeholder_key_help(&provider);
            return Err("API key not configured".into());
        }
        Err(err) => {
            eprintln!("Error loading config: {err}\n");
            eprintln!("Quick troubleshooting:");
            eprintln!("  1. Make sure config.toml exists in the current directory or {}", Config::config_path().display());
            eprintln!("  2. Check that at least one provider has a valid API key");
            eprintln!("  3. Run 'ask --config' to set up interactively");
            return Err("invalid configuration".into());
        }
    };

    let selection = resolver::resolve(
        args.provider.as_deref(),
        args.model.as_deref(),
        args.profile.as_deref(),
        &config,
    )?;

    let Some(kind) = ProviderKind::from_name(&selection.provider) else {
        return Err(format!(
            "Unknown provider: {}\nSupported providers: gemini, claude, chatgpt, deepseek, mistral, qwen",
            selection.provider
        )
        .into());
    };

    let credentials = match config.credentials_for(&selection.provider) {
        Ok(Some(pc)) => pc.clone(),
        Ok(None) => {
            return Err(format!(
                "Provider '{}' not found in config\nConfigured providers: {}",
                selection.provider,
                config.configured_providers().join(", ")
            )
            .into());
        }
        Err(ConfigError::PlaceholderKey { provider }) => {
            setup::print_placeholder_key_help(&provider);
            return Err("API key not configured".into());
        }
        Err(err) => return Err(err.into()),
    };

    let markdown = config.markdown.unwrap_or(true);
    let theme = Theme::default();
    let core = SessionCore::new(kind, credentials.api_key, selection.model, config);

    if args.tui {
        return tui::run(Arc::new(core), theme, markdown).await;
    }
    if args.session {
        return repl::run(Arc::new(core), theme, markdown).await;
    }

    let prompt = args.prompt.join(" ");
    if prompt.trim().is_empty() {
        return Err("No prompt given. Pass a prompt, or use -s for an interactive session (see --help).".into());
    }
    repl::run_single(&core, &theme, markdown, &prompt).await
}

/// Prints model listings for every backend: live lists where a credential is
/// configured, the fallback lists otherwise. Discovery never fails, so this
/// always produces output.
async fn list_models() -> Result<(), Box<dyn Error>> {
    let config = Config::load_lenient();
    let client = http::build_client();

    for kind in ProviderKind::ALL {
        let credentials = config.credentials_for(kind.as_str()).ok().flatten();
        let configured = credentials.is_some();
        let api_key = credentials.map(|pc| pc.api_key.clone()).unwrap_or_default();

        let provider = create_provider(*kind, api_key, String::new(), client.clone());
        let models = provider.list_models().await;

        let label = kind.as_str().to_uppercase();
        if configured {
            println!("[>] {label}");
        } else {
            println!("[>] {label} (not configured - showing defaults)");
        }
        for model in models {
            if model.description.is_empty() {
                println!("   • {}", model.id);
            } else {
                println!("   • {} - {}", model.id, model.description);
            }
        }
        println!();
    }

    println!("Usage:");
    println!("  ask -m <model-name> Your prompt here");
    println!("  ask -m gemini/gemini-2.5-pro Explain AI");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_words_become_the_prompt() {
        let args = Args::parse_from(["ask", "what", "is", "rust"]);
        assert_eq!(args.prompt, vec!["what", "is", "rust"]);
        assert!(!args.session);
    }

    #[test]
    fn flags_parse_with_short_and_long_forms() {
        let args = Args::parse_from(["ask", "-p", "claude", "-m", "claude-3-opus-20240229", "-s"]);
        assert_eq!(args.provider.as_deref(), Some("claude"));
        assert_eq!(args.model.as_deref(), Some("claude-3-opus-20240229"));
        assert!(args.session);

        let args = Args::parse_from(["ask", "--profile", "fast", "--tui"]);
        assert_eq!(args.profile.as_deref(), Some("fast"));
        assert!(args.tui);
    }

    #[test]
    fn utility_flags() {
        assert!(Args::parse_from(["ask", "--list-models"]).list_models);
        assert!(Args::parse_from(["ask", "--config"]).config);
    }
}
