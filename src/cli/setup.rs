//! First-run configuration wizard.
//!
//! Walks through each provider, offering its key-signup URL and accepting a
//! pasted credential (Enter skips). Existing entries are preserved; the
//! chosen default provider and all keys land in the TOML config.

use std::error::Error;
use std::io::{self, BufRead, Write};

use crate::core::config::{is_placeholder_key, Config, ProviderConfig};

pub struct ProviderInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub key_url: &'static str,
}

pub const PROVIDERS: &[ProviderInfo] = &[
    ProviderInfo {
        name: "gemini",
        description: "Google Gemini (free tier available)",
        key_url: "https://makersuite.google.com/app/apikey",
    },
    ProviderInfo {
        name: "claude",
        description: "Anthropic Claude",
        key_url: "https://console.anthropic.com/",
    },
    ProviderInfo {
        name: "chatgpt",
        description: "OpenAI ChatGPT",
        key_url: "https://platform.openai.com/api-keys",
    },
    ProviderInfo {
        name: "deepseek",
        description: "DeepSeek (cost-effective)",
        key_url: "https://platform.deepseek.com/",
    },
    ProviderInfo {
        name: "mistral",
        description: "Mistral AI",
        key_url: "https://console.mistral.ai/",
    },
    ProviderInfo {
        name: "qwen",
        description: "Alibaba Qwen",
        key_url: "https://dashscope.console.aliyun.com/apiKey",
    },
];

pub fn run_wizard() -> Result<(), Box<dyn Error>> {
    println!();
    println!("  Welcome to Ask! Let's set up your API keys.");
    println!("  Press Enter to skip any provider you don't want to configure.");
    println!();

    let mut config = Config::load_lenient();
    let stdin = io::stdin();
    let mut configured = 0usize;
    let mut first_provider: Option<&'static str> = None;

    for info in PROVIDERS {
        let already = config
            .providers
            .get(info.name)
            .map(|pc| !pc.api_key.is_empty() && !is_placeholder_key(&pc.api_key))
            .unwrap_or(false);

        println!(
            "  [{}] {}{}",
            info.name,
            info.description,
            if already { "  [configured]" } else { "" }
        );
        println!("  Get key: {}", info.key_url);
        print!("  API key (Enter to skip): ");
        io::stdout().flush()?;

        let mut line = String::new();
        stdin.lock().read_line(&mut line)?;
        let api_key = line.trim();

        if !api_key.is_empty() {
            // Preserve any previously chosen model for this provider.
            let model = config.providers.get(info.name).and_then(|pc| pc.model.clone());
            config.providers.insert(
                info.name.to_string(),
                ProviderConfig {
                    api_key: api_key.to_string(),
                    model,
                },
            );
            println!("  Saved");
            configured += 1;
            first_provider.get_or_insert(info.name);
        } else if already {
            configured += 1;
            first_provider.get_or_insert(info.name);
        }
        println!();
    }

    if configured == 0 {
        println!("  No providers configured; nothing was saved.");
        return Ok(());
    }

    let suggested = first_provider.unwrap_or(PROVIDERS[0].name);
    print!("  Default provider [{suggested}]: ");
    io::stdout().flush()?;
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    let choice = line.trim();
    let default = if !choice.is_empty() && config.providers.contains_key(choice) {
        choice.to_string()
    } else {
        suggested.to_string()
    };
    config.default_provider = Some(default);

    config.save()?;
    println!();
    println!("  Configuration saved to {}", Config::config_path().display());
    println!();
    println!("  Try it out:");
    println!("    ask What is the meaning of life?");
    println!("    ask -s    # interactive session");
    Ok(())
}

pub fn print_placeholder_key_help(provider: &str) {
    eprintln!("API key not configured for '{provider}'");
    eprintln!();
    eprintln!("It looks like you haven't added your API key yet.");
    eprintln!();
    eprintln!("Get an API key:");
    match PROVIDERS.iter().find(|info| info.name == provider) {
        Some(info) => eprintln!("   Visit: {}", info.key_url),
        None => eprintln!("   Check your provider's documentation for '{provider}'"),
    }
    eprintln!();
    eprintln!("Then edit your config.toml and replace the placeholder with your real API key:");
    eprintln!();
    eprintln!("   [providers.{provider}]");
    eprintln!("   api_key = \"your-actual-api-key-here\"");
    eprintln!();
    eprintln!("Or re-run 'ask --config'.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderKind;

    #[test]
    fn every_backend_has_wizard_coverage() {
        for kind in ProviderKind::ALL {
            assert!(
                PROVIDERS.iter().any(|info| info.name == kind.as_str()),
                "wizard is missing {}",
                kind.as_str()
            );
        }
    }
}
