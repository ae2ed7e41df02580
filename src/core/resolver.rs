//! Provider and model resolution.
//!
//! Turns user inputs (flags, `provider/model` specs, profile names) plus the
//! config into a concrete provider/model pair. Precedence: explicit provider
//! flag, provider from the model spec, provider auto-detected from the model
//! name prefix, then the config default.

use thiserror::Error;

use crate::core::config::Config;
use crate::provider::ProviderKind;

const MODEL_PREFIXES: &[(&str, ProviderKind)] = &[
    ("gemini", ProviderKind::Gemini),
    ("gpt", ProviderKind::ChatGpt),
    ("o1", ProviderKind::ChatGpt),
    ("o3", ProviderKind::ChatGpt),
    ("claude", ProviderKind::Claude),
    ("deepseek", ProviderKind::DeepSeek),
    ("mistral", ProviderKind::Mistral),
    ("codestral", ProviderKind::Mistral),
    ("ministral", ProviderKind::Mistral),
    ("pixtral", ProviderKind::Mistral),
    ("qwen", ProviderKind::Qwen),
];

#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("profile '{name}': {reason}")]
    Profile { name: String, reason: &'static str },

    #[error("cannot determine a provider; set default_provider in config or pass --provider")]
    NoProvider,
}

/// The resolved selection. `model` may be empty, in which case the facade
/// falls back to the provider's default model.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub provider: String,
    pub model: String,
}

/// Detects which provider a model belongs to from its name prefix.
pub fn provider_for_model(model: &str) -> Option<ProviderKind> {
    let model = model.to_ascii_lowercase();
    MODEL_PREFIXES
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map(|(_, kind)| *kind)
}

/// Splits a `provider/model` spec. A bare `model` yields no provider part.
pub fn parse_model_spec(spec: &str) -> (Option<&str>, &str) {
    match spec.split_once('/') {
        Some((provider, model)) => (Some(provider), model),
        None => (None, spec),
    }
}

pub fn resolve(
    provider_flag: Option<&str>,
    model_flag: Option<&str>,
    profile_flag: Option<&str>,
    config: &Config,
) -> Result<Selection, ResolveError> {
    if let Some(profile) = profile_flag {
        return resolve_profile(profile, config);
    }

    let (spec_provider, spec_model) = match model_flag {
        Some(spec) => parse_model_spec(spec),
        None => (None, ""),
    };

    let provider = provider_flag
        .map(str::to_string)
        .or_else(|| spec_provider.map(str::to_string))
        .or_else(|| provider_for_model(spec_model).map(|k| k.as_str().to_string()))
        .or_else(|| config.default_provider.clone())
        .ok_or(ResolveError::NoProvider)?;

    let model = if !spec_model.is_empty() {
        spec_model.to_string()
    } else {
        config
            .providers
            .get(&provider)
            .and_then(|pc| pc.model.clone())
            .unwrap_or_default()
    };

    Ok(Selection { provider, model })
}

fn resolve_profile(name: &str, config: &Config) -> Result<Selection, ResolveError> {
    if config.profiles.is_empty() {
        return Err(ResolveError::Profile {
            name: name.to_string(),
            reason: "no profiles defined in config",
        });
    }
    let Some(spec) = config.profiles.get(name) else {
        return Err(ResolveError::Profile {
            name: name.to_string(),
            reason: "profile not found",
        });
    };

    let (provider, model) = parse_model_spec(spec);
    let provider = provider
        .map(str::to_string)
        .or_else(|| provider_for_model(model).map(|k| k.as_str().to_string()))
        .ok_or(ResolveError::Profile {
            name: name.to_string(),
            reason: "cannot determine provider from profile",
        })?;

    Ok(Selection {
        provider,
        model: model.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ProviderConfig;

    fn config() -> Config {
        let mut config = Config {
            default_provider: Some("gemini".into()),
            ..Config::default()
        };
        config.providers.insert(
            "gemini".into(),
            ProviderConfig {
                api_key: "k".into(),
                model: Some("gemini-2.5-pro".into()),
            },
        );
        config
            .profiles
            .insert("fast".into(), "gemini/gemini-2.5-flash".into());
        config
            .profiles
            .insert("smart".into(), "claude-3-opus-20240229".into());
        config
    }

    #[test]
    fn prefix_detection() {
        assert_eq!(provider_for_model("gpt-4o"), Some(ProviderKind::ChatGpt));
        assert_eq!(provider_for_model("o1-mini"), Some(ProviderKind::ChatGpt));
        assert_eq!(
            provider_for_model("Claude-3-Opus"),
            Some(ProviderKind::Claude)
        );
        assert_eq!(
            provider_for_model("codestral-latest"),
            Some(ProviderKind::Mistral)
        );
        assert_eq!(provider_for_model("llama-70b"), None);
    }

    #[test]
    fn spec_parsing() {
        assert_eq!(
            parse_model_spec("gemini/gemini-2.5-pro"),
            (Some("gemini"), "gemini-2.5-pro")
        );
        assert_eq!(parse_model_spec("gpt-4o"), (None, "gpt-4o"));
    }

    #[test]
    fn provider_flag_wins() {
        let sel = resolve(Some("claude"), Some("gpt-4o"), None, &config()).unwrap();
        assert_eq!(sel.provider, "claude");
        assert_eq!(sel.model, "gpt-4o");
    }

    #[test]
    fn provider_from_spec_then_prefix_then_default() {
        let sel = resolve(None, Some("deepseek/deepseek-chat"), None, &config()).unwrap();
        assert_eq!(sel.provider, "deepseek");

        let sel = resolve(None, Some("qwen-max"), None, &config()).unwrap();
        assert_eq!(sel.provider, "qwen");

        let sel = resolve(None, None, None, &config()).unwrap();
        assert_eq!(sel.provider, "gemini");
        // Default provider picks up its configured model.
        assert_eq!(sel.model, "gemini-2.5-pro");
    }

    #[test]
    fn profile_resolution() {
        let sel = resolve(None, None, Some("fast"), &config()).unwrap();
        assert_eq!(sel.provider, "gemini");
        assert_eq!(sel.model, "gemini-2.5-flash");

        // Profile without an explicit provider falls back to prefix detection.
        let sel = resolve(None, None, Some("smart"), &config()).unwrap();
        assert_eq!(sel.provider, "claude");
    }

    #[test]
    fn unknown_profile_is_a_distinct_error() {
        let err = resolve(None, None, Some("nope"), &config()).unwrap_err();
        assert_eq!(
            err,
            ResolveError::Profile {
                name: "nope".into(),
                reason: "profile not found"
            }
        );
    }

    #[test]
    fn no_provider_anywhere() {
        let empty = Config::default();
        assert_eq!(
            resolve(None, None, None, &empty).unwrap_err(),
            ResolveError::NoProvider
        );
    }
}
