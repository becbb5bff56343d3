//! Model selection: the provider lookup table and the per-task model choice.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// LLM providers the automation agent can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    OpenAi,
    Google,
    Anthropic,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported model provider: {0}")]
pub struct UnsupportedProvider(pub String);

impl ModelProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelProvider::OpenAi => "openai",
            ModelProvider::Google => "google",
            ModelProvider::Anthropic => "anthropic",
        }
    }
}

impl FromStr for ModelProvider {
    type Err = UnsupportedProvider;

    /// Producers send mixed case ("Google", "openai"), so matching ignores case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ModelProvider::OpenAi),
            "google" => Ok(ModelProvider::Google),
            "anthropic" => Ok(ModelProvider::Anthropic),
            _ => Err(UnsupportedProvider(s.to_string())),
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider + model slug as requested by a task message.
///
/// The provider stays a raw string here: rejecting an unknown provider is the
/// execution adapter's job, and it must surface as a run failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    pub provider: String,
    pub slug: String,
}

impl ModelChoice {
    pub fn new(provider: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            slug: slug.into(),
        }
    }

    /// Fill whichever half the message left out from `fallback`.
    pub fn resolve(provider: Option<&str>, slug: Option<&str>, fallback: &ModelChoice) -> Self {
        Self {
            provider: provider.unwrap_or(&fallback.provider).to_string(),
            slug: slug.unwrap_or(&fallback.slug).to_string(),
        }
    }
}

impl Default for ModelChoice {
    /// Same default the producer applies when a suite run names no model.
    fn default() -> Self {
        Self::new("google", "gemini-2.5-flash")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("openai", ModelProvider::OpenAi)]
    #[case("Google", ModelProvider::Google)]
    #[case(" ANTHROPIC ", ModelProvider::Anthropic)]
    fn providers_match_case_insensitively(#[case] raw: &str, #[case] expected: ModelProvider) {
        assert_eq!(raw.parse::<ModelProvider>().unwrap(), expected);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = "mistral".parse::<ModelProvider>().unwrap_err();
        assert_eq!(err.to_string(), "unsupported model provider: mistral");
    }

    #[test]
    fn missing_halves_fall_back() {
        let fallback = ModelChoice::default();
        let choice = ModelChoice::resolve(Some("openai"), None, &fallback);
        assert_eq!(choice, ModelChoice::new("openai", "gemini-2.5-flash"));

        let choice = ModelChoice::resolve(None, None, &fallback);
        assert_eq!(choice, fallback);
    }
}
