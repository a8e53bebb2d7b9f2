//! Configuration for the generation pipeline.
//!
//! Maps to the `[llm]` table of `sunny.toml`. API keys are never stored in
//! the file; each provider names the environment variable that holds one.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Wire protocol spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// `/chat/completions` with bearer auth (Groq, OpenAI, Together...).
    OpenAiCompatible,
    /// Google `generateContent` with a rotating list of models.
    Gemini,
}

/// One entry in the ordered provider list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Protocol.
    pub kind: ProviderKind,
    /// Full endpoint URL (OpenAI-compatible) or API base (Gemini).
    pub url: String,
    /// Models to use. OpenAI-compatible providers use the first; Gemini
    /// rotates through all of them.
    pub models: Vec<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl ProviderConfig {
    /// Groq's free tier, the default primary.
    #[must_use]
    pub fn groq() -> Self {
        Self {
            kind: ProviderKind::OpenAiCompatible,
            url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            models: vec!["llama-3.1-8b-instant".to_string()],
            api_key_env: "GROQ_API_KEY".to_string(),
        }
    }

    /// Gemini's flash models, the default fallback.
    #[must_use]
    pub fn gemini() -> Self {
        Self {
            kind: ProviderKind::Gemini,
            url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            models: [
                "gemini-2.5-flash-lite",
                "gemini-2.0-flash-lite",
                "gemini-2.0-flash",
                "gemini-2.5-flash",
            ]
            .iter()
            .map(|m| (*m).to_string())
            .collect(),
            api_key_env: "GEMINI_API_KEY".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Providers in priority order.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,
    /// Minimum gap between two provider calls, ms.
    #[serde(default = "default_spacing_ms")]
    pub request_spacing_ms: u64,
    /// Longest rate-limit wait a request sits through before giving up, ms.
    #[serde(default = "default_max_wait_ms")]
    pub max_rate_limit_wait_ms: u64,
    /// Extra wait added after a rate limit expires, ms.
    #[serde(default = "default_wait_padding_ms")]
    pub rate_limit_padding_ms: u64,
    /// Back-off used when a provider gives no retry-after hint, seconds.
    #[serde(default = "default_retry_after_secs")]
    pub default_retry_after_secs: u64,
    /// How long a model that reported exhaustion is skipped, seconds.
    #[serde(default = "default_exhaustion_secs")]
    pub model_exhaustion_secs: u64,
    /// Samples in the rolling latency average.
    #[serde(default = "default_latency_window")]
    pub latency_window: usize,
    /// Lines kept in the shared chat history.
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// History lines included in each player prompt.
    #[serde(default = "default_history_in_prompt")]
    pub history_in_prompt: usize,
    /// Replies are cut to this many chars.
    #[serde(default = "default_reply_chars")]
    pub max_reply_chars: usize,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Nucleus sampling.
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Output token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-call HTTP timeout, ms.
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            request_spacing_ms: default_spacing_ms(),
            max_rate_limit_wait_ms: default_max_wait_ms(),
            rate_limit_padding_ms: default_wait_padding_ms(),
            default_retry_after_secs: default_retry_after_secs(),
            model_exhaustion_secs: default_exhaustion_secs(),
            latency_window: default_latency_window(),
            history_size: default_history_size(),
            history_in_prompt: default_history_in_prompt(),
            max_reply_chars: default_reply_chars(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            request_timeout_ms: default_timeout_ms(),
        }
    }
}

impl LlmConfig {
    /// Spacing between calls.
    #[must_use]
    pub fn spacing(&self) -> Duration {
        Duration::from_millis(self.request_spacing_ms)
    }

    /// Longest acceptable rate-limit wait.
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_rate_limit_wait_ms)
    }

    /// Padding after a rate limit.
    #[must_use]
    pub fn padding(&self) -> Duration {
        Duration::from_millis(self.rate_limit_padding_ms)
    }

    /// Fallback retry-after.
    #[must_use]
    pub fn default_retry_after(&self) -> Duration {
        Duration::from_secs(self.default_retry_after_secs)
    }

    /// Model exhaustion window.
    #[must_use]
    pub fn exhaustion(&self) -> Duration {
        Duration::from_secs(self.model_exhaustion_secs)
    }

    /// HTTP timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![ProviderConfig::groq(), ProviderConfig::gemini()]
}
fn default_spacing_ms() -> u64 {
    2_200
}
fn default_max_wait_ms() -> u64 {
    15_000
}
fn default_wait_padding_ms() -> u64 {
    300
}
fn default_retry_after_secs() -> u64 {
    10
}
fn default_exhaustion_secs() -> u64 {
    3_600
}
fn default_latency_window() -> usize {
    20
}
fn default_history_size() -> usize {
    12
}
fn default_history_in_prompt() -> usize {
    4
}
fn default_reply_chars() -> usize {
    200
}
fn default_temperature() -> f32 {
    0.8
}
fn default_top_p() -> f32 {
    0.9
}
fn default_max_tokens() -> u32 {
    400
}
fn default_timeout_ms() -> u64 {
    20_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_groq_then_gemini() {
        let config: LlmConfig = toml::from_str("").expect("empty llm table");
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].kind, ProviderKind::OpenAiCompatible);
        assert_eq!(config.providers[1].models.len(), 4);
        assert_eq!(config.spacing(), Duration::from_millis(2_200));
        assert_eq!(config.max_wait(), Duration::from_secs(15));
    }

    #[test]
    fn provider_list_overrides() {
        let config: LlmConfig = toml::from_str(
            r#"
            request_spacing_ms = 500

            [[providers]]
            kind = "openai_compatible"
            url = "http://localhost:8080/v1/chat/completions"
            models = ["local"]
            api_key_env = "LOCAL_KEY"
            "#,
        )
        .expect("llm table");
        assert_eq!(config.providers.len(), 1);
        assert_eq!(config.providers[0].models, vec!["local".to_string()]);
        assert_eq!(config.request_spacing_ms, 500);
        assert_eq!(config.max_reply_chars, 200);
    }
}
