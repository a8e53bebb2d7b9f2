//! Provider backends.
//!
//! A [`Provider`] turns a system prompt and a user message into raw model
//! text, or a typed [`GenerationError`] the pipeline can act on. Two wire
//! protocols are supported: OpenAI-compatible chat completions and Google's
//! `generateContent` with per-model exhaustion tracking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{LlmConfig, ProviderConfig, ProviderKind};
use crate::error::{GenerationError, Result};
use crate::types::{ProviderReply, truncate};

/// Error bodies are cut to this many chars.
const ERROR_BODY_CHARS: usize = 200;

/// A dialogue backend.
#[async_trait]
pub trait Provider: Send + Sync + fmt::Debug {
    /// Short name for logs and stats.
    fn name(&self) -> &str;

    /// Run one completion.
    async fn call(&self, system: &str, user: &str) -> Result<ProviderReply>;

    /// Models currently skipped because they reported exhaustion.
    fn exhausted_models(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Sampling settings shared by every backend.
#[derive(Debug, Clone, Copy)]
struct Sampling {
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    timeout: Duration,
    default_retry_after: Duration,
}

impl From<&LlmConfig> for Sampling {
    fn from(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
            default_retry_after: config.default_retry_after(),
        }
    }
}

/// Build every configured provider whose API key is present, in order.
///
/// Providers without a key are skipped; an empty result means generation
/// is disabled and callers should go straight to canned replies.
#[must_use]
pub fn from_config(config: &LlmConfig) -> Vec<Arc<dyn Provider>> {
    let http = Client::new();
    config
        .providers
        .iter()
        .filter_map(|provider| {
            let key = std::env::var(&provider.api_key_env).ok().filter(|k| !k.trim().is_empty());
            let Some(key) = key else {
                debug!(env = %provider.api_key_env, "no API key, provider skipped");
                return None;
            };
            let built: Arc<dyn Provider> = match provider.kind {
                ProviderKind::OpenAiCompatible => {
                    Arc::new(OpenAiCompatibleProvider::new(http.clone(), provider, key, config))
                }
                ProviderKind::Gemini => Arc::new(GeminiProvider::new(http.clone(), provider, key, config)),
            };
            info!(provider = built.name(), "provider enabled");
            Some(built)
        })
        .collect()
}

async fn http_error(response: reqwest::Response) -> GenerationError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    GenerationError::ProviderHttp {
        status,
        body: truncate(&body, ERROR_BODY_CHARS),
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible
// ---------------------------------------------------------------------------

/// `/chat/completions` backend (Groq by default).
#[derive(Debug)]
pub struct OpenAiCompatibleProvider {
    http: Client,
    url: String,
    model: String,
    api_key: String,
    sampling: Sampling,
}

impl OpenAiCompatibleProvider {
    /// Create a backend for one endpoint. Uses the first configured model.
    #[must_use]
    pub fn new(http: Client, provider: &ProviderConfig, api_key: String, config: &LlmConfig) -> Self {
        Self {
            http,
            url: provider.url.clone(),
            model: provider.models.first().cloned().unwrap_or_default(),
            api_key,
            sampling: Sampling::from(config),
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn call(&self, system: &str, user: &str) -> Result<ProviderReply> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "response_format": { "type": "json_object" },
            "max_tokens": self.sampling.max_tokens,
            "temperature": self.sampling.temperature,
            "top_p": self.sampling.top_p,
        });

        let response = self
            .http
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .timeout(self.sampling.timeout)
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map_or(self.sampling.default_retry_after, Duration::from_secs);
            warn!(model = %self.model, secs = retry_after.as_secs(), "provider rate limited");
            return Err(GenerationError::RateLimited { retry_after });
        }
        if !response.status().is_success() {
            let err = http_error(response).await;
            warn!(model = %self.model, error = %err, "provider returned error");
            return Err(err);
        }

        let json: Value = response.json().await?;
        Ok(ProviderReply {
            text: json["choices"][0]["message"]["content"].as_str().unwrap_or("").to_string(),
            finish_reason: json["choices"][0]["finish_reason"].as_str().map(str::to_string),
            model: json["model"].as_str().unwrap_or(&self.model).to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

/// Which model to try next, and which are benched.
#[derive(Debug)]
struct ModelRotation {
    models: Vec<String>,
    index: usize,
    exhausted_until: HashMap<String, Instant>,
}

impl ModelRotation {
    fn new(models: Vec<String>) -> Self {
        Self {
            models,
            index: 0,
            exhausted_until: HashMap::new(),
        }
    }

    /// First usable model starting at the current index.
    fn current(&mut self, now: Instant) -> Option<String> {
        let len = self.models.len();
        for offset in 0..len {
            let idx = (self.index + offset) % len;
            let model = &self.models[idx];
            if self.exhausted_until.get(model).is_none_or(|until| now >= *until) {
                self.index = idx;
                return Some(model.clone());
            }
        }
        None
    }

    /// Bench `model` until `until` and move past it.
    fn exhaust(&mut self, model: &str, until: Instant) {
        self.exhausted_until.insert(model.to_string(), until);
        if let Some(pos) = self.models.iter().position(|m| m == model) {
            self.index = (pos + 1) % self.models.len();
        }
    }

    fn exhausted(&self, now: Instant) -> Vec<String> {
        self.models
            .iter()
            .filter(|m| self.exhausted_until.get(*m).is_some_and(|until| now < *until))
            .cloned()
            .collect()
    }
}

/// Google `generateContent` backend rotating through several models.
#[derive(Debug)]
pub struct GeminiProvider {
    http: Client,
    base_url: String,
    api_key: String,
    rotation: Mutex<ModelRotation>,
    exhaustion: Duration,
    sampling: Sampling,
}

impl GeminiProvider {
    /// Create a backend over the configured models, first model first.
    #[must_use]
    pub fn new(http: Client, provider: &ProviderConfig, api_key: String, config: &LlmConfig) -> Self {
        Self {
            http,
            base_url: provider.url.trim_end_matches('/').to_string(),
            api_key,
            rotation: Mutex::new(ModelRotation::new(provider.models.clone())),
            exhaustion: config.exhaustion(),
            sampling: Sampling::from(config),
        }
    }

    async fn call_model(&self, model: &str, system: &str, user: &str) -> Result<Option<ProviderReply>> {
        let url = format!("{}/models/{model}:generateContent", self.base_url);
        let body = json!({
            "system_instruction": { "parts": [{ "text": system }] },
            "contents": [{ "role": "user", "parts": [{ "text": user }] }],
            "generationConfig": {
                "temperature": self.sampling.temperature,
                "maxOutputTokens": self.sampling.max_tokens,
                "topP": self.sampling.top_p,
                "responseMimeType": "application/json",
            },
        });

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .timeout(self.sampling.timeout)
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let json: Value = response.json().await.unwrap_or(Value::Null);
            if json["error"]["status"].as_str() == Some("RESOURCE_EXHAUSTED") {
                let until = Instant::now() + self.exhaustion;
                self.rotation.lock().exhaust(model, until);
                info!(model, "model exhausted, rotating");
                return Ok(None);
            }
            return Err(GenerationError::RateLimited {
                retry_after: self.sampling.default_retry_after,
            });
        }
        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let json: Value = response.json().await?;
        let candidate = &json["candidates"][0];
        Ok(Some(ProviderReply {
            text: candidate["content"]["parts"][0]["text"].as_str().unwrap_or("").to_string(),
            finish_reason: candidate["finishReason"].as_str().map(str::to_string),
            model: model.to_string(),
        }))
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn call(&self, system: &str, user: &str) -> Result<ProviderReply> {
        let attempts = self.rotation.lock().models.len();
        for _ in 0..attempts {
            let Some(model) = self.rotation.lock().current(Instant::now()) else {
                break;
            };
            debug!(%model, "calling gemini");
            if let Some(reply) = self.call_model(&model, system, user).await? {
                return Ok(reply);
            }
        }
        warn!("every gemini model is exhausted");
        Err(GenerationError::AllProvidersExhausted)
    }

    fn exhausted_models(&self) -> Vec<String> {
        self.rotation.lock().exhausted(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotation() -> ModelRotation {
        ModelRotation::new(vec!["a".into(), "b".into(), "c".into()])
    }

    #[test]
    fn rotation_starts_at_first_model() {
        let mut r = rotation();
        assert_eq!(r.current(Instant::now()).as_deref(), Some("a"));
    }

    #[test]
    fn exhausted_model_is_skipped_until_expiry() {
        let now = Instant::now();
        let mut r = rotation();
        r.exhaust("a", now + Duration::from_secs(3_600));
        assert_eq!(r.current(now).as_deref(), Some("b"));
        assert_eq!(r.exhausted(now), vec!["a".to_string()]);
        r.index = 0;
        assert_eq!(r.current(now + Duration::from_secs(3_601)).as_deref(), Some("a"));
    }

    #[test]
    fn all_exhausted_yields_nothing() {
        let now = Instant::now();
        let mut r = rotation();
        for m in ["a", "b", "c"] {
            r.exhaust(m, now + Duration::from_secs(60));
        }
        assert_eq!(r.current(now), None);
        assert_eq!(r.exhausted(now).len(), 3);
    }

    #[test]
    fn rotation_wraps_around() {
        let now = Instant::now();
        let mut r = rotation();
        r.exhaust("c", now + Duration::from_secs(60));
        assert_eq!(r.index, 0);
        r.exhaust("b", now + Duration::from_secs(60));
        assert_eq!(r.current(now).as_deref(), Some("a"));
    }

    #[test]
    fn missing_keys_disable_providers() {
        let mut config = LlmConfig::default();
        for p in &mut config.providers {
            p.api_key_env = "SUNNY_TEST_KEY_THAT_IS_NEVER_SET".into();
        }
        assert!(from_config(&config).is_empty());
    }
}
