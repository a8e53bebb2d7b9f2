//! Generation error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while generating dialogue.
///
/// Provider-level variants cause fallthrough to the next provider. The
/// pipeline never hands them to callers; they end up in the stats as the
/// last error.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// The provider asked us to back off.
    #[error("Rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited {
        /// How long the provider wants us to wait.
        retry_after: Duration,
    },

    /// Non-success HTTP status.
    #[error("Provider returned HTTP {status}: {body}")]
    ProviderHttp {
        /// Status code.
        status: u16,
        /// Start of the response body.
        body: String,
    },

    /// Transport failure: DNS, connect, timeout, TLS.
    #[error("Network error: {0}")]
    Network(String),

    /// Every model or provider was tried and none is usable right now.
    #[error("All providers exhausted")]
    AllProvidersExhausted,

    /// The provider answered with no text.
    #[error("Empty response")]
    EmptyResponse,

    /// The text could not be repaired into the expected shape.
    #[error("Unparsable output: {0}")]
    UnparsableOutput(String),

    /// No provider has credentials.
    #[error("No provider configured")]
    NoProviderConfigured,

    /// A rate limit is active for longer than callers are willing to wait.
    #[error("Generation unavailable for {}s", remaining.as_secs())]
    Unavailable {
        /// Time left on the active limit.
        remaining: Duration,
    },

    /// Configuration error.
    #[error("LLM configuration error: {0}")]
    Config(String),
}

impl GenerationError {
    /// Short machine-readable label for stats and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limit",
            Self::ProviderHttp { .. } => "http_error",
            Self::Network(_) => "network_error",
            Self::AllProvidersExhausted => "exhausted",
            Self::EmptyResponse => "empty",
            Self::UnparsableOutput(_) => "json_fail",
            Self::NoProviderConfigured => "no_provider",
            Self::Unavailable { .. } => "unavailable",
            Self::Config(_) => "config",
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, GenerationError>;
