//! The generation pipeline: one spaced queue in front of every provider.
//!
//! Callers on any task submit requests through a cloneable
//! [`GenerationPipeline`] handle. A single worker drains the queue in FIFO
//! order so provider calls are never concurrent and always at least
//! `request_spacing_ms` apart. A process-wide "rate limited until" instant
//! is checked twice: before a request is queued and again right before it
//! is sent. Short limits are waited out; long ones resolve the request to
//! `None` immediately.
//!
//! All failure modes collapse into `None` for the caller, who substitutes
//! [`GenerationPipeline::fallback`] lines. The typed cause is kept in
//! [`PipelineStats::last_error`].

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::addressing::{Addressing, AddressingDetector};
use crate::config::LlmConfig;
use crate::error::{GenerationError, Result};
use crate::fallback::ContextualFallback;
use crate::provider::Provider;
use crate::repair::JsonRepairer;
use crate::types::{AiStatus, DialogueTurn, ParsedReply, ProviderReply, truncate};

/// Prompt excerpt kept for the last request.
const REQUEST_EXCERPT_CHARS: usize = 150;
/// Raw text kept for the last response.
const RESPONSE_EXCERPT_CHARS: usize = 500;
/// Raw text quoted in an unparsable-output error.
const UNPARSABLE_EXCERPT_CHARS: usize = 80;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// What shape of answer a request expects.
#[derive(Debug, Clone)]
enum Expect {
    /// `{"Agent": "text" | null}`; `spoken_to` answer first.
    Lines { spoken_to: Vec<String> },
    /// `[{"npc", "msg"}]` with at least two turns.
    Turns,
}

#[derive(Debug)]
struct Job {
    system: String,
    user: String,
    expect: Expect,
    reply: oneshot::Sender<Option<ParsedReply>>,
}

// ---------------------------------------------------------------------------
// Introspection
// ---------------------------------------------------------------------------

/// The most recent request sent to a provider.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    /// Sequence number.
    pub number: u64,
    /// Start of the user message.
    pub prompt: String,
}

/// The most recent raw provider answer.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseRecord {
    /// Sequence number of the request.
    pub number: u64,
    /// Start of the raw text.
    pub raw: String,
    /// Finish reason as reported.
    pub finish_reason: Option<String>,
    /// Round-trip time.
    pub elapsed_ms: u64,
    /// Provider that answered.
    pub provider: String,
    /// Model that answered.
    pub model: String,
}

/// The most recent failure.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Machine-readable kind, see [`GenerationError::kind`].
    pub kind: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl From<&GenerationError> for ErrorRecord {
    fn from(err: &GenerationError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Point-in-time pipeline counters.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    /// Requests that reached the providers.
    pub requests: u64,
    /// Requests that produced usable replies.
    pub successes: u64,
    /// Requests that produced nothing.
    pub failures: u64,
    /// Replies that needed the repair ladder.
    pub repairs: u64,
    /// Times canned lines were handed out.
    pub fallbacks: u64,
    /// `successes / requests` as a percentage, `None` before any request.
    pub success_rate: Option<f64>,
    /// Mean latency over the rolling window.
    pub avg_response_ms: u64,
    /// Requests waiting for the worker.
    pub queue_len: usize,
    /// Whether a provider limit is active.
    pub rate_limited: bool,
    /// Whole seconds left on the limit, rounded up.
    pub rate_limit_remaining_secs: u64,
    /// Provider of the last success.
    pub provider: Option<String>,
    /// Model of the last success.
    pub model: Option<String>,
    /// Last request sent.
    pub last_request: Option<RequestRecord>,
    /// Last raw answer.
    pub last_response: Option<ResponseRecord>,
    /// Last failure.
    pub last_error: Option<ErrorRecord>,
    /// Models benched after reporting exhaustion.
    pub exhausted_models: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Generated,
    Fallback,
}

#[derive(Debug, Default)]
struct State {
    rate_limited_until: Option<Instant>,
    last_call: Option<Instant>,
    queue_len: usize,
    requests: u64,
    successes: u64,
    failures: u64,
    repairs: u64,
    fallbacks: u64,
    latencies: VecDeque<Duration>,
    provider: Option<String>,
    model: Option<String>,
    last_request: Option<RequestRecord>,
    last_response: Option<ResponseRecord>,
    last_error: Option<ErrorRecord>,
    last_outcome: Option<Outcome>,
}

impl State {
    fn rate_limit_remaining(&self, now: Instant) -> Duration {
        self.rate_limited_until
            .map_or(Duration::ZERO, |until| until.saturating_duration_since(now))
    }

    fn fail(&mut self, err: &GenerationError) {
        self.failures += 1;
        self.last_error = Some(ErrorRecord::from(err));
    }
}

#[derive(Debug)]
struct Inner {
    config: LlmConfig,
    providers: Vec<Arc<dyn Provider>>,
    roster: Vec<String>,
    repairer: JsonRepairer,
    detector: AddressingDetector,
    fallback: ContextualFallback,
    state: Mutex<State>,
}

impl Inner {
    /// Sit out a short rate limit, or refuse if it is too long.
    async fn wait_out_rate_limit(&self) -> Result<()> {
        let remaining = self.state.lock().rate_limit_remaining(Instant::now());
        if remaining.is_zero() {
            return Ok(());
        }
        if remaining > self.config.max_wait() {
            return Err(GenerationError::Unavailable { remaining });
        }
        debug!(wait_ms = remaining.as_millis(), "waiting out rate limit");
        sleep(remaining + self.config.padding()).await;
        Ok(())
    }

    /// Keep consecutive provider calls at least `spacing` apart.
    async fn keep_spacing(&self) {
        let last = self.state.lock().last_call;
        if let Some(last) = last {
            let elapsed = last.elapsed();
            let spacing = self.config.spacing();
            if elapsed < spacing {
                sleep(spacing - elapsed).await;
            }
        }
        self.state.lock().last_call = Some(Instant::now());
    }

    /// First provider that answers wins.
    async fn call_providers(&self, system: &str, user: &str) -> Result<(String, ProviderReply)> {
        if self.providers.is_empty() {
            return Err(GenerationError::NoProviderConfigured);
        }
        let mut last_err = GenerationError::AllProvidersExhausted;
        for provider in &self.providers {
            match provider.call(system, user).await {
                Ok(reply) => return Ok((provider.name().to_string(), reply)),
                Err(err) => {
                    if let GenerationError::RateLimited { retry_after } = &err {
                        let until = Instant::now() + *retry_after;
                        let mut state = self.state.lock();
                        if state.rate_limited_until.is_none_or(|current| current < until) {
                            state.rate_limited_until = Some(until);
                        }
                    }
                    warn!(provider = provider.name(), error = %err, "provider failed, trying next");
                    last_err = err;
                }
            }
        }
        Err(last_err)
    }

    async fn execute(&self, job: &Job) -> Option<ParsedReply> {
        let number = {
            let mut state = self.state.lock();
            state.requests += 1;
            state.last_request = Some(RequestRecord {
                number: state.requests,
                prompt: truncate(&job.user, REQUEST_EXCERPT_CHARS),
            });
            state.requests
        };

        let started = Instant::now();
        let (provider, reply) = match self.call_providers(&job.system, &job.user).await {
            Ok(answer) => answer,
            Err(err) => {
                warn!(number, error = %err, "generation failed");
                self.state.lock().fail(&err);
                return None;
            }
        };
        let elapsed = started.elapsed();
        self.record_response(number, &provider, &reply, elapsed);

        match self.interpret(&reply.text, &job.expect) {
            Ok((parsed, repaired)) => {
                let mut state = self.state.lock();
                state.successes += 1;
                if repaired {
                    state.repairs += 1;
                }
                state.provider = Some(provider.clone());
                state.model = Some(reply.model.clone());
                state.last_outcome = Some(Outcome::Generated);
                info!(number, %provider, model = %reply.model, repaired, ms = elapsed.as_millis(), "generation succeeded");
                Some(parsed)
            }
            Err(err) => {
                warn!(number, error = %err, "unusable reply");
                self.state.lock().fail(&err);
                None
            }
        }
    }

    fn record_response(&self, number: u64, provider: &str, reply: &ProviderReply, elapsed: Duration) {
        let mut state = self.state.lock();
        state.latencies.push_back(elapsed);
        while state.latencies.len() > self.config.latency_window.max(1) {
            state.latencies.pop_front();
        }
        state.last_response = Some(ResponseRecord {
            number,
            raw: truncate(&reply.text, RESPONSE_EXCERPT_CHARS),
            finish_reason: reply.finish_reason.clone(),
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            provider: provider.to_string(),
            model: reply.model.clone(),
        });
    }

    /// Repair and validate raw text. Returns the reply and whether repair
    /// was needed.
    fn interpret(&self, raw: &str, expect: &Expect) -> Result<(ParsedReply, bool)> {
        if raw.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        let unparsable = || GenerationError::UnparsableOutput(truncate(raw, UNPARSABLE_EXCERPT_CHARS));
        let max_chars = self.config.max_reply_chars;
        match expect {
            Expect::Lines { spoken_to } => {
                let repaired = self.repairer.repair_object(raw).ok_or_else(unparsable)?;
                let order = self.answer_order(spoken_to);
                let lines: BTreeMap<String, Option<String>> = ParsedReply::ByAgent(repaired.value)
                    .into_lines(&order, max_chars)
                    .into_iter()
                    .map(|(agent, text)| (agent, Some(text)))
                    .collect();
                if lines.is_empty() {
                    return Err(GenerationError::EmptyResponse);
                }
                Ok((ParsedReply::ByAgent(lines), repaired.repaired))
            }
            Expect::Turns => {
                let repaired = self.repairer.repair_turns(raw, max_chars).ok_or_else(unparsable)?;
                Ok((ParsedReply::Turns(repaired.value), repaired.repaired))
            }
        }
    }

    /// Roster with the spoken-to agents moved to the front.
    fn answer_order(&self, spoken_to: &[String]) -> Vec<String> {
        let (mut first, rest): (Vec<String>, Vec<String>) =
            self.roster.iter().cloned().partition(|name| spoken_to.contains(name));
        first.extend(rest);
        first
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable handle to the generation queue. Clones share one worker and
/// one set of counters.
#[derive(Debug, Clone)]
pub struct GenerationPipeline {
    inner: Arc<Inner>,
    jobs: mpsc::UnboundedSender<Job>,
}

impl GenerationPipeline {
    /// Build the pipeline and spawn its worker on the current tokio runtime.
    ///
    /// An empty `providers` list is valid: every request then fails fast
    /// and callers fall back to canned lines.
    ///
    /// # Errors
    /// Returns [`GenerationError::Config`] if called outside a tokio
    /// runtime or if the roster patterns fail to compile.
    pub fn spawn<S: AsRef<str>>(
        config: LlmConfig,
        providers: Vec<Arc<dyn Provider>>,
        fallback: ContextualFallback,
        roster: &[S],
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| GenerationError::Config(format!("pipeline needs a tokio runtime: {e}")))?;
        let inner = Arc::new(Inner {
            config,
            providers,
            roster: roster.iter().map(|n| n.as_ref().to_string()).collect(),
            repairer: JsonRepairer::new(roster)?,
            detector: AddressingDetector::new(roster)?,
            fallback,
            state: Mutex::new(State::default()),
        });
        let (jobs, queue) = mpsc::unbounded_channel();
        runtime.spawn(run_worker(Arc::clone(&inner), queue));
        info!(providers = inner.providers.len(), "generation pipeline started");
        Ok(Self { inner, jobs })
    }

    /// Pipeline settings.
    #[must_use]
    pub fn config(&self) -> &LlmConfig {
        &self.inner.config
    }

    /// Whether any provider is configured.
    #[must_use]
    pub fn has_providers(&self) -> bool {
        !self.inner.providers.is_empty()
    }

    /// Classify who a player message talks to.
    #[must_use]
    pub fn detect_addressing(&self, message: &str) -> Addressing {
        self.inner.detector.detect(message)
    }

    /// Replies to a player, one line per answering agent.
    ///
    /// `spoken_to` agents come first; the rest follow in roster order.
    /// `None` means the caller should use [`Self::fallback`].
    pub async fn player_replies(&self, system: String, user: String, spoken_to: &[String]) -> Option<Vec<(String, String)>> {
        let expect = Expect::Lines {
            spoken_to: spoken_to.to_vec(),
        };
        let reply = self.submit(system, user, expect).await?;
        let order = self.inner.answer_order(spoken_to);
        Some(reply.into_lines(&order, self.inner.config.max_reply_chars))
    }

    /// An exchange between agents, at least two turns long.
    pub async fn conversation(&self, system: String, user: String) -> Option<Vec<DialogueTurn>> {
        let reply = self.submit(system, user, Expect::Turns).await?;
        Some(reply.into_turns(&self.inner.roster, self.inner.config.max_reply_chars))
    }

    /// Canned lines for when generation came back empty. Always non-empty.
    pub fn fallback<R: Rng + ?Sized>(
        &self,
        activities: &BTreeMap<String, String>,
        addressed: &[String],
        rng: &mut R,
    ) -> Vec<(String, String)> {
        let lines = self.inner.fallback.respond(activities, addressed, rng);
        let mut state = self.inner.state.lock();
        state.fallbacks += 1;
        state.last_outcome = Some(Outcome::Fallback);
        debug!(agents = lines.len(), "served fallback lines");
        lines
    }

    /// Whether a provider limit is active.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        !self.rate_limit_remaining().is_zero()
    }

    /// Time left on the active limit.
    #[must_use]
    pub fn rate_limit_remaining(&self) -> Duration {
        self.inner.state.lock().rate_limit_remaining(Instant::now())
    }

    /// Aggregate health for status indicators.
    #[must_use]
    pub fn status(&self) -> AiStatus {
        if !self.has_providers() {
            return AiStatus::Error {
                message: GenerationError::NoProviderConfigured.to_string(),
            };
        }
        let remaining = self.rate_limit_remaining();
        if !remaining.is_zero() {
            return AiStatus::RateLimited {
                remaining_secs: ceil_secs(remaining),
            };
        }
        match self.inner.state.lock().last_outcome {
            Some(Outcome::Fallback) => AiStatus::Fallback,
            _ => AiStatus::Ok,
        }
    }

    /// Snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        let exhausted_models = self
            .inner
            .providers
            .iter()
            .flat_map(|p| p.exhausted_models())
            .collect();
        let state = self.inner.state.lock();
        let remaining = state.rate_limit_remaining(Instant::now());
        let avg_response_ms = if state.latencies.is_empty() {
            0
        } else {
            let total: Duration = state.latencies.iter().sum();
            let count = u32::try_from(state.latencies.len()).unwrap_or(u32::MAX);
            u64::try_from((total / count).as_millis()).unwrap_or(u64::MAX)
        };
        #[allow(clippy::cast_precision_loss)]
        let success_rate = (state.requests > 0).then(|| (state.successes as f64 / state.requests as f64 * 100.0).round());
        PipelineStats {
            requests: state.requests,
            successes: state.successes,
            failures: state.failures,
            repairs: state.repairs,
            fallbacks: state.fallbacks,
            success_rate,
            avg_response_ms,
            queue_len: state.queue_len,
            rate_limited: !remaining.is_zero(),
            rate_limit_remaining_secs: ceil_secs(remaining),
            provider: state.provider.clone(),
            model: state.model.clone(),
            last_request: state.last_request.clone(),
            last_response: state.last_response.clone(),
            last_error: state.last_error.clone(),
            exhausted_models,
        }
    }

    async fn submit(&self, system: String, user: String, expect: Expect) -> Option<ParsedReply> {
        if let Err(err) = self.inner.wait_out_rate_limit().await {
            debug!(error = %err, "request refused before queueing");
            self.inner.state.lock().last_error = Some(ErrorRecord::from(&err));
            return None;
        }
        let (reply, answer) = oneshot::channel();
        self.inner.state.lock().queue_len += 1;
        let job = Job {
            system,
            user,
            expect,
            reply,
        };
        if self.jobs.send(job).is_err() {
            warn!("generation worker has stopped");
            self.inner.state.lock().queue_len -= 1;
            return None;
        }
        answer.await.ok().flatten()
    }
}

/// Drain the queue one job at a time until every handle is dropped.
async fn run_worker(inner: Arc<Inner>, mut queue: mpsc::UnboundedReceiver<Job>) {
    while let Some(job) = queue.recv().await {
        {
            let mut state = inner.state.lock();
            state.queue_len = state.queue_len.saturating_sub(1);
        }
        if let Err(err) = inner.wait_out_rate_limit().await {
            debug!(error = %err, "dropping queued request");
            inner.state.lock().last_error = Some(ErrorRecord::from(&err));
            let _ = job.reply.send(None);
            continue;
        }
        inner.keep_spacing().await;
        let result = inner.execute(&job).await;
        // The caller may have given up waiting.
        let _ = job.reply.send(result);
    }
    debug!("generation worker stopped");
}

fn ceil_secs(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis().div_ceil(1_000)).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceil_rounds_up() {
        assert_eq!(ceil_secs(Duration::from_millis(0)), 0);
        assert_eq!(ceil_secs(Duration::from_millis(1)), 1);
        assert_eq!(ceil_secs(Duration::from_millis(10_000)), 10);
        assert_eq!(ceil_secs(Duration::from_millis(10_001)), 11);
    }

    #[test]
    fn state_remaining_saturates() {
        let now = Instant::now();
        let state = State {
            rate_limited_until: Some(now),
            ..State::default()
        };
        assert_eq!(state.rate_limit_remaining(now + Duration::from_secs(1)), Duration::ZERO);
    }
}
