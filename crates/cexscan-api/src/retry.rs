//! Retrying HTTP client with per-endpoint cooldowns.
//!
//! Every request is keyed by its endpoint (method plus URL minus query
//! string). Each attempt gets its own timeout; failed attempts back off
//! exponentially with jitter. When all attempts fail the endpoint enters a
//! cooldown that grows with consecutive failures, and calls made during the
//! cooldown fail immediately without touching the network.

use cexscan_telemetry::Metrics;
use parking_lot::Mutex;
use rand::Rng;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::error::{ApiError, ApiResult, TransportError};
use crate::transport::{ApiRequest, DynTransport, RawResponse};

/// Retry and cooldown parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Attempts per call.
    pub max_retries: u32,
    /// Timeout for a single attempt.
    pub request_timeout: Duration,
    /// Backoff base for timeouts, transport and 4xx failures.
    pub base_delay: Duration,
    /// Backoff base after a 5xx response.
    pub server_error_base_delay: Duration,
    /// Upper bound of the uniform jitter added to each backoff.
    pub max_jitter: Duration,
    /// First cooldown after an exhausted call.
    pub cooldown_base: Duration,
    /// Cooldown ceiling.
    pub cooldown_max: Duration,
    /// Cap on the doubling exponent.
    pub cooldown_max_exponent: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            request_timeout: Duration::from_millis(8000),
            base_delay: Duration::from_millis(1000),
            server_error_base_delay: Duration::from_millis(3000),
            max_jitter: Duration::from_millis(1000),
            cooldown_base: Duration::from_millis(10_000),
            cooldown_max: Duration::from_millis(300_000),
            cooldown_max_exponent: 4,
        }
    }
}

/// Consecutive-failure bookkeeping for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointErrorState {
    pub error_count: u32,
    pub cooldown_until: Instant,
}

/// Why an attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum AttemptError {
    Status(u16),
    Transport(TransportError),
}

impl AttemptError {
    fn is_server_error(&self) -> bool {
        matches!(self, AttemptError::Status(code) if *code >= 500)
    }

    fn outcome_label(&self) -> &'static str {
        match self {
            AttemptError::Status(code) if *code >= 500 => "server_error",
            AttemptError::Status(_) => "client_error",
            AttemptError::Transport(TransportError::Timeout(_)) => "timeout",
            AttemptError::Transport(_) => "transport",
        }
    }

    fn describe(&self) -> String {
        match self {
            AttemptError::Status(code) if *code >= 500 => format!("Server error: {code}"),
            AttemptError::Status(code) => format!("HTTP error: {code}"),
            AttemptError::Transport(err) => err.to_string(),
        }
    }
}

/// HTTP client wrapper adding timeouts, retries and endpoint cooldowns.
pub struct RetryingHttpClient {
    transport: DynTransport,
    config: RetryConfig,
    errors: Mutex<HashMap<String, EndpointErrorState>>,
}

impl RetryingHttpClient {
    pub fn new(transport: DynTransport, config: RetryConfig) -> Self {
        Self {
            transport,
            config,
            errors: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Send with the configured number of attempts.
    pub async fn request(&self, request: ApiRequest) -> ApiResult<Value> {
        self.request_with_retries(request, self.config.max_retries)
            .await
    }

    /// Send with up to `max_retries` attempts.
    ///
    /// Returns the body of the first 2xx response. Fails with
    /// `ApiError::CoolingDown` without any attempt while the endpoint is
    /// cooling down, and with `ApiError::Exhausted` once every attempt failed.
    pub async fn request_with_retries(
        &self,
        request: ApiRequest,
        max_retries: u32,
    ) -> ApiResult<Value> {
        let endpoint = request.endpoint();

        if let Some(retry_in) = self.cooldown_remaining(&endpoint) {
            warn!(
                endpoint = %endpoint,
                retry_in_ms = retry_in.as_millis() as u64,
                "Skipping request, endpoint cooling down"
            );
            Metrics::endpoint_short_circuit(&endpoint);
            return Err(ApiError::CoolingDown { endpoint, retry_in });
        }

        let attempts = max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                debug!(endpoint = %endpoint, attempt, max_retries = attempts, "Retrying request");
            }

            let started = Instant::now();
            let result = self.attempt(request.clone()).await;
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

            match result {
                Ok(response) => {
                    Metrics::http_attempt(&endpoint, "ok", elapsed_ms);
                    self.reset_endpoint(&endpoint);
                    return Ok(response.body);
                }
                Err(err) => {
                    Metrics::http_attempt(&endpoint, err.outcome_label(), elapsed_ms);
                    if attempt + 1 < attempts {
                        let delay = self.retry_delay(attempt, err.is_server_error());
                        warn!(
                            endpoint = %endpoint,
                            attempt,
                            error = %err.describe(),
                            delay_ms = delay.as_millis() as u64,
                            "Request attempt failed, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(err);
                }
            }
        }

        let cooldown = self.register_failure(&endpoint);
        let last_error = last_error
            .map(|e| e.describe())
            .unwrap_or_else(|| "Unknown error".to_string());
        error!(
            endpoint = %endpoint,
            attempts,
            error = %last_error,
            cooldown_ms = cooldown.as_millis() as u64,
            "Request failed, endpoint cooling down"
        );
        Err(ApiError::Exhausted {
            endpoint,
            attempts,
            last_error,
        })
    }

    async fn attempt(&self, request: ApiRequest) -> Result<RawResponse, AttemptError> {
        let timeout = self.config.request_timeout;
        match tokio::time::timeout(timeout, self.transport.execute(request)).await {
            Err(_) => Err(AttemptError::Transport(TransportError::Timeout(timeout))),
            Ok(Err(err)) => Err(AttemptError::Transport(err)),
            Ok(Ok(response)) if response.is_success() => Ok(response),
            Ok(Ok(response)) => Err(AttemptError::Status(response.status)),
        }
    }

    /// Backoff before the retry following 0-based `attempt`:
    /// `base * 2^attempt + jitter`.
    pub fn retry_delay(&self, attempt: u32, server_error: bool) -> Duration {
        let base = if server_error {
            self.config.server_error_base_delay
        } else {
            self.config.base_delay
        };
        let exponent = attempt.min(16);
        let delay = base.saturating_mul(1u32 << exponent);
        delay + self.jitter()
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.config.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }

    /// Cooldown after the `error_count`-th consecutive exhausted call:
    /// `min(base * 2^min(error_count - 1, max_exponent), max)`.
    pub fn cooldown_for(&self, error_count: u32) -> Duration {
        let exponent = error_count
            .saturating_sub(1)
            .min(self.config.cooldown_max_exponent)
            .min(16);
        self.config
            .cooldown_base
            .saturating_mul(1u32 << exponent)
            .min(self.config.cooldown_max)
    }

    fn register_failure(&self, endpoint: &str) -> Duration {
        let mut errors = self.errors.lock();
        let error_count = errors.get(endpoint).map_or(0, |s| s.error_count) + 1;
        let cooldown = self.cooldown_for(error_count);
        errors.insert(
            endpoint.to_string(),
            EndpointErrorState {
                error_count,
                cooldown_until: Instant::now() + cooldown,
            },
        );
        Metrics::endpoint_cooldown(endpoint);
        cooldown
    }

    fn reset_endpoint(&self, endpoint: &str) {
        if self.errors.lock().remove(endpoint).is_some() {
            debug!(endpoint = %endpoint, "Endpoint recovered, error state cleared");
        }
    }

    /// Time left on the endpoint's cooldown, if any.
    pub fn cooldown_remaining(&self, endpoint: &str) -> Option<Duration> {
        let errors = self.errors.lock();
        let state = errors.get(endpoint)?;
        let now = Instant::now();
        (now < state.cooldown_until).then(|| state.cooldown_until - now)
    }

    pub fn is_cooling_down(&self, endpoint: &str) -> bool {
        self.cooldown_remaining(endpoint).is_some()
    }

    pub fn error_state(&self, endpoint: &str) -> Option<EndpointErrorState> {
        self.errors.lock().get(endpoint).copied()
    }

    /// Forget every endpoint's error state (connectivity restored).
    pub fn reset_all(&self) {
        let mut errors = self.errors.lock();
        if !errors.is_empty() {
            debug!(endpoints = errors.len(), "Clearing all endpoint error states");
        }
        errors.clear();
    }
}
