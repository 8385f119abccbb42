//! Submit/poll query client
//!
//! One call to [`QueryClient::execute_query`] drives a single execution
//! through these states:
//!
//! ```text
//! Submitted --inline result--> Done
//!     |
//!   jobId
//!     v
//!  Polling --SUCCEEDED--> Done
//!     |  \--FAILED-----> Failed(upstream_error)
//!     |
//!  RUNNING past the timeout --> Failed(timeout)
//! ```
//!
//! Transport, auth and malformed-response errors end the execution from any
//! state. Nothing is retried. The timeout also bounds each network call, so a
//! stalled submit or poll fails as `timeout` once the budget is spent.

use crate::transport::{HttpTransport, Transport};
use dql_core::{
    Clock, ExecutionError, QueryRequest, RawResult, Result, Sleeper, SystemClock, TokioSleeper,
};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Wait between poll attempts: exponential backoff up to a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

impl PollPolicy {
    /// Same wait before every poll.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial_interval: interval,
            max_interval: interval,
            multiplier: 1,
        }
    }

    fn next(&self, current: Duration) -> Duration {
        current
            .saturating_mul(self.multiplier)
            .min(self.max_interval)
    }
}

/// Connection settings for the upstream engine
#[derive(Debug, Clone)]
pub struct QueryClientConfig {
    pub base_url: String,
    pub api_token: String,
    /// Bound on the whole execution, submit included
    pub query_timeout: Duration,
    pub poll: PollPolicy,
}

impl QueryClientConfig {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            query_timeout: Duration::from_secs(30),
            poll: PollPolicy::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }
}

enum SubmitOutcome {
    Job(String),
    Inline(Value),
}

enum PollStatus {
    Running,
    Succeeded(Value),
    Failed(Value),
}

fn classify_submit(body: Value) -> Result<SubmitOutcome> {
    if let Some(token) = body.get("jobId") {
        return token
            .as_str()
            .map(|t| SubmitOutcome::Job(t.to_string()))
            .ok_or_else(|| ExecutionError::MalformedResponse("'jobId' is not a string".into()));
    }
    if body.get("result").map(Value::is_object).unwrap_or(false) {
        return Ok(SubmitOutcome::Inline(body));
    }
    Err(ExecutionError::MalformedResponse(
        "submit response has neither 'jobId' nor 'result'".into(),
    ))
}

fn classify_poll(body: Value) -> Result<PollStatus> {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| ExecutionError::MalformedResponse("poll response has no 'status'".into()))?
        .to_ascii_uppercase();

    match status.as_str() {
        "SUCCEEDED" => Ok(PollStatus::Succeeded(body)),
        "FAILED" => Ok(PollStatus::Failed(body)),
        "RUNNING" | "NOT_STARTED" | "PENDING" | "QUEUED" => Ok(PollStatus::Running),
        other => Err(ExecutionError::MalformedResponse(format!(
            "unknown query status '{}'",
            other
        ))),
    }
}

/// Prefer the engine's error message, fall back to the whole body.
fn failure_detail(body: &Value) -> String {
    body.pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

/// Bookkeeping for one execution; never outlives `execute_query`.
struct QueryExecutionState {
    token: String,
    attempts: u32,
    started: Instant,
}

/// Executes queries against an engine with a submit/poll API.
pub struct QueryClient {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    timeout: Duration,
    poll: PollPolicy,
}

impl QueryClient {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self {
            transport,
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(TokioSleeper),
            timeout,
            poll: PollPolicy::default(),
        }
    }

    /// Client talking HTTP to the configured engine.
    pub fn from_config(config: &QueryClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.base_url, &config.api_token, config.query_timeout)?;
        Ok(Self::new(Arc::new(transport), config.query_timeout).with_poll_policy(config.poll))
    }

    /// Replace the time source and the wait between polls.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>, sleeper: Arc<dyn Sleeper>) -> Self {
        self.clock = clock;
        self.sleeper = sleeper;
        self
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn elapsed_since(&self, started: Instant) -> Duration {
        self.clock.now().saturating_duration_since(started)
    }

    /// Run one upstream call within what is left of the budget.
    async fn within_budget<T>(
        &self,
        started: Instant,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let remaining = self.timeout.saturating_sub(self.elapsed_since(started));
        match tokio::time::timeout(remaining, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ExecutionError::Timeout {
                elapsed: self.elapsed_since(started).max(self.timeout),
            }),
        }
    }

    /// Run one query to completion.
    ///
    /// Dropping the returned future stops polling at the next suspension
    /// point; the engine is not told.
    pub async fn execute_query(&self, request: &QueryRequest) -> Result<RawResult> {
        let started = self.clock.now();

        let submitted = self
            .within_budget(started, self.transport.submit(request))
            .await?;
        let token = match classify_submit(submitted)? {
            SubmitOutcome::Inline(payload) => {
                debug!("Query answered inline");
                return RawResult::from_payload(payload);
            }
            SubmitOutcome::Job(token) => token,
        };
        debug!("Query submitted as job {}", token);

        let mut state = QueryExecutionState {
            token,
            attempts: 0,
            started,
        };
        let mut interval = self.poll.initial_interval;

        loop {
            state.attempts += 1;
            let body = self
                .within_budget(state.started, self.transport.poll(&state.token))
                .await?;

            match classify_poll(body)? {
                PollStatus::Succeeded(payload) => {
                    let result = RawResult::from_payload(payload)?;
                    info!(
                        "Job {} succeeded after {} polls: {} rows",
                        state.token,
                        state.attempts,
                        result.row_count()
                    );
                    return Ok(result);
                }
                PollStatus::Failed(payload) => {
                    return Err(ExecutionError::Upstream {
                        status: None,
                        detail: failure_detail(&payload),
                    });
                }
                PollStatus::Running => {}
            }

            let elapsed = self.elapsed_since(state.started);
            if elapsed >= self.timeout {
                return Err(ExecutionError::Timeout { elapsed });
            }

            let wait = interval.min(self.timeout - elapsed);
            debug!(
                "Job {} still running (attempt {}), next poll in {:?}",
                state.token, state.attempts, wait
            );
            self.sleeper.sleep(wait).await;
            interval = self.poll.next(interval);
        }
    }
}
