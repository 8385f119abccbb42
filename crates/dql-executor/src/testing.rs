//! Scripted in-memory transport for unit tests

use crate::transport::Transport;
use async_trait::async_trait;
use dql_core::{ExecutionError, QueryRequest, Result};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Replays a fixed submit response on every submit and a queue of poll responses.
///
/// Once the poll queue is drained every further poll reports `RUNNING`.
/// Optional delays hold each call on the tokio timer before it answers.
pub struct ScriptedTransport {
    submit: Result<Value>,
    polls: Mutex<VecDeque<Result<Value>>>,
    submit_delay: Duration,
    poll_delay: Duration,
    submit_calls: AtomicUsize,
    poll_calls: AtomicUsize,
    tokens: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(submit: Result<Value>, polls: Vec<Result<Value>>) -> Self {
        Self {
            submit,
            polls: Mutex::new(polls.into()),
            submit_delay: Duration::ZERO,
            poll_delay: Duration::ZERO,
            submit_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn job(token: &str, polls: Vec<Result<Value>>) -> Self {
        Self::new(Ok(json!({ "jobId": token })), polls)
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    pub fn polled_tokens(&self) -> Vec<String> {
        self.tokens.lock().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn submit(&self, _request: &QueryRequest) -> Result<Value> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }
        self.submit.clone()
    }

    async fn poll(&self, token: &str) -> Result<Value> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        self.tokens.lock().push(token.to_string());
        if !self.poll_delay.is_zero() {
            tokio::time::sleep(self.poll_delay).await;
        }
        self.polls
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(running()))
    }
}

pub fn running() -> Value {
    json!({ "status": "RUNNING" })
}

pub fn succeeded(records: Value) -> Value {
    json!({ "status": "SUCCEEDED", "result": { "records": records } })
}

pub fn failed(message: &str) -> Value {
    json!({ "status": "FAILED", "error": { "message": message } })
}

pub fn unauthorized() -> ExecutionError {
    ExecutionError::from_status(401, "invalid token")
}
