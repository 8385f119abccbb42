//! Upstream transport
//!
//! A [`Transport`] performs the two network calls of the submit/poll protocol
//! and hands back the decoded 2xx body. Interpreting those bodies is the
//! client's job.

use async_trait::async_trait;
use dql_core::{ExecutionError, QueryRequest, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const EXECUTE_PATH: &str = "/api/v2/query:execute";
const POLL_PATH: &str = "/api/v2/query:poll";

#[async_trait]
pub trait Transport: Send + Sync {
    /// Start executing a query.
    async fn submit(&self, request: &QueryRequest) -> Result<Value>;

    /// Fetch the current state of a submitted query.
    async fn poll(&self, token: &str) -> Result<Value>;
}

/// Grail query API over HTTP.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// `timeout` bounds each individual HTTP call.
    pub fn new(base_url: &str, api_token: &str, timeout: Duration) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Api-Token {}", api_token))
            .map_err(|e| ExecutionError::Transport(format!("invalid API token: {}", e)))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ExecutionError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn submit(&self, request: &QueryRequest) -> Result<Value> {
        let url = format!("{}{}", self.base_url, EXECUTE_PATH);
        debug!("POST {}", url);

        let body = json!({
            "query": request.query(),
            "from": request.range_start(),
            "to": request.range_end(),
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        decode(response).await
    }

    async fn poll(&self, token: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, POLL_PATH);

        let response = self
            .client
            .get(&url)
            .query(&[("jobId", token)])
            .send()
            .await
            .map_err(transport_error)?;

        decode(response).await
    }
}

fn transport_error(err: reqwest::Error) -> ExecutionError {
    ExecutionError::Transport(err.to_string())
}

async fn decode(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ExecutionError::from_status(status.as_u16(), body));
    }

    let bytes = response.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ExecutionError::MalformedResponse(format!("invalid JSON body: {}", e)))
}
