//! HTTP server setup and routing.

use crate::auth::check_bearer;
use crate::config::Config;
use crate::error::ApiError;
use crate::metrics::Metrics;
use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use dql_cache::{build_key, CacheConfig, TtlCache};
use dql_core::{QueryRequest, RequestError};
use dql_executor::{CachedQueryExecutor, QueryClient};
use dql_shape::{to_table, to_timeseries, TableResponse, TimeseriesParams, TimeseriesResponse};
use prometheus::TEXT_FORMAT;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_FROM: &str = "now()-1h";
const DEFAULT_TO: &str = "now()";
const DEFAULT_TIME_COLUMN: &str = "timestamp";

/// Shared by every request handler
pub struct AppState {
    executor: Option<CachedQueryExecutor>,
    dt_url_set: bool,
    org_bearer: Option<String>,
    metrics: Metrics,
}

impl AppState {
    pub fn new(executor: Option<CachedQueryExecutor>, org_bearer: Option<String>) -> Result<Self> {
        Ok(Self {
            dt_url_set: executor.is_some(),
            executor,
            org_bearer,
            metrics: Metrics::new()?,
        })
    }

    /// Build the client and cache described by `config`.
    ///
    /// Missing upstream settings are not fatal: the proxy still answers
    /// health checks and reports the problem on query endpoints.
    pub fn from_config(config: &Config) -> Result<Self> {
        let executor = match config.client_config() {
            Some(client_config) => {
                let client = QueryClient::from_config(&client_config)?;
                let cache = TtlCache::new(CacheConfig::default().with_ttl(config.cache_ttl()));
                Some(CachedQueryExecutor::new(Arc::new(client), Arc::new(cache)))
            }
            None => {
                if config.dt_url.is_none() {
                    warn!("DT_URL not set");
                }
                if config.dt_token.is_none() {
                    warn!("DT_TOKEN not set");
                }
                None
            }
        };

        let mut state = Self::new(executor, config.org_bearer.clone())?;
        state.dt_url_set = config.dt_url.is_some();
        Ok(state)
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        check_bearer(headers, self.org_bearer.as_deref())
    }

    fn executor(&self) -> Result<&CachedQueryExecutor, ApiError> {
        self.executor.as_ref().ok_or(ApiError::NotConfigured)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/query", post(raw_query))
        .route("/table", get(table))
        .route("/timeseries", get(timeseries))
        .with_state(state)
}

/// Serve until ctrl-c.
pub async fn run(state: Arc<AppState>, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("DQL proxy listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}

fn required(value: Option<String>, name: &'static str) -> Result<String, RequestError> {
    value.ok_or(RequestError::MissingParameter(name))
}

fn ttl_or_default(ttl: Option<u64>, executor: &CachedQueryExecutor) -> Duration {
    ttl.map(Duration::from_secs)
        .unwrap_or_else(|| executor.default_ttl())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "dt_url_set": state.dt_url_set,
        "org_bearer_set": state.org_bearer.is_some(),
    }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let cache = state.executor.as_ref().map(|e| &**e.cache());
    let body = state.metrics.render(cache)?;
    Ok(([(header::CONTENT_TYPE, TEXT_FORMAT)], body))
}

#[derive(Debug, Deserialize)]
struct RawQueryBody {
    dql: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

/// Debug endpoint: the upstream payload verbatim, never cached.
async fn raw_query(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<RawQueryBody>,
) -> Result<Json<Value>, ApiError> {
    state.authorize(&headers)?;
    state.metrics.record_request();

    let request = QueryRequest::new(
        body.dql.unwrap_or_default(),
        body.from.unwrap_or_else(|| DEFAULT_FROM.to_string()),
        body.to.unwrap_or_else(|| DEFAULT_TO.to_string()),
    )?;

    let result = state.executor()?.execute_uncached(&request).await?;
    Ok(Json(result.payload().clone()))
}

#[derive(Debug, Deserialize)]
struct TableQuery {
    dql: Option<String>,
    from: Option<String>,
    to: Option<String>,
    ttl: Option<u64>,
}

async fn table(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<TableQuery>,
) -> Result<Json<TableResponse>, ApiError> {
    state.authorize(&headers)?;
    state.metrics.record_request();

    let request = QueryRequest::new(
        required(params.dql, "dql")?,
        required(params.from, "from")?,
        required(params.to, "to")?,
    )?;
    let executor = state.executor()?;
    let key = build_key("table", &request, &[]);

    let result = executor
        .execute_cached(&key, ttl_or_default(params.ttl, executor), &request)
        .await?;
    Ok(Json(to_table(&result)))
}

#[derive(Debug, Deserialize)]
struct TimeseriesQuery {
    dql: Option<String>,
    from: Option<String>,
    to: Option<String>,
    value: Option<String>,
    timecol: Option<String>,
    label: Option<String>,
    ttl: Option<u64>,
}

async fn timeseries(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<TimeseriesQuery>,
) -> Result<Json<TimeseriesResponse>, ApiError> {
    state.authorize(&headers)?;
    state.metrics.record_request();

    let request = QueryRequest::new(
        required(params.dql, "dql")?,
        required(params.from, "from")?,
        required(params.to, "to")?,
    )?;
    let shape = TimeseriesParams {
        time_column: params
            .timecol
            .unwrap_or_else(|| DEFAULT_TIME_COLUMN.to_string()),
        value_column: required(params.value, "value")?,
        // Grafana sends `label=` for an unset template variable.
        label_column: params.label.filter(|label| !label.is_empty()),
    };
    let executor = state.executor()?;
    let key = build_key(
        "timeseries",
        &request,
        &[
            Some(shape.value_column.as_str()),
            Some(shape.time_column.as_str()),
            shape.label_column.as_deref(),
        ],
    );

    let result = executor
        .execute_cached(&key, ttl_or_default(params.ttl, executor), &request)
        .await?;
    Ok(Json(to_timeseries(&result, &shape)))
}
