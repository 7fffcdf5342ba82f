//! HTTP API over a single shared connection
//!
//! Provides REST endpoints for:
//! - Statement execution (`/query`, `/batch`)
//! - Explicit transactions (`/transaction/*`)
//! - Health and Prometheus metrics

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use flashdb::{Connection, ErrorKind, QueryOutput, Value, ValueError};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::error;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    conn: Arc<Mutex<Connection>>,
    metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(conn: Connection, metrics: Arc<Metrics>) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            metrics,
        }
    }

    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }
}

#[derive(Deserialize)]
struct QueryRequest {
    sql: String,
    #[serde(default)]
    params: Vec<serde_json::Value>,
    #[serde(default)]
    structured: bool,
}

#[derive(Deserialize)]
struct BatchRequest {
    sql: String,
    #[serde(default)]
    disable_foreign_keys: bool,
}

#[derive(Serialize)]
struct BatchResponse {
    affected: u64,
}

#[derive(Serialize)]
struct TransactionResponse {
    state: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    engine: &'static str,
    transaction: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Vec<Value>>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorResponse {
                error: "internal",
                message: message.into(),
                query: None,
                params: None,
            },
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Syntax | ErrorKind::ParameterMismatch => StatusCode::BAD_REQUEST,
        ErrorKind::TransactionAlreadyActive | ErrorKind::NoActiveTransaction => StatusCode::CONFLICT,
        ErrorKind::HandleAlreadyReleased => StatusCode::GONE,
        ErrorKind::QueryExecution => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::DependencyUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::ConnectionFailed => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<flashdb::Error> for ApiError {
    fn from(e: flashdb::Error) -> Self {
        let kind = e.kind();
        let (query, params) = match e.query_failure() {
            Some(failed) => (Some(failed.query.clone()), Some(failed.parameters.clone())),
            None => (None, None),
        };
        Self {
            status: status_for(kind),
            body: ErrorResponse {
                error: kind.as_str(),
                message: e.to_string(),
                query,
                params,
            },
        }
    }
}

impl From<ValueError> for ApiError {
    fn from(e: ValueError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                error: "invalid_parameter",
                message: e.to_string(),
                query: None,
                params: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(error = %self.body.message, "request failed");
        }
        (self.status, Json(self.body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/query", post(execute_query))
        .route("/batch", post(execute_batch))
        .route("/transaction/begin", post(begin_transaction))
        .route("/transaction/commit", post(commit_transaction))
        .route("/transaction/rollback", post(rollback_transaction))
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        .with_state(state)
}

/// Run `f` on the shared connection off the async runtime; engines block
async fn with_connection<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&mut Connection) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let conn = state.connection();
    tokio::task::spawn_blocking(move || {
        let mut conn = conn.blocking_lock();
        f(&mut conn)
    })
    .await
    .map_err(|e| ApiError::internal(format!("connection task failed: {}", e)))?
}

async fn execute_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryOutput>, ApiError> {
    let params = req
        .params
        .into_iter()
        .map(Value::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let output = with_connection(&state, move |conn| {
        Ok(conn.execute(&req.sql, &params, req.structured)?)
    })
    .await?;
    Ok(Json(output))
}

async fn execute_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    let affected = with_connection(&state, move |conn| {
        let affected = if req.disable_foreign_keys {
            conn.with_foreign_keys_disabled(|conn| conn.execute_batch(&req.sql))?
        } else {
            conn.execute_batch(&req.sql)?
        };
        Ok(affected)
    })
    .await?;
    Ok(Json(BatchResponse { affected }))
}

async fn begin_transaction(State(state): State<AppState>) -> Result<Json<TransactionResponse>, ApiError> {
    transaction_step(&state, Connection::begin_transaction).await
}

async fn commit_transaction(State(state): State<AppState>) -> Result<Json<TransactionResponse>, ApiError> {
    transaction_step(&state, Connection::commit_transaction).await
}

async fn rollback_transaction(State(state): State<AppState>) -> Result<Json<TransactionResponse>, ApiError> {
    transaction_step(&state, Connection::rollback_transaction).await
}

async fn transaction_step(
    state: &AppState,
    step: fn(&mut Connection) -> flashdb::Result<()>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let state_name = with_connection(state, move |conn| {
        step(conn)?;
        Ok(conn.transaction_state().as_str())
    })
    .await?;
    Ok(Json(TransactionResponse { state: state_name }))
}

async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let health = with_connection(&state, |conn| {
        Ok(HealthResponse {
            status: if conn.is_released() { "released" } else { "ok" },
            engine: conn.engine_name(),
            transaction: conn.transaction_state().as_str(),
        })
    })
    .await?;
    Ok(Json(health))
}

async fn render_metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response())
}
