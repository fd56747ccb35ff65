//! Browser UI and JSON API over the chat agent.
//!
//! `GET /` serves a single page with a question box, a response field and the
//! current contents of the `trades` table.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::chat::{ChatAgent, ChatTurn, TurnError};
use crate::monitoring::metrics::{MetricsSnapshot, METRICS};
use crate::storage::models::{ColumnInfo, SqlValue, TradeRow};
use crate::storage::DataGenerator;

const INDEX_HTML: &str = include_str!("index.html");

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<ChatAgent>,
    pub generator: Arc<DataGenerator>,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub turn_id: Uuid,
    pub asked_at: DateTime<Utc>,
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub answer: Option<String>,
}

impl From<ChatTurn> for AskResponse {
    fn from(turn: ChatTurn) -> Self {
        let rows = turn
            .outcome
            .rows
            .iter()
            .map(|row| row.iter().map(sql_value_to_json).collect())
            .collect();
        Self {
            turn_id: turn.turn_id,
            asked_at: turn.asked_at,
            sql: turn.sql,
            columns: turn.outcome.columns,
            rows,
            answer: turn.answer,
        }
    }
}

fn sql_value_to_json(value: &SqlValue) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

/// Errors returned by the API. Only fixed messages reach the client.
pub enum ApiError {
    Turn(TurnError),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Turn(err) => {
                let status = if err.is_upstream() {
                    StatusCode::BAD_GATEWAY
                } else {
                    StatusCode::UNPROCESSABLE_ENTITY
                };
                let body = ErrorBody {
                    kind: err.kind().to_string(),
                    message: err.user_message().to_string(),
                    sql: err.sql().map(str::to_string),
                };
                (status, Json(body)).into_response()
            }
            ApiError::Internal(err) => {
                error!(target: "web", error = %format!("{err:#}"), "request failed");
                let body = ErrorBody {
                    kind: "internal".to_string(),
                    message: crate::chat::agent::GENERIC_FAILURE_MESSAGE.to_string(),
                    sql: None,
                };
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/ask", post(ask))
        .route("/api/trades", get(trades))
        .route("/api/schema", get(schema))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let turn = state.agent.respond(&req.question).await.map_err(ApiError::Turn)?;
    Ok(Json(AskResponse::from(turn)))
}

async fn trades(State(state): State<AppState>) -> Result<Json<Vec<TradeRow>>, ApiError> {
    let rows = state.generator.all_trades().await.map_err(ApiError::Internal)?;
    Ok(Json(rows))
}

async fn schema(State(state): State<AppState>) -> Result<Json<Vec<ColumnInfo>>, ApiError> {
    let columns = state.generator.table_schema().await.map_err(ApiError::Internal)?;
    Ok(Json(columns))
}

async fn health() -> Json<MetricsSnapshot> {
    Json(METRICS.snapshot())
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(target: "web", addr = %listener.local_addr()?, "web UI listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!(target: "web", "shutdown signal received");
        })
        .await?;
    Ok(())
}
