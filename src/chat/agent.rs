use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::client::ClientError;
use crate::monitoring::metrics::METRICS;
use crate::sql_guard::GuardError;
use crate::storage::models::QueryOutcome;
use crate::storage::{ExecutionError, QueryExecutor};

use super::formatter::ResponseFormatter;
use super::translator::QueryTranslator;

pub const RETRY_QUERY_MESSAGE: &str = "Please try with other query.";
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong, please try again.";
pub const EMPTY_QUESTION_MESSAGE: &str = "Please enter a question.";

/// Everything produced by one answered question.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub turn_id: Uuid,
    pub asked_at: DateTime<Utc>,
    pub question: String,
    pub sql: String,
    pub outcome: QueryOutcome,
    pub answer: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("SQL generation failed: {0}")]
    Translate(#[source] ClientError),

    #[error("generated SQL rejected: {reason}")]
    Rejected { sql: String, reason: GuardError },

    #[error("SQL execution failed: {source}")]
    Execution {
        sql: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("response formatting failed: {source}")]
    Format {
        sql: String,
        #[source]
        source: ClientError,
    },
}

impl TurnError {
    /// Stable identifier for the failure kind, safe to show to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            TurnError::EmptyQuestion => "empty_question",
            TurnError::Translate(_) => "translate",
            TurnError::Rejected { .. } => "rejected",
            TurnError::Execution { .. } => "execution",
            TurnError::Format { .. } => "format",
        }
    }

    /// Fixed user-facing text. Diagnostic detail stays in the logs.
    pub fn user_message(&self) -> &'static str {
        match self {
            TurnError::EmptyQuestion => EMPTY_QUESTION_MESSAGE,
            TurnError::Rejected { .. } | TurnError::Execution { .. } => RETRY_QUERY_MESSAGE,
            TurnError::Translate(_) | TurnError::Format { .. } => GENERIC_FAILURE_MESSAGE,
        }
    }

    /// The generated statement, when the failure happened after translation.
    pub fn sql(&self) -> Option<&str> {
        match self {
            TurnError::Rejected { sql, .. }
            | TurnError::Execution { sql, .. }
            | TurnError::Format { sql, .. } => Some(sql),
            TurnError::EmptyQuestion | TurnError::Translate(_) => None,
        }
    }

    /// True when the completion endpoint, not the question or the SQL, failed.
    pub fn is_upstream(&self) -> bool {
        matches!(self, TurnError::Translate(_) | TurnError::Format { .. })
    }
}

/// Runs one question through translate, execute and (optionally) format.
///
/// Turns are independent: the agent holds no per-conversation state, so a
/// single instance can be shared across concurrent requests.
pub struct ChatAgent {
    translator: QueryTranslator,
    executor: QueryExecutor,
    formatter: Option<ResponseFormatter>,
}

impl ChatAgent {
    pub fn new(
        translator: QueryTranslator,
        executor: QueryExecutor,
        formatter: Option<ResponseFormatter>,
    ) -> Self {
        Self {
            translator,
            executor,
            formatter,
        }
    }

    pub async fn respond(&self, question: &str) -> Result<ChatTurn, TurnError> {
        let turn_id = Uuid::new_v4();
        let span = info_span!(target: "chatbot", "turn", %turn_id);
        METRICS.record_turn_started();
        let result = self.run_turn(turn_id, question).instrument(span.clone()).await;

        span.in_scope(|| match &result {
            Ok(turn) => {
                METRICS.record_turn_answered(turn.outcome.row_count());
            }
            Err(err) => {
                if matches!(err, TurnError::Rejected { .. }) {
                    METRICS.record_statement_rejected();
                }
                METRICS.record_turn_failed(err.kind());
                warn!(target: "chatbot", kind = err.kind(), error = %err, sql = err.sql().unwrap_or(""), "turn failed");
            }
        });
        result
    }

    async fn run_turn(&self, turn_id: Uuid, question: &str) -> Result<ChatTurn, TurnError> {
        let asked_at = Utc::now();
        let question = question.trim();
        if question.is_empty() {
            return Err(TurnError::EmptyQuestion);
        }
        let sql = self
            .translator
            .translate(question)
            .await
            .map_err(TurnError::Translate)?;
        info!(target: "chatbot", sql = %sql, "SQL generated");

        let outcome = match self.executor.execute(&sql).await {
            Ok(outcome) => outcome,
            Err(ExecutionError::Rejected(reason)) => {
                return Err(TurnError::Rejected { sql, reason })
            }
            Err(ExecutionError::Database(source)) => {
                return Err(TurnError::Execution { sql, source })
            }
        };
        info!(target: "chatbot", rows = outcome.row_count(), raw = %outcome.raw_display(), "query executed");

        let answer = match &self.formatter {
            Some(formatter) => match formatter.format(question, &outcome).await {
                Ok(text) => Some(text),
                Err(source) => return Err(TurnError::Format { sql, source }),
            },
            None => None,
        };

        Ok(ChatTurn {
            turn_id,
            asked_at,
            question: question.to_string(),
            sql,
            outcome,
            answer,
        })
    }
}
