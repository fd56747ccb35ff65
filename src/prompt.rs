//! System instructions sent to the completion endpoint.
//!
//! The SQL instruction lives in a JSON document shaped
//! `{"PROMPT": {"role": "system", "content": "..."}}`. It is read once at
//! startup and shared read-only for the life of the process.

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::client::{ChatMessage, Role};

const BUILTIN_SQL_INSTRUCTION: &str = "\
You translate questions about stock trades into a single SQLite SELECT statement.
The database has one table:

trades(id INTEGER PRIMARY KEY AUTOINCREMENT, symbol TEXT NOT NULL, quantity INTEGER NOT NULL, price REAL NOT NULL)

symbol is one of AAPL, GOOGL, MSFT, AMZN, TSLA. quantity is the number of shares and \
price is the per-share price in USD.
Reply with the SQL statement only: no explanation, no markdown, no code fences. \
Never modify the database.";

pub const FORMATTER_INSTRUCTION: &str =
    "You're response builder. Generate the response for the user based on the query and raw answer.";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PromptTemplate {
    pub role: Role,
    pub content: String,
}

#[derive(Deserialize)]
struct PromptDocument {
    #[serde(rename = "PROMPT")]
    prompt: PromptTemplate,
}

impl PromptTemplate {
    pub fn builtin_sql() -> Self {
        Self {
            role: Role::System,
            content: BUILTIN_SQL_INSTRUCTION.to_string(),
        }
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let doc: PromptDocument =
            serde_json::from_str(raw).context("prompt document must contain a PROMPT object")?;
        anyhow::ensure!(
            !doc.prompt.content.trim().is_empty(),
            "prompt content is empty"
        );
        Ok(doc.prompt)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read prompt file at {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("failed to parse prompt file at {}", path.display()))
    }

    /// Load from `path` if given, otherwise fall back to the built-in instruction.
    pub fn load_or_builtin(path: Option<&str>) -> anyhow::Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::builtin_sql()),
        }
    }

    pub fn to_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// Two-message context for SQL generation: the instruction, then the question.
pub fn build_sql_messages(template: &PromptTemplate, question: &str) -> Vec<ChatMessage> {
    vec![
        template.to_message(),
        ChatMessage::user(format!("User query: {question}\nSQL query:")),
    ]
}
