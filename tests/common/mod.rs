#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use trade_sql_bot::client::{ChatMessage, ClientError, ClientResult, CompletionClient};
use trade_sql_bot::types::{AppConfig, DatabaseConfig};

/// Config pointing at a fresh SQLite file inside `dir`, with seeding disabled.
pub fn temp_config(dir: &TempDir) -> AppConfig {
    let path = dir.path().join("trades.db");
    AppConfig {
        database: DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            seed_records: 0,
            max_connections: 2,
        },
        ..AppConfig::default()
    }
}

/// Completion client that replays canned replies in order and records every
/// request it receives.
#[derive(Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<String>>,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, messages: &[ChatMessage]) -> ClientResult<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(ClientError::EmptyCompletion)
    }
}
